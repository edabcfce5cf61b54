// Volatility-adaptive grid with stop-loss
//
// The ladder is rebuilt from scratch every step once the volatility window is
// available, so level fill status never survives into the next step.

use chrono::{DateTime, Utc};
use ndarray::ArrayView1;

use super::grid::{build_levels, GridLevel, LevelStatus};
use super::TradingStrategy;
use crate::backtesting::stats::{sample_std, simple_returns, ANNUALIZATION_PERIODS};
use crate::backtesting::{PriceWindow, Side, Signal};

const MIN_RANGE_PCT: f64 = 0.15;
const MAX_RANGE_PCT: f64 = 0.30;
const BASE_SIZE_FRACTION: f64 = 0.5;
const VOLATILITY_DAMPING: f64 = 10.0;
const MAX_AFFORDABLE_FRACTION: f64 = 0.9;

#[derive(Debug, Clone)]
pub struct ImprovedGridStrategy {
    grid_num: usize,
    volatility_window: usize,
    stop_loss_pct: f64,

    capital: f64,
    position: f64,
    entry_price: Option<f64>,

    levels: Vec<GridLevel>,
    last_price: Option<f64>,
}

impl ImprovedGridStrategy {
    pub fn new(
        initial_capital: f64,
        grid_num: usize,
        volatility_window: usize,
        stop_loss_pct: f64,
    ) -> Self {
        Self {
            grid_num,
            volatility_window,
            stop_loss_pct,
            capital: initial_capital,
            position: 0.0,
            entry_price: None,
            levels: Vec::new(),
            last_price: None,
        }
    }

    /// Standard deviation of simple returns over `closes`, not annualized.
    pub fn volatility(closes: ArrayView1<'_, f64>) -> f64 {
        sample_std(simple_returns(closes).view()).unwrap_or(0.0)
    }

    /// `(lower, upper)` around the last close, ±clamp(annualized vol, 15%, 30%).
    pub fn dynamic_range(closes: ArrayView1<'_, f64>) -> Option<(f64, f64)> {
        let current_price = *closes.last()?;
        let annualized = Self::volatility(closes) * ANNUALIZATION_PERIODS.sqrt();
        let range_pct = annualized.clamp(MIN_RANGE_PCT, MAX_RANGE_PCT);
        Some((current_price * (1.0 - range_pct), current_price * (1.0 + range_pct)))
    }

    /// Capital per grid unit, shrinking as volatility rises.
    pub fn position_size(&self, volatility: f64) -> f64 {
        let base_size = self.capital * BASE_SIZE_FRACTION;
        base_size * (1.0 / (1.0 + volatility * VOLATILITY_DAMPING))
    }

    /// Per-level buy: one grid's share of `unit_size`, capped at 90% of what
    /// the shadow capital can afford.
    pub fn buy_amount(&self, unit_size: f64, price: f64) -> f64 {
        let share = unit_size / self.grid_num as f64 / price;
        share.min(self.capital / price * MAX_AFFORDABLE_FRACTION)
    }

    /// Per-level sell: `position / (N / 2)`, capped at 90% of the position.
    pub fn sell_amount(&self) -> f64 {
        let share = self.position / (self.grid_num as f64 / 2.0);
        share.min(self.position * MAX_AFFORDABLE_FRACTION)
    }

    pub fn stop_loss_triggered(&self, current_price: f64) -> bool {
        match self.entry_price {
            Some(entry) if self.position > 0.0 => {
                let loss_pct = (current_price - entry) / entry * 100.0;
                loss_pct < -self.stop_loss_pct
            }
            _ => false,
        }
    }

    pub fn levels(&self) -> &[GridLevel] {
        &self.levels
    }

    pub fn capital(&self) -> f64 {
        self.capital
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn entry_price(&self) -> Option<f64> {
        self.entry_price
    }

    fn grid_signals(
        &mut self,
        closes: ArrayView1<'_, f64>,
        current_price: f64,
        timestamp: DateTime<Utc>,
    ) -> Vec<Signal> {
        let mut signals = Vec::new();
        let Some((lower, upper)) = Self::dynamic_range(closes) else {
            return signals;
        };
        self.levels = build_levels(lower, upper, self.grid_num);

        let Some(last_price) = self.last_price else {
            return signals;
        };

        let unit_size = self.position_size(Self::volatility(closes));
        let buy_amount = self.buy_amount(unit_size, current_price);
        let sell_amount = self.sell_amount();

        for level in self.levels.iter_mut() {
            if last_price > level.price && level.price >= current_price {
                if self.capital > 0.0 && buy_amount > 0.0 {
                    signals.push(Signal::buy(current_price, buy_amount, timestamp, "grid_buy"));
                    level.status = LevelStatus::Filled;
                }
            } else if last_price < level.price
                && level.price <= current_price
                && self.position > 0.0
                && sell_amount > 0.0
            {
                signals.push(Signal::sell(current_price, sell_amount, timestamp, "grid_sell"));
                level.status = LevelStatus::Empty;
            }
        }

        signals
    }
}

impl TradingStrategy for ImprovedGridStrategy {
    fn name(&self) -> &str {
        "improved_grid"
    }

    fn get_signals(&mut self, window: PriceWindow<'_>, timestamp: DateTime<Utc>) -> Vec<Signal> {
        let Some(current_price) = window.latest() else {
            return Vec::new();
        };

        // The stop-loss step suppresses grid evaluation and leaves the
        // previous observed price untouched.
        if self.stop_loss_triggered(current_price) {
            return vec![Signal::sell(current_price, self.position, timestamp, "stop_loss")];
        }

        let signals = if window.len() >= self.volatility_window {
            let closes = window.tail(self.volatility_window).closes();
            self.grid_signals(closes, current_price, timestamp)
        } else {
            Vec::new()
        };

        self.last_price = Some(current_price);
        signals
    }

    fn apply(&mut self, signal: &Signal) {
        match signal.side {
            Side::Buy => {
                self.capital -= signal.notional();
                self.position += signal.amount;
                if self.entry_price.is_none() {
                    self.entry_price = Some(signal.price);
                }
            }
            Side::Sell => {
                self.capital += signal.notional();
                self.position -= signal.amount;
                if self.position <= 0.0 {
                    self.position = 0.0;
                    self.entry_price = None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtesting::PriceHistory;
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone};
    use ndarray::array;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_range_is_clamped_to_floor_for_flat_prices() {
        let closes = array![100.0, 100.0, 100.0, 100.0];
        let (lower, upper) = ImprovedGridStrategy::dynamic_range(closes.view()).unwrap();
        assert_relative_eq!(lower, 85.0, epsilon = 1e-9);
        assert_relative_eq!(upper, 115.0, epsilon = 1e-9);
    }

    #[test]
    fn test_range_is_clamped_to_ceiling_for_wild_prices() {
        let closes = array![100.0, 150.0, 80.0, 160.0];
        let (lower, upper) = ImprovedGridStrategy::dynamic_range(closes.view()).unwrap();
        assert_relative_eq!(lower, 160.0 * 0.7, epsilon = 1e-9);
        assert_relative_eq!(upper, 160.0 * 1.3, epsilon = 1e-9);
    }

    #[test]
    fn test_position_size_shrinks_with_volatility() {
        let strategy = ImprovedGridStrategy::new(10_000.0, 10, 5, 15.0);
        assert_relative_eq!(strategy.position_size(0.0), 5_000.0);
        assert_relative_eq!(strategy.position_size(0.1), 2_500.0);
    }

    #[test]
    fn test_no_signals_before_window_is_full() {
        let closes = [100.0, 90.0, 80.0];
        let history = PriceHistory::from_closes(&closes, ts(), Duration::days(1)).unwrap();
        let mut strategy = ImprovedGridStrategy::new(10_000.0, 10, 5, 15.0);

        for i in 0..history.len() {
            assert!(strategy.get_signals(history.up_to(i), ts()).is_empty());
        }
        assert!(strategy.levels().is_empty());
    }

    #[test]
    fn test_levels_are_rebuilt_each_step() {
        let closes = [100.0, 101.0, 100.0, 102.0];
        let history = PriceHistory::from_closes(&closes, ts(), Duration::days(1)).unwrap();
        let mut strategy = ImprovedGridStrategy::new(10_000.0, 4, 3, 15.0);

        strategy.get_signals(history.up_to(2), ts());
        let first: Vec<f64> = strategy.levels().iter().map(|l| l.price).collect();
        strategy.get_signals(history.up_to(3), ts());
        let second: Vec<f64> = strategy.levels().iter().map(|l| l.price).collect();

        assert_eq!(first.len(), 5);
        assert_eq!(second.len(), 5);
        assert_ne!(first, second);
    }

    #[test]
    fn test_stop_loss_sells_whole_position() {
        let closes = [100.0, 100.0, 100.0, 80.0];
        let history = PriceHistory::from_closes(&closes, ts(), Duration::days(1)).unwrap();
        let mut strategy = ImprovedGridStrategy::new(10_000.0, 10, 3, 15.0);
        strategy.apply(&Signal::buy(100.0, 3.0, ts(), "grid_buy"));

        let signals = strategy.get_signals(history.up_to(3), ts());
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].side, Side::Sell);
        assert_eq!(signals[0].amount, 3.0);
        assert_eq!(signals[0].reason, "stop_loss");

        strategy.apply(&signals[0]);
        assert_eq!(strategy.position(), 0.0);
        assert_eq!(strategy.entry_price(), None);
    }

    #[test]
    fn test_downward_cross_buys_volatility_scaled_unit() {
        let closes = [100.0, 100.0, 100.0, 90.0];
        let history = PriceHistory::from_closes(&closes, ts(), Duration::days(1)).unwrap();
        let mut strategy = ImprovedGridStrategy::new(10_000.0, 10, 3, 15.0);

        strategy.get_signals(history.up_to(2), ts());
        // ladder is rebuilt around 90 with a 30% half-width: 63.0, 68.4, ... 95.4, ...
        let signals = strategy.get_signals(history.up_to(3), ts());

        // returns [0, -0.1] => sigma = sqrt(0.005)
        let sigma = 0.005_f64.sqrt();
        let unit = 10_000.0 * 0.5 / (1.0 + 10.0 * sigma);
        assert_relative_eq!(
            ImprovedGridStrategy::volatility(history.up_to(3).tail(3).closes()),
            sigma,
            epsilon = 1e-12
        );

        assert!(!signals.is_empty());
        for signal in &signals {
            assert_eq!(signal.side, Side::Buy);
            assert_eq!(signal.price, 90.0);
            assert_eq!(signal.reason, "grid_buy");
            assert_relative_eq!(signal.amount, unit / 10.0 / 90.0, max_relative = 1e-12);
        }
    }

    #[test]
    fn test_buy_amount_is_capped_by_capital() {
        let mut strategy = ImprovedGridStrategy::new(1_000.0, 2, 3, 15.0);
        assert_relative_eq!(strategy.buy_amount(100.0, 10.0), 100.0 / 2.0 / 10.0);

        strategy.apply(&Signal::buy(10.0, 99.0, ts(), "grid_buy"));
        // 10 left in shadow capital: 10 / 10 * 0.9
        assert_relative_eq!(strategy.buy_amount(100.0, 10.0), 0.9, epsilon = 1e-12);
    }

    #[test]
    fn test_upward_cross_sells_position_share() {
        let closes = [100.0, 100.0, 100.0, 110.0];
        let history = PriceHistory::from_closes(&closes, ts(), Duration::days(1)).unwrap();
        let mut strategy = ImprovedGridStrategy::new(10_000.0, 10, 3, 15.0);
        strategy.apply(&Signal::buy(100.0, 10.0, ts(), "grid_buy"));

        strategy.get_signals(history.up_to(2), ts());
        let signals = strategy.get_signals(history.up_to(3), ts());

        assert!(!signals.is_empty());
        for signal in &signals {
            assert_eq!(signal.side, Side::Sell);
            assert_eq!(signal.price, 110.0);
            assert_eq!(signal.reason, "grid_sell");
            // 10 / (10 / 2)
            assert_eq!(signal.amount, 2.0);
        }
    }

    #[test]
    fn test_sell_amount_caps_small_ladders() {
        let mut two_levels = ImprovedGridStrategy::new(10_000.0, 2, 3, 15.0);
        two_levels.apply(&Signal::buy(100.0, 10.0, ts(), "grid_buy"));
        assert_relative_eq!(two_levels.sell_amount(), 9.0, epsilon = 1e-12);

        let mut four_levels = ImprovedGridStrategy::new(10_000.0, 4, 3, 15.0);
        four_levels.apply(&Signal::buy(100.0, 10.0, ts(), "grid_buy"));
        assert_eq!(four_levels.sell_amount(), 5.0);
    }
}
