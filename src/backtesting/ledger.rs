// Portfolio ledger: the sole authority on feasibility, cash and position

use chrono::{DateTime, Utc};
use tracing::trace;

use crate::backtesting::{EquityPoint, PortfolioState, Side, Signal, Trade};

#[derive(Debug, Clone)]
pub struct Ledger {
    initial_capital: f64,
    state: PortfolioState,
    trades: Vec<Trade>,
    equity_curve: Vec<EquityPoint>,
    rejected_signals: usize,
}

impl Ledger {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            initial_capital,
            state: PortfolioState::new(initial_capital),
            trades: Vec::new(),
            equity_curve: Vec::new(),
            rejected_signals: 0,
        }
    }

    /// Apply a signal if it is feasible against the current state.
    ///
    /// A buy needs `price * amount <= capital`; a sell needs
    /// `amount <= position`. Infeasible signals are dropped whole: nothing
    /// is partially filled and the trade log is untouched. Returns the
    /// recorded trade when the signal executed.
    pub fn apply(&mut self, signal: &Signal) -> Option<&Trade> {
        if !Self::is_well_formed(signal) {
            self.reject(signal, "malformed price or amount");
            return None;
        }

        match signal.side {
            Side::Buy => {
                let cost = signal.notional();
                if cost > self.state.capital {
                    self.reject(signal, "insufficient capital");
                    return None;
                }

                let held = self.state.position;
                let basis = self.state.entry_price.unwrap_or(signal.price);
                self.state.capital -= cost;
                self.state.position += signal.amount;
                self.state.entry_price =
                    Some((held * basis + signal.amount * signal.price) / self.state.position);
            }
            Side::Sell => {
                if signal.amount > self.state.position {
                    self.reject(signal, "insufficient position");
                    return None;
                }

                self.state.capital += signal.notional();
                self.state.position -= signal.amount;
                if self.state.position == 0.0 {
                    self.state.entry_price = None;
                }
            }
        }

        self.trades.push(Trade::from_signal(signal));
        self.trades.last()
    }

    /// Append one equity snapshot marked at `current_price`.
    pub fn record_equity(&mut self, current_price: f64, timestamp: DateTime<Utc>) -> EquityPoint {
        let position_value = self.state.position * current_price;
        let point = EquityPoint {
            timestamp,
            equity: self.state.capital + position_value,
            capital: self.state.capital,
            position_value,
        };
        self.equity_curve.push(point);
        point
    }

    pub fn equity(&self, current_price: f64) -> f64 {
        self.state.equity(current_price)
    }

    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    pub fn state(&self) -> PortfolioState {
        self.state
    }

    pub fn capital(&self) -> f64 {
        self.state.capital
    }

    pub fn position(&self) -> f64 {
        self.state.position
    }

    pub fn entry_price(&self) -> Option<f64> {
        self.state.entry_price
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    pub fn rejected_signals(&self) -> usize {
        self.rejected_signals
    }

    pub fn into_parts(self) -> (Vec<Trade>, Vec<EquityPoint>, PortfolioState) {
        (self.trades, self.equity_curve, self.state)
    }

    fn is_well_formed(signal: &Signal) -> bool {
        signal.amount.is_finite()
            && signal.amount > 0.0
            && signal.price.is_finite()
            && signal.price > 0.0
    }

    fn reject(&mut self, signal: &Signal, why: &str) {
        self.rejected_signals += 1;
        trace!(
            side = %signal.side,
            price = signal.price,
            amount = signal.amount,
            capital = self.state.capital,
            position = self.state.position,
            "signal dropped: {}",
            why
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_buy_within_capital_executes() {
        let mut ledger = Ledger::new(1000.0);
        let trade = ledger.apply(&Signal::buy(100.0, 5.0, ts(), "test")).cloned();

        let trade = trade.expect("buy should execute");
        assert_eq!(trade.value, 500.0);
        assert_eq!(ledger.capital(), 500.0);
        assert_eq!(ledger.position(), 5.0);
        assert_eq!(ledger.entry_price(), Some(100.0));
    }

    #[test]
    fn test_buy_exceeding_capital_is_dropped() {
        let mut ledger = Ledger::new(100.0);
        assert!(ledger.apply(&Signal::buy(50.0, 2.5, ts(), "too big")).is_none());

        assert_eq!(ledger.capital(), 100.0);
        assert_eq!(ledger.position(), 0.0);
        assert!(ledger.trades().is_empty());
        assert_eq!(ledger.rejected_signals(), 1);
    }

    #[test]
    fn test_buy_spending_exact_capital_is_accepted() {
        let mut ledger = Ledger::new(100.0);
        assert!(ledger.apply(&Signal::buy(50.0, 2.0, ts(), "all in")).is_some());
        assert_eq!(ledger.capital(), 0.0);
    }

    #[test]
    fn test_oversell_is_dropped() {
        let mut ledger = Ledger::new(1000.0);
        ledger.apply(&Signal::buy(100.0, 1.0, ts(), "buy"));
        assert!(ledger.apply(&Signal::sell(120.0, 1.5, ts(), "oversell")).is_none());

        assert_eq!(ledger.position(), 1.0);
        assert_eq!(ledger.trades().len(), 1);
    }

    #[test]
    fn test_full_sell_clears_entry_price() {
        let mut ledger = Ledger::new(1000.0);
        ledger.apply(&Signal::buy(100.0, 2.0, ts(), "buy"));
        ledger.apply(&Signal::sell(110.0, 1.0, ts(), "partial"));
        assert_eq!(ledger.entry_price(), Some(100.0));

        ledger.apply(&Signal::sell(110.0, 1.0, ts(), "rest"));
        assert_eq!(ledger.position(), 0.0);
        assert_eq!(ledger.entry_price(), None);
        assert_eq!(ledger.capital(), 1020.0);
    }

    #[test]
    fn test_entry_price_is_weighted_cost_basis() {
        let mut ledger = Ledger::new(10_000.0);
        ledger.apply(&Signal::buy(100.0, 1.0, ts(), "first"));
        ledger.apply(&Signal::buy(200.0, 3.0, ts(), "second"));
        assert_relative_eq!(ledger.entry_price().unwrap(), 175.0, epsilon = 1e-9);
    }

    #[test]
    fn test_malformed_signals_are_dropped() {
        let mut ledger = Ledger::new(1000.0);
        assert!(ledger.apply(&Signal::buy(100.0, -1.0, ts(), "negative")).is_none());
        assert!(ledger.apply(&Signal::sell(100.0, f64::NAN, ts(), "nan")).is_none());
        assert!(ledger.apply(&Signal::buy(0.0, 1.0, ts(), "free")).is_none());
        assert_eq!(ledger.capital(), 1000.0);
        assert_eq!(ledger.rejected_signals(), 3);
    }

    #[test]
    fn test_record_equity_marks_position() {
        let mut ledger = Ledger::new(1000.0);
        ledger.apply(&Signal::buy(100.0, 4.0, ts(), "buy"));
        let point = ledger.record_equity(125.0, ts());

        assert_eq!(point.capital, 600.0);
        assert_eq!(point.position_value, 500.0);
        assert_eq!(point.equity, 1100.0);
        assert_eq!(ledger.equity_curve().len(), 1);
    }
}
