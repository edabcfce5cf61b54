// Z-score mean reversion
//
// Long only: an overbought reading never opens a short. Exits happen once the
// z-score recovers above EXIT_Z.

use chrono::{DateTime, Utc};

use super::{TradingStrategy, FULL_ENTRY_FRACTION};
use crate::backtesting::stats::{mean, sample_std};
use crate::backtesting::{PriceWindow, Side, Signal};

const EXIT_Z: f64 = -0.5;

#[derive(Debug, Clone)]
pub struct MeanReversionStrategy {
    ma_period: usize,
    std_threshold: f64,
    capital: f64,
    position: f64,
    entry_price: Option<f64>,
}

impl MeanReversionStrategy {
    pub fn new(initial_capital: f64, ma_period: usize, std_threshold: f64) -> Self {
        Self {
            ma_period,
            std_threshold,
            capital: initial_capital,
            position: 0.0,
            entry_price: None,
        }
    }

    /// Z-score of the latest close against the trailing `ma_period` closes.
    /// Zero when the window has no dispersion.
    pub fn z_score(&self, window: PriceWindow<'_>) -> Option<f64> {
        if window.len() < self.ma_period {
            return None;
        }
        let closes = window.tail(self.ma_period).closes();
        let current_price = *closes.last()?;
        let avg = mean(closes)?;
        let std = sample_std(closes)?;

        if std > 0.0 {
            Some((current_price - avg) / std)
        } else {
            Some(0.0)
        }
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
}

impl TradingStrategy for MeanReversionStrategy {
    fn name(&self) -> &str {
        "mean_reversion"
    }

    fn get_signals(&mut self, window: PriceWindow<'_>, timestamp: DateTime<Utc>) -> Vec<Signal> {
        let (Some(z), Some(current_price)) = (self.z_score(window), window.latest()) else {
            return Vec::new();
        };

        if z < -self.std_threshold && self.position == 0.0 {
            let amount = self.capital * FULL_ENTRY_FRACTION / current_price;
            if amount > 0.0 {
                return vec![Signal::buy(
                    current_price,
                    amount,
                    timestamp,
                    format!("oversold_z={:.2}", z),
                )];
            }
        } else if z > EXIT_Z && self.position > 0.0 {
            return vec![Signal::sell(
                current_price,
                self.position,
                timestamp,
                format!("mean_revert_z={:.2}", z),
            )];
        }

        Vec::new()
    }

    fn apply(&mut self, signal: &Signal) {
        match signal.side {
            Side::Buy => {
                self.capital -= signal.notional();
                self.position += signal.amount;
                self.entry_price = Some(signal.price);
            }
            Side::Sell => {
                self.capital += signal.notional();
                self.position = (self.position - signal.amount).max(0.0);
                if self.position == 0.0 {
                    self.entry_price = None;
                }
            }
        }
    }
}
