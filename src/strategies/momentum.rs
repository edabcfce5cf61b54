// Trailing-return momentum, long only

use chrono::{DateTime, Utc};

use super::{TradingStrategy, FULL_ENTRY_FRACTION};
use crate::backtesting::{PriceWindow, Side, Signal};

#[derive(Debug, Clone)]
pub struct MomentumStrategy {
    lookback: usize,
    threshold: f64,
    stop_loss_pct: Option<f64>,
    capital: f64,
    position: f64,
    entry_price: Option<f64>,
}

impl MomentumStrategy {
    pub fn new(initial_capital: f64, lookback: usize, threshold: f64) -> Self {
        Self {
            lookback,
            threshold,
            stop_loss_pct: None,
            capital: initial_capital,
            position: 0.0,
            entry_price: None,
        }
    }

    /// Liquidate when the open position is more than `stop_loss_pct` percent
    /// below its entry price.
    pub fn with_stop_loss(mut self, stop_loss_pct: f64) -> Self {
        self.stop_loss_pct = Some(stop_loss_pct);
        self
    }

    pub fn stop_loss_triggered(&self, current_price: f64) -> bool {
        match (self.stop_loss_pct, self.entry_price) {
            (Some(limit), Some(entry)) if self.position > 0.0 => {
                (current_price - entry) / entry * 100.0 < -limit
            }
            _ => false,
        }
    }

    /// `price[t] / price[t - lookback] - 1`, or `None` without enough history.
    pub fn momentum(&self, window: PriceWindow<'_>) -> Option<f64> {
        let closes = window.closes();
        let n = closes.len();
        if n <= self.lookback {
            return None;
        }
        Some(closes[n - 1] / closes[n - 1 - self.lookback] - 1.0)
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

impl TradingStrategy for MomentumStrategy {
    fn name(&self) -> &str {
        "momentum"
    }

    fn get_signals(&mut self, window: PriceWindow<'_>, timestamp: DateTime<Utc>) -> Vec<Signal> {
        let Some(current_price) = window.latest() else {
            return Vec::new();
        };

        if self.stop_loss_triggered(current_price) {
            return vec![Signal::sell(current_price, self.position, timestamp, "stop_loss")];
        }

        let Some(momentum) = self.momentum(window) else {
            return Vec::new();
        };

        if momentum > self.threshold && self.position == 0.0 {
            let amount = self.capital * FULL_ENTRY_FRACTION / current_price;
            if amount > 0.0 {
                return vec![Signal::buy(
                    current_price,
                    amount,
                    timestamp,
                    format!("momentum_up_{:.2}%", momentum * 100.0),
                )];
            }
        } else if momentum < -self.threshold && self.position > 0.0 {
            return vec![Signal::sell(
                current_price,
                self.position,
                timestamp,
                format!("momentum_down_{:.2}%", momentum * 100.0),
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
