// Fixed-range grid ladder

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TradingStrategy;
use crate::backtesting::{PriceWindow, Side, Signal};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelStatus {
    Empty,
    Filled,
}

/// One rung of the ladder. Levels live in an index-ordered `Vec`, never in a
/// map keyed by price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridLevel {
    pub price: f64,
    pub status: LevelStatus,
}

/// `grid_num + 1` equally spaced empty levels from `lower` to `upper`, ascending.
pub fn build_levels(lower: f64, upper: f64, grid_num: usize) -> Vec<GridLevel> {
    let step = (upper - lower) / grid_num as f64;
    (0..=grid_num)
        .map(|i| GridLevel {
            price: lower + step * i as f64,
            status: LevelStatus::Empty,
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct GridStrategy {
    lower_price: f64,
    upper_price: f64,
    grid_num: usize,
    total_amount: f64,
    levels: Vec<GridLevel>,
    last_price: Option<f64>,
    position: f64,
}

impl GridStrategy {
    pub fn new(lower_price: f64, upper_price: f64, grid_num: usize, total_amount: f64) -> Self {
        Self {
            lower_price,
            upper_price,
            grid_num,
            total_amount,
            levels: build_levels(lower_price, upper_price, grid_num),
            last_price: None,
            position: 0.0,
        }
    }

    /// Base amount traded at one level: half the capital spread over half
    /// the ladder, converted at the level price.
    pub fn level_amount(&self, level_price: f64) -> f64 {
        (self.total_amount / 2.0) / (self.grid_num as f64 / 2.0) / level_price
    }

    pub fn levels(&self) -> &[GridLevel] {
        &self.levels
    }

    pub fn grid_step(&self) -> f64 {
        (self.upper_price - self.lower_price) / self.grid_num as f64
    }

    pub fn lower_price(&self) -> f64 {
        self.lower_price
    }

    pub fn upper_price(&self) -> f64 {
        self.upper_price
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn is_initialized(&self) -> bool {
        self.last_price.is_some()
    }

    /// First observation: buy every level below the current price.
    fn bootstrap(&mut self, current_price: f64, timestamp: DateTime<Utc>) -> Vec<Signal> {
        let mut signals = Vec::new();
        for i in 0..self.levels.len() {
            let level_price = self.levels[i].price;
            if level_price < current_price {
                let amount = self.level_amount(level_price);
                signals.push(Signal::buy(current_price, amount, timestamp, "grid_init"));
                self.levels[i].status = LevelStatus::Filled;
            }
        }
        signals
    }

    fn crossings(
        &mut self,
        last_price: f64,
        current_price: f64,
        timestamp: DateTime<Utc>,
    ) -> Vec<Signal> {
        let mut signals = Vec::new();

        for i in 0..self.levels.len() {
            let level = self.levels[i];
            if last_price > level.price
                && level.price >= current_price
                && level.status == LevelStatus::Empty
            {
                let amount = self.level_amount(level.price);
                signals.push(Signal::buy(current_price, amount, timestamp, "grid_buy"));
                self.levels[i].status = LevelStatus::Filled;
            }
        }

        for i in (0..self.levels.len()).rev() {
            let level = self.levels[i];
            if last_price < level.price
                && level.price <= current_price
                && level.status == LevelStatus::Filled
            {
                let amount = self.level_amount(level.price);
                signals.push(Signal::sell(current_price, amount, timestamp, "grid_sell"));
                self.levels[i].status = LevelStatus::Empty;
            }
        }

        signals
    }
}

impl TradingStrategy for GridStrategy {
    fn name(&self) -> &str {
        "grid"
    }

    fn get_signals(&mut self, window: PriceWindow<'_>, timestamp: DateTime<Utc>) -> Vec<Signal> {
        let Some(current_price) = window.latest() else {
            return Vec::new();
        };

        let signals = match self.last_price {
            None => self.bootstrap(current_price, timestamp),
            Some(last_price) => self.crossings(last_price, current_price, timestamp),
        };
        self.last_price = Some(current_price);
        signals
    }

    fn apply(&mut self, signal: &Signal) {
        match signal.side {
            Side::Buy => self.position += signal.amount,
            Side::Sell => self.position = (self.position - signal.amount).max(0.0),
        }
    }
}
