// Backtesting data structures and types

pub mod analytics;
pub mod engine;
pub mod ledger;
pub mod stats;

use chrono::{DateTime, Duration, Utc};
use ndarray::{s, Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use std::fmt;

use engine::BacktestError;

/// One timestamped OHLCV bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceSample {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceSample {
    /// Flat bar where open, high, low and close are all `price`.
    pub fn flat(timestamp: DateTime<Utc>, price: f64) -> Self {
        Self {
            timestamp,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 0.0,
        }
    }
}

/// Immutable, strictly time-ordered price series.
///
/// Close prices are mirrored into an `Array1` so strategies and the
/// analyzer can run vectorized window statistics without copying.
#[derive(Debug, Clone)]
pub struct PriceHistory {
    samples: Vec<PriceSample>,
    closes: Array1<f64>,
    pub trading_pair: String,
    pub timeframe: String,
}

impl PriceHistory {
    pub fn new(samples: Vec<PriceSample>) -> Result<Self, BacktestError> {
        Self::with_metadata(samples, "UNKNOWN".to_string(), "unknown".to_string())
    }

    pub fn with_metadata(
        samples: Vec<PriceSample>,
        trading_pair: String,
        timeframe: String,
    ) -> Result<Self, BacktestError> {
        if let Some(pos) = samples
            .windows(2)
            .position(|pair| pair[1].timestamp <= pair[0].timestamp)
        {
            return Err(BacktestError::InvalidPriceHistory(format!(
                "timestamps must strictly increase: sample {} ({}) does not follow sample {} ({})",
                pos + 1,
                samples[pos + 1].timestamp,
                pos,
                samples[pos].timestamp
            )));
        }

        if let Some(pos) = samples
            .iter()
            .position(|sample| !sample.close.is_finite() || sample.close <= 0.0)
        {
            return Err(BacktestError::InvalidPriceHistory(format!(
                "sample {} has a non-positive or non-finite close ({})",
                pos, samples[pos].close
            )));
        }

        let closes = samples.iter().map(|sample| sample.close).collect::<Array1<f64>>();

        Ok(Self {
            samples,
            closes,
            trading_pair,
            timeframe,
        })
    }

    /// Build a history of flat bars from close prices spaced `step` apart.
    pub fn from_closes(
        closes: &[f64],
        start: DateTime<Utc>,
        step: Duration,
    ) -> Result<Self, BacktestError> {
        let samples = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PriceSample::flat(start + step * i as i32, close))
            .collect();
        Self::new(samples)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[PriceSample] {
        &self.samples
    }

    pub fn closes(&self) -> ArrayView1<'_, f64> {
        self.closes.view()
    }

    /// Most recent close.
    pub fn latest(&self) -> Option<f64> {
        self.samples.last().map(|sample| sample.close)
    }

    /// The most recent `n` samples, or fewer when the history is shorter.
    pub fn window(&self, n: usize) -> PriceWindow<'_> {
        self.full().tail(n)
    }

    /// Every sample up to and including `index`.
    pub fn up_to(&self, index: usize) -> PriceWindow<'_> {
        let end = (index + 1).min(self.samples.len());
        PriceWindow {
            samples: &self.samples[..end],
            closes: self.closes.slice(s![..end]),
        }
    }

    pub fn full(&self) -> PriceWindow<'_> {
        PriceWindow {
            samples: &self.samples,
            closes: self.closes.view(),
        }
    }

    pub fn start_date(&self) -> Option<DateTime<Utc>> {
        self.samples.first().map(|sample| sample.timestamp)
    }

    pub fn end_date(&self) -> Option<DateTime<Utc>> {
        self.samples.last().map(|sample| sample.timestamp)
    }

    pub fn min_low(&self) -> Option<f64> {
        self.samples.iter().map(|sample| sample.low).reduce(f64::min)
    }

    pub fn max_high(&self) -> Option<f64> {
        self.samples.iter().map(|sample| sample.high).reduce(f64::max)
    }

    pub fn mean_close(&self) -> Option<f64> {
        self.closes.mean()
    }
}

/// Borrowed, time-ordered view over a prefix or suffix of a `PriceHistory`.
#[derive(Debug, Clone, Copy)]
pub struct PriceWindow<'a> {
    samples: &'a [PriceSample],
    closes: ArrayView1<'a, f64>,
}

impl<'a> PriceWindow<'a> {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &'a [PriceSample] {
        self.samples
    }

    pub fn closes(&self) -> ArrayView1<'a, f64> {
        self.closes
    }

    pub fn latest(&self) -> Option<f64> {
        self.samples.last().map(|sample| sample.close)
    }

    pub fn latest_sample(&self) -> Option<&'a PriceSample> {
        self.samples.last()
    }

    /// The last `n` samples of this window.
    pub fn tail(&self, n: usize) -> PriceWindow<'a> {
        let start = self.samples.len().saturating_sub(n);
        PriceWindow {
            samples: &self.samples[start..],
            closes: self.closes.slice_move(s![start..]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// A strategy's intent for one step. Consumed immediately by the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub side: Side,
    pub price: f64,
    pub amount: f64,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
}

impl Signal {
    pub fn buy(
        price: f64,
        amount: f64,
        timestamp: DateTime<Utc>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            side: Side::Buy,
            price,
            amount,
            timestamp,
            reason: reason.into(),
        }
    }

    pub fn sell(
        price: f64,
        amount: f64,
        timestamp: DateTime<Utc>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            side: Side::Sell,
            price,
            amount,
            timestamp,
            reason: reason.into(),
        }
    }

    pub fn notional(&self) -> f64 {
        self.price * self.amount
    }
}

/// An executed signal. `value` is the cost of a buy or the revenue of a sell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub timestamp: DateTime<Utc>,
    pub side: Side,
    pub price: f64,
    pub amount: f64,
    pub value: f64,
    pub reason: String,
}

impl Trade {
    pub fn from_signal(signal: &Signal) -> Self {
        Self {
            timestamp: signal.timestamp,
            side: signal.side,
            price: signal.price,
            amount: signal.amount,
            value: signal.notional(),
            reason: signal.reason.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
    pub capital: f64,
    pub position_value: f64,
}

/// Authoritative cash/position state held by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortfolioState {
    pub capital: f64,
    pub position: f64,
    pub entry_price: Option<f64>,
}

impl PortfolioState {
    pub fn new(capital: f64) -> Self {
        Self {
            capital,
            position: 0.0,
            entry_price: None,
        }
    }

    pub fn equity(&self, current_price: f64) -> f64 {
        self.capital + self.position * current_price
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub initial_capital: f64,
    pub final_equity: f64,
    pub net_profit: f64,
    pub total_return_pct: f64,
    pub cagr_pct: f64,
    pub max_drawdown_pct: f64,
    pub sharpe_ratio: f64,
    pub win_rate_pct: f64,
    pub trade_count: usize,
    pub elapsed_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub strategy_name: String,
    pub initial_capital: f64,
    pub metrics: PerformanceMetrics,
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<Trade>,
    pub final_state: PortfolioState,
    pub rejected_signals: usize,
}

impl BacktestResult {
    pub fn start_date(&self) -> Option<DateTime<Utc>> {
        self.equity_curve.first().map(|point| point.timestamp)
    }

    pub fn end_date(&self) -> Option<DateTime<Utc>> {
        self.equity_curve.last().map(|point| point.timestamp)
    }
}
