// Price history providers: exchange kline CSV files and seeded synthetic walks

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::backtesting::{PriceHistory, PriceSample};
use crate::error::{TradingError, TradingResult};

/// Anything that can hand the engine an ordered price history.
pub trait PriceProvider {
    fn load(&self) -> TradingResult<PriceHistory>;
}

/// Epoch values above this are microseconds rather than milliseconds.
const MICROS_THRESHOLD: i64 = 100_000_000_000_000;

/// Reads OHLCV bars from CSV.
///
/// Accepts a headerless exchange kline export (open time in epoch ms, open,
/// high, low, close, volume, then columns that are ignored) or a file with a
/// `timestamp,open,high,low,close,volume` header whose timestamps are epoch
/// ms or RFC 3339.
#[derive(Debug, Clone)]
pub struct CsvPriceLoader {
    path: PathBuf,
    trading_pair: String,
    timeframe: String,
}

impl CsvPriceLoader {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            trading_pair: "UNKNOWN".to_string(),
            timeframe: "unknown".to_string(),
        }
    }

    pub fn with_metadata(mut self, trading_pair: &str, timeframe: &str) -> Self {
        self.trading_pair = trading_pair.to_string();
        self.timeframe = timeframe.to_string();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_samples(&self) -> TradingResult<Vec<PriceSample>> {
        if !self.path.exists() {
            return Err(TradingError::FileNotFound(self.path.display().to_string()));
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(&self.path)?;

        let mut samples = Vec::new();
        for (index, result) in reader.records().enumerate() {
            let record = result?;
            let row = record
                .position()
                .map(|pos| pos.line() as usize)
                .unwrap_or(index + 1);

            if index == 0 && is_header(&record) {
                continue;
            }
            if record.iter().all(|field| field.is_empty()) {
                continue;
            }

            samples.push(parse_record(&record, row)?);
        }
        Ok(samples)
    }
}

impl PriceProvider for CsvPriceLoader {
    fn load(&self) -> TradingResult<PriceHistory> {
        let mut samples = self.read_samples()?;
        if samples.is_empty() {
            return Err(TradingError::InsufficientData(format!(
                "{} contains no price rows",
                self.path.display()
            )));
        }

        // Stable sort keeps the first of any duplicated timestamps in front.
        samples.sort_by_key(|sample| sample.timestamp);
        let before = samples.len();
        samples.dedup_by_key(|sample| sample.timestamp);
        if samples.len() < before {
            warn!(
                "⚠️  Dropped {} rows with duplicate timestamps from {}",
                before - samples.len(),
                self.path.display()
            );
        }

        let history = PriceHistory::with_metadata(
            samples,
            self.trading_pair.clone(),
            self.timeframe.clone(),
        )?;

        info!("📊 Loaded {} price points from {}", history.len(), self.path.display());
        if let (Some(start), Some(end)) = (history.start_date(), history.end_date()) {
            info!(
                "   Period: {} to {}",
                start.format("%Y-%m-%d %H:%M"),
                end.format("%Y-%m-%d %H:%M")
            );
        }
        if let (Some(low), Some(high)) = (history.min_low(), history.max_high()) {
            info!("   Price range: {:.2} - {:.2}", low, high);
        }

        Ok(history)
    }
}

fn is_header(record: &csv::StringRecord) -> bool {
    record
        .get(0)
        .map(|field| !field.chars().any(|c| c.is_ascii_digit()))
        .unwrap_or(false)
}

fn parse_record(record: &csv::StringRecord, row: usize) -> TradingResult<PriceSample> {
    if record.len() < 5 {
        return Err(TradingError::DataParse {
            row,
            reason: format!("expected at least 5 columns, found {}", record.len()),
        });
    }

    let field = |i: usize, name: &str| -> TradingResult<f64> {
        let raw = record.get(i).unwrap_or_default();
        raw.parse::<f64>().map_err(|e| TradingError::DataParse {
            row,
            reason: format!("invalid {} value '{}': {}", name, raw, e),
        })
    };

    let timestamp = parse_timestamp(record.get(0).unwrap_or_default()).ok_or_else(|| {
        TradingError::DataParse {
            row,
            reason: format!("invalid timestamp '{}'", record.get(0).unwrap_or_default()),
        }
    })?;

    let volume = match record.get(5) {
        Some(raw) if !raw.is_empty() => field(5, "volume")?,
        _ => 0.0,
    };

    Ok(PriceSample {
        timestamp,
        open: field(1, "open")?,
        high: field(2, "high")?,
        low: field(3, "low")?,
        close: field(4, "close")?,
        volume,
    })
}

/// Epoch milliseconds (or microseconds for very large values) or RFC 3339.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(epoch) = raw.parse::<i64>() {
        if epoch >= MICROS_THRESHOLD {
            let secs = epoch.div_euclid(1_000_000);
            let nanos = (epoch.rem_euclid(1_000_000) * 1_000) as u32;
            return Utc.timestamp_opt(secs, nanos).single();
        }
        return Utc.timestamp_millis_opt(epoch).single();
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Seeded geometric random walk. The same seed always produces the same
/// history, starting 2024-01-01 00:00 UTC unless told otherwise.
#[derive(Debug, Clone)]
pub struct SyntheticPriceGenerator {
    seed: u64,
    samples: usize,
    start_price: f64,
    volatility: f64,
    drift: f64,
    interval: Duration,
    start: DateTime<Utc>,
}

impl SyntheticPriceGenerator {
    pub fn new(seed: u64, samples: usize) -> Self {
        Self {
            seed,
            samples,
            start_price: 30_000.0,
            volatility: 0.01,
            drift: 0.0,
            interval: Duration::hours(1),
            start: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_default(),
        }
    }

    pub fn with_start_price(mut self, price: f64) -> Self {
        self.start_price = price;
        self
    }

    pub fn with_volatility(mut self, volatility: f64) -> Self {
        self.volatility = volatility;
        self
    }

    pub fn with_drift(mut self, drift: f64) -> Self {
        self.drift = drift;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_start(mut self, start: DateTime<Utc>) -> Self {
        self.start = start;
        self
    }

    pub fn generate(&self) -> TradingResult<PriceHistory> {
        if !(self.start_price.is_finite() && self.start_price > 0.0) {
            return Err(TradingError::InvalidParameter(
                "start_price".to_string(),
                "must be positive".to_string(),
            ));
        }
        if self.interval <= Duration::zero() {
            return Err(TradingError::InvalidParameter(
                "interval".to_string(),
                "must be positive".to_string(),
            ));
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut samples = Vec::with_capacity(self.samples);
        let mut previous = self.start_price;

        for i in 0..self.samples {
            let shock = standard_normal(&mut rng);
            let close = previous * (self.drift + self.volatility * shock).exp();
            let wick = self.volatility * rng.gen::<f64>() / 2.0;

            samples.push(PriceSample {
                timestamp: self.start + self.interval * i as i32,
                open: previous,
                high: previous.max(close) * (1.0 + wick),
                low: previous.min(close) * (1.0 - wick),
                close,
                volume: rng.gen_range(10.0..100.0),
            });
            previous = close;
        }

        let timeframe = format!("{}m", self.interval.num_minutes());
        Ok(PriceHistory::with_metadata(samples, "SYNTHETIC".to_string(), timeframe)?)
    }
}

impl PriceProvider for SyntheticPriceGenerator {
    fn load(&self) -> TradingResult<PriceHistory> {
        self.generate()
    }
}

/// Box-Muller transform over two uniform draws.
fn standard_normal(rng: &mut StdRng) -> f64 {
    let u1 = 1.0 - rng.gen::<f64>();
    let u2 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}
