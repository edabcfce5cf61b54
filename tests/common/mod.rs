// Common test utilities and helpers
#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use grid_backtester::{Config, PriceHistory, StrategyConfig, SyntheticPriceGenerator};
use std::path::PathBuf;
use tempfile::TempDir;

/// Fixed start so every generated history is reproducible.
pub fn test_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Create a test configuration with sensible defaults
pub fn create_test_config() -> Config {
    let mut config = Config::default();
    config.backtest.initial_capital = 10_000.0;
    config.backtest.trading_pair = "BTC/USDT".to_string();
    config.strategy = StrategyConfig::grid(90.0, 110.0, 4);
    config
}

/// Daily history of flat bars from close prices
pub fn history_from_closes(closes: &[f64]) -> PriceHistory {
    PriceHistory::from_closes(closes, test_start(), Duration::days(1))
        .expect("Failed to build price history")
}

/// Hourly seeded random walk
pub fn synthetic_history(seed: u64, samples: usize) -> PriceHistory {
    SyntheticPriceGenerator::new(seed, samples)
        .with_start_price(100.0)
        .with_volatility(0.02)
        .generate()
        .expect("Failed to generate synthetic history")
}

/// Deterministic oscillation around `base` for grid tests
pub fn sine_closes(base: f64, amplitude: f64, count: usize, period: f64) -> Vec<f64> {
    (0..count)
        .map(|i| base + amplitude * (i as f64 * 2.0 * std::f64::consts::PI / period).sin())
        .collect()
}

/// Generate test timestamps
pub fn generate_test_timestamps(count: usize, interval_minutes: i64) -> Vec<DateTime<Utc>> {
    (0..count)
        .map(|i| test_start() + Duration::minutes(i as i64 * interval_minutes))
        .collect()
}

/// Create a temporary directory holding one file path
pub fn create_temp_file(name: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join(name);
    (temp_dir, path)
}
