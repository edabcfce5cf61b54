// Report files: trade log, equity curve, run summary and optimizer table

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::backtesting::{BacktestResult, EquityPoint, PerformanceMetrics, PriceHistory, Trade};
use crate::error::{TradingError, TradingResult};
use crate::optimization::OptimizationRow;
use crate::strategies::StrategyConfig;

pub const TRADES_FILE: &str = "trades.csv";
pub const EQUITY_FILE: &str = "equity.csv";
pub const SUMMARY_FILE: &str = "summary.json";
pub const OPTIMIZATION_FILE: &str = "optimization_results.csv";

/// Metadata and metrics for one run, written as `summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub strategy_name: String,
    pub strategy: StrategyConfig,
    pub trading_pair: String,
    pub timeframe: String,
    pub initial_capital: f64,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub samples: usize,
    pub rejected_signals: usize,
    pub metrics: PerformanceMetrics,
}

impl RunSummary {
    pub fn new(result: &BacktestResult, strategy: &StrategyConfig, history: &PriceHistory) -> Self {
        Self {
            strategy_name: result.strategy_name.clone(),
            strategy: strategy.clone(),
            trading_pair: history.trading_pair.clone(),
            timeframe: history.timeframe.clone(),
            initial_capital: result.initial_capital,
            start_date: history.start_date(),
            end_date: history.end_date(),
            samples: history.len(),
            rejected_signals: result.rejected_signals,
            metrics: result.metrics.clone(),
        }
    }
}

/// Writes report files under one output directory.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    directory: PathBuf,
}

impl ReportWriter {
    /// Create the writer, creating `directory` if needed.
    pub fn new<P: AsRef<Path>>(directory: P) -> TradingResult<Self> {
        let directory = directory.as_ref().to_path_buf();
        fs::create_dir_all(&directory).map_err(|e| {
            TradingError::DirectoryCreate(format!("{}: {}", directory.display(), e))
        })?;
        Ok(Self { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn write_trades(&self, trades: &[Trade]) -> TradingResult<PathBuf> {
        self.write_csv(TRADES_FILE, trades)
    }

    pub fn write_equity(&self, equity_curve: &[EquityPoint]) -> TradingResult<PathBuf> {
        self.write_csv(EQUITY_FILE, equity_curve)
    }

    pub fn write_optimization(&self, rows: &[OptimizationRow]) -> TradingResult<PathBuf> {
        self.write_csv(OPTIMIZATION_FILE, rows)
    }

    pub fn write_summary(&self, summary: &RunSummary) -> TradingResult<PathBuf> {
        let path = self.directory.join(SUMMARY_FILE);
        let content = serde_json::to_string_pretty(summary)?;
        fs::write(&path, content)
            .map_err(|e| TradingError::FileWrite(format!("{}: {}", path.display(), e)))?;
        info!("💾 Wrote {}", path.display());
        Ok(path)
    }

    /// Summary plus, when enabled, the trade log and equity curve.
    pub fn write_backtest(
        &self,
        result: &BacktestResult,
        strategy: &StrategyConfig,
        history: &PriceHistory,
        write_trades: bool,
        write_equity: bool,
    ) -> TradingResult<Vec<PathBuf>> {
        let mut written = Vec::new();
        if write_trades {
            written.push(self.write_trades(&result.trades)?);
        }
        if write_equity {
            written.push(self.write_equity(&result.equity_curve)?);
        }
        written.push(self.write_summary(&RunSummary::new(result, strategy, history))?);
        Ok(written)
    }

    fn write_csv<T: Serialize>(&self, file_name: &str, rows: &[T]) -> TradingResult<PathBuf> {
        let path = self.directory.join(file_name);
        let mut writer = csv::Writer::from_path(&path)?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer
            .flush()
            .map_err(|e| TradingError::FileWrite(format!("{}: {}", path.display(), e)))?;
        info!("💾 Wrote {} rows to {}", rows.len(), path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtesting::Side;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_trades_csv_has_header_and_rows() {
        let dir = TempDir::new().unwrap();
        let writer = ReportWriter::new(dir.path().join("out")).unwrap();
        let trades = vec![Trade {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            side: Side::Buy,
            price: 100.0,
            amount: 2.0,
            value: 200.0,
            reason: "grid_init".to_string(),
        }];

        let path = writer.write_trades(&trades).unwrap();
        let content = fs::read_to_string(path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("timestamp,side,price,amount,value,reason"));
        assert!(lines.next().unwrap().contains(",buy,100.0,2.0,200.0,grid_init"));
    }
}
