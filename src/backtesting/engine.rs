// Simulation engine that replays a price history through one strategy

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::backtesting::analytics::PerformanceAnalyzer;
use crate::backtesting::ledger::Ledger;
use crate::backtesting::{
    BacktestResult, EquityPoint, PerformanceMetrics, PriceHistory, PriceWindow,
};
use crate::strategies::{Strategy, StrategyConfig, TradingStrategy};

#[derive(Debug, thiserror::Error)]
pub enum BacktestError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid price history: {0}")]
    InvalidPriceHistory(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

/// Drives one strategy against one ledger, step by step.
///
/// Each step hands the strategy every sample up to and including the
/// current one, applies the emitted signals in order, mirrors accepted ones
/// back into the strategy, and marks equity at the step's close.
pub struct SimulationEngine<S: TradingStrategy> {
    strategy: S,
    ledger: Ledger,
    analyzer: PerformanceAnalyzer,
}

impl<S: TradingStrategy> SimulationEngine<S> {
    pub fn new(strategy: S, initial_capital: f64) -> Self {
        Self {
            strategy,
            ledger: Ledger::new(initial_capital),
            analyzer: PerformanceAnalyzer::new(),
        }
    }

    pub fn with_analyzer(mut self, analyzer: PerformanceAnalyzer) -> Self {
        self.analyzer = analyzer;
        self
    }

    /// Advance one step. Returns `None` only for an empty window.
    pub fn step(&mut self, window: PriceWindow<'_>) -> Option<EquityPoint> {
        let sample = *window.latest_sample()?;

        let signals = self.strategy.get_signals(window, sample.timestamp);
        if !signals.is_empty() {
            debug!(
                "{} emitted {} signal(s) at {} (close {:.4})",
                self.strategy.name(),
                signals.len(),
                sample.timestamp,
                sample.close
            );
        }

        for signal in &signals {
            if self.ledger.apply(signal).is_some() {
                self.strategy.apply(signal);
            }
        }

        Some(self.ledger.record_equity(sample.close, sample.timestamp))
    }

    /// Replay the whole history and compute metrics.
    pub fn run(mut self, history: &PriceHistory) -> Result<BacktestResult, BacktestError> {
        if history.is_empty() {
            return Err(BacktestError::InsufficientData(
                "price history has no samples".to_string(),
            ));
        }

        for i in 0..history.len() {
            self.step(history.up_to(i));
        }

        let strategy_name = self.strategy.name().to_string();
        let initial_capital = self.ledger.initial_capital();
        let rejected_signals = self.ledger.rejected_signals();
        let (trades, equity_curve, final_state) = self.ledger.into_parts();
        let metrics = self.analyzer.analyze(&equity_curve, &trades, initial_capital);

        debug!(
            "{} finished: {} trades, {} signals dropped",
            strategy_name,
            trades.len(),
            rejected_signals
        );

        Ok(BacktestResult {
            strategy_name,
            initial_capital,
            metrics,
            equity_curve,
            trades,
            final_state,
            rejected_signals,
        })
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }
}

fn check_capital(initial_capital: f64) -> Result<(), BacktestError> {
    if !(initial_capital.is_finite() && initial_capital > 0.0) {
        return Err(BacktestError::ConfigurationError(format!(
            "initial capital must be positive, got {}",
            initial_capital
        )));
    }
    Ok(())
}

/// Run `strategy` over `history` with a fresh ledger.
pub fn run_backtest(
    history: &PriceHistory,
    strategy: &StrategyConfig,
    initial_capital: f64,
) -> Result<BacktestResult, BacktestError> {
    check_capital(initial_capital)?;
    let built = strategy.build(initial_capital)?;
    SimulationEngine::new(built, initial_capital).run(history)
}

/// One line of a strategy comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub name: String,
    pub final_equity: f64,
    pub total_return_pct: f64,
    pub trade_count: usize,
    pub metrics: PerformanceMetrics,
}

/// Run every strategy against the same history with independent ledgers.
/// Rows come back in input order.
pub fn compare_strategies(
    history: &PriceHistory,
    strategies: &[StrategyConfig],
    initial_capital: f64,
) -> Result<Vec<ComparisonRow>, BacktestError> {
    info!("⚖️  Comparing {} strategies over {} samples", strategies.len(), history.len());

    strategies
        .iter()
        .map(|config| {
            let result = run_backtest(history, config, initial_capital)?;
            info!(
                "   {}: {:.2}% return, {} trades",
                result.strategy_name, result.metrics.total_return_pct, result.metrics.trade_count
            );
            Ok(ComparisonRow {
                name: result.strategy_name,
                final_equity: result.metrics.final_equity,
                total_return_pct: result.metrics.total_return_pct,
                trade_count: result.metrics.trade_count,
                metrics: result.metrics,
            })
        })
        .collect()
}

/// Builder pattern for easier backtest configuration
pub struct BacktestBuilder {
    initial_capital: f64,
    strategy: StrategyConfig,
    analyzer: PerformanceAnalyzer,
}

impl BacktestBuilder {
    pub fn new() -> Self {
        Self {
            initial_capital: 10_000.0,
            strategy: StrategyConfig::default(),
            analyzer: PerformanceAnalyzer::new(),
        }
    }

    pub fn with_initial_capital(mut self, capital: f64) -> Self {
        self.initial_capital = capital;
        self
    }

    pub fn with_strategy(mut self, strategy: StrategyConfig) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_annualization(mut self, periods_per_year: f64) -> Self {
        self.analyzer = self.analyzer.with_annualization(periods_per_year);
        self
    }

    pub fn build(self) -> Result<SimulationEngine<Strategy>, BacktestError> {
        check_capital(self.initial_capital)?;
        let strategy = self.strategy.build(self.initial_capital)?;
        Ok(SimulationEngine::new(strategy, self.initial_capital).with_analyzer(self.analyzer))
    }

    pub fn run(self, history: &PriceHistory) -> Result<BacktestResult, BacktestError> {
        info!(
            "🚀 Starting backtest: {} on {} samples, capital {:.2}",
            self.strategy, history.len(), self.initial_capital
        );
        let result = self.build()?.run(history)?;

        let m = &result.metrics;
        info!("✅ Backtest completed!");
        info!("📊 Total Return: {:.2}%", m.total_return_pct);
        info!("📊 Sharpe Ratio: {:.2}", m.sharpe_ratio);
        info!("📊 Max Drawdown: {:.2}%", m.max_drawdown_pct);
        info!("📊 Total Trades: {}", m.trade_count);
        info!("📊 Win Rate: {:.1}%", m.win_rate_pct);

        Ok(result)
    }
}

impl Default for BacktestBuilder {
    fn default() -> Self {
        Self::new()
    }
}
