// Grid Backtester Library
//
// Deterministic replay of price history through grid, momentum and
// mean-reversion strategies, with performance analytics and parameter sweeps

pub mod backtesting;
pub mod config;
pub mod data;
pub mod error;       // Unified error handling
pub mod optimization;
pub mod progress;
pub mod report;
pub mod strategies;

// Re-export error types
pub use error::{TradingError, TradingResult};

// Re-export configuration
pub use config::{
    BacktestSettings, Config, ConfigError, LoggingSettings, OptimizationSettings, OutputSettings,
};

// Re-export backtesting components
pub use backtesting::{
    analytics::PerformanceAnalyzer,
    engine::{
        compare_strategies, run_backtest, BacktestBuilder, BacktestError, ComparisonRow,
        SimulationEngine,
    },
    ledger::Ledger,
    BacktestResult, EquityPoint, PerformanceMetrics, PortfolioState, PriceHistory, PriceSample,
    PriceWindow, Side, Signal, Trade,
};

// Re-export strategies
pub use strategies::{
    GridStrategy, ImprovedGridStrategy, MeanReversionStrategy, MomentumStrategy, Strategy,
    StrategyConfig, TradingStrategy,
};

// Re-export optimization components
pub use optimization::{
    run_optimization, GridParameters, OptimizationRow, ParameterGrid, ParameterOptimizer,
};

// Re-export data and reporting
pub use data::{CsvPriceLoader, PriceProvider, SyntheticPriceGenerator};
pub use report::{ReportWriter, RunSummary};
