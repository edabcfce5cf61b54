// Command implementations for the grid-backtest CLI

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use grid_backtester::progress::{OptimizationProgress, Spinner};
use grid_backtester::{
    compare_strategies, BacktestBuilder, BacktestResult, ComparisonRow, Config, CsvPriceLoader,
    OptimizationRow, ParameterOptimizer, PriceHistory, PriceProvider, ReportWriter,
    StrategyConfig, SyntheticPriceGenerator, TradingError, TradingResult,
};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

pub fn config_path(explicit: Option<&Path>) -> &Path {
    explicit.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH))
}

/// Load the config file. A missing default `config.toml` falls back to
/// defaults; a missing file named with `--config` is an error.
pub fn load_config(explicit: Option<&Path>) -> TradingResult<Config> {
    let path = config_path(explicit);
    if explicit.is_none() && !path.exists() {
        warn!("⚠️  {} not found, using default configuration", path.display());
        info!("💡 Run: grid-backtest init");
        return Ok(Config::default());
    }
    Ok(Config::from_file(path)?)
}

pub fn init_config(path: &Path) -> TradingResult<()> {
    info!("🔧 Initializing configuration...");
    if path.exists() {
        warn!("⚠️  {} already exists, validating it instead", path.display());
    }
    let config = Config::load_or_create(path)?;

    info!("✅ Configuration ready: {}", path.display());
    info!("   Strategy: {}", config.strategy);
    info!("   Capital: {:.2}", config.backtest.initial_capital);
    info!("💡 Next steps:");
    info!("   1. Edit {} to pick a strategy", path.display());
    info!("   2. Run: grid-backtest backtest --data prices.csv");
    info!("   3. Run: grid-backtest optimize --data prices.csv");
    Ok(())
}

fn load_history(config: &Config, data: &Path) -> TradingResult<PriceHistory> {
    let spinner = Spinner::new(&format!("Loading price data from {}...", data.display()));
    let loader = CsvPriceLoader::new(data)
        .with_metadata(&config.backtest.trading_pair, &config.backtest.timeframe);
    match loader.load() {
        Ok(history) => {
            spinner.finish(&format!("Loaded {} price points", history.len()));
            Ok(history)
        }
        Err(e) => {
            spinner.finish_with_error(&e.to_string());
            Err(e)
        }
    }
}

/// Resolve a `--strategy` override. A bare `grid` spans the observed price range.
fn resolve_strategy(
    config: &Config,
    kind: Option<&str>,
    history: &PriceHistory,
) -> TradingResult<StrategyConfig> {
    let Some(kind) = kind else {
        return Ok(config.strategy.clone());
    };
    if kind == config.strategy.kind() {
        return Ok(config.strategy.clone());
    }
    if let Some(strategy) = StrategyConfig::default_for(kind) {
        return Ok(strategy);
    }
    if kind == "grid" {
        let (Some(low), Some(high)) = (history.min_low(), history.max_high()) else {
            return Err(TradingError::InsufficientData("empty price history".to_string()));
        };
        return Ok(StrategyConfig::grid(low, high, 20));
    }
    Err(TradingError::InvalidStrategy(kind.to_string()))
}

fn log_result(result: &BacktestResult) {
    let m = &result.metrics;
    info!("📈 Results for {}:", result.strategy_name);
    info!("   Initial Capital: {:.2}", m.initial_capital);
    info!("   Final Equity: {:.2}", m.final_equity);
    info!("   Net Profit: {:.2}", m.net_profit);
    info!("   Total Return: {:.2}%", m.total_return_pct);
    info!("   CAGR: {:.2}% over {} days", m.cagr_pct, m.elapsed_days);
    info!("   Max Drawdown: {:.2}%", m.max_drawdown_pct);
    info!("   Sharpe Ratio: {:.2}", m.sharpe_ratio);
    info!("   Win Rate: {:.1}%", m.win_rate_pct);
    info!("   Total Trades: {}", m.trade_count);
    if result.rejected_signals > 0 {
        info!("   Dropped Signals: {}", result.rejected_signals);
    }
}

fn write_reports(
    config: &Config,
    output: Option<PathBuf>,
    result: &BacktestResult,
    strategy: &StrategyConfig,
    history: &PriceHistory,
) -> TradingResult<ReportWriter> {
    let directory = output.unwrap_or_else(|| config.output.directory.clone());
    let writer = ReportWriter::new(&directory)?;
    writer.write_backtest(
        result,
        strategy,
        history,
        config.output.write_trades,
        config.output.write_equity,
    )?;
    Ok(writer)
}

pub fn run_backtest_command(
    config: &Config,
    data: &Path,
    strategy: Option<&str>,
    capital: Option<f64>,
    output: Option<PathBuf>,
) -> TradingResult<()> {
    let history = load_history(config, data)?;
    let strategy = resolve_strategy(config, strategy, &history)?;
    let capital = capital.unwrap_or(config.backtest.initial_capital);

    let result = BacktestBuilder::new()
        .with_initial_capital(capital)
        .with_strategy(strategy.clone())
        .run(&history)?;

    log_result(&result);
    let writer = write_reports(config, output, &result, &strategy, &history)?;
    info!("💾 Reports saved to {}", writer.directory().display());
    Ok(())
}

fn log_optimization_table(rows: &[OptimizationRow], top: usize) {
    info!("🏆 Top {} configurations:", top.min(rows.len()));
    info!(
        "   {:>4} {:>6} {:>6} {:>12} {:>12} {:>9} {:>9} {:>7}",
        "rank", "grids", "ratio", "lower", "upper", "return%", "maxdd%", "trades"
    );
    for row in rows.iter().take(top) {
        info!(
            "   {:>4} {:>6} {:>6.2} {:>12.2} {:>12.2} {:>9.2} {:>9.2} {:>7}",
            row.rank,
            row.grid_num,
            row.range_ratio,
            row.lower_price,
            row.upper_price,
            row.total_return,
            row.max_drawdown,
            row.trade_count
        );
    }
}

pub fn run_optimize_command(
    config: &Config,
    data: &Path,
    capital: Option<f64>,
    top: usize,
    output: Option<PathBuf>,
) -> TradingResult<()> {
    let history = load_history(config, data)?;
    let capital = capital.unwrap_or(config.backtest.initial_capital);

    let grid = config.optimization.parameter_grid();
    let optimizer =
        ParameterOptimizer::new(grid, capital).with_parallel(config.optimization.parallel);

    let progress = OptimizationProgress::new(optimizer.grid().len());
    let on_result: &(dyn Fn(&OptimizationRow) + Sync) = &|row| progress.record(row);
    let rows = match optimizer.run_with_callback(&history, Some(on_result)) {
        Ok(rows) => {
            progress.finish();
            rows
        }
        Err(e) => {
            progress.finish_with_error(&e.to_string());
            return Err(e.into());
        }
    };

    log_optimization_table(&rows, top);

    let Some(best) = rows.first() else {
        return Err(TradingError::InsufficientData("optimizer produced no results".to_string()));
    };
    let directory = output.unwrap_or_else(|| config.output.directory.clone());
    if best.parameters().is_degenerate() {
        warn!("⚠️  Price never moved; skipping the follow-up backtest");
        let writer = ReportWriter::new(&directory)?;
        writer.write_optimization(&rows)?;
        info!("💾 Reports saved to {}", writer.directory().display());
        return Ok(());
    }

    let strategy = best.to_strategy_config();
    info!("🔁 Backtesting best parameters: {}", strategy);

    let result = BacktestBuilder::new()
        .with_initial_capital(capital)
        .with_strategy(strategy.clone())
        .run(&history)?;
    log_result(&result);

    let writer = write_reports(config, Some(directory), &result, &strategy, &history)?;
    writer.write_optimization(&rows)?;
    info!("💾 Reports saved to {}", writer.directory().display());
    Ok(())
}

fn log_comparison(rows: &[ComparisonRow]) {
    info!("⚖️  Strategy comparison:");
    info!(
        "   {:<16} {:>14} {:>9} {:>9} {:>8} {:>7}",
        "strategy", "final equity", "return%", "maxdd%", "sharpe", "trades"
    );
    for row in rows {
        info!(
            "   {:<16} {:>14.2} {:>9.2} {:>9.2} {:>8.2} {:>7}",
            row.name,
            row.final_equity,
            row.total_return_pct,
            row.metrics.max_drawdown_pct,
            row.metrics.sharpe_ratio,
            row.trade_count
        );
    }
    if let Some(best) = rows
        .iter()
        .max_by(|a, b| a.total_return_pct.total_cmp(&b.total_return_pct))
    {
        info!("🥇 Best: {} ({:.2}%)", best.name, best.total_return_pct);
    }
}

fn default_lineup() -> Vec<StrategyConfig> {
    vec![
        StrategyConfig::improved_grid(),
        StrategyConfig::momentum(),
        StrategyConfig::mean_reversion(),
    ]
}

pub fn run_compare_command(
    config: &Config,
    data: &Path,
    capital: Option<f64>,
) -> TradingResult<()> {
    let history = load_history(config, data)?;
    let capital = capital.unwrap_or(config.backtest.initial_capital);
    let rows = compare_strategies(&history, &default_lineup(), capital)?;
    log_comparison(&rows);
    Ok(())
}

pub fn run_demo_command(config: &Config, seed: u64, samples: usize) -> TradingResult<()> {
    info!("🚀 Demo on {} synthetic samples (seed {})", samples, seed);
    let history = SyntheticPriceGenerator::new(seed, samples).load()?;
    if let (Some(low), Some(high)) = (history.min_low(), history.max_high()) {
        info!("   Price range: {:.2} - {:.2}", low, high);
    }

    let rows = compare_strategies(&history, &default_lineup(), config.backtest.initial_capital)?;
    log_comparison(&rows);
    Ok(())
}
