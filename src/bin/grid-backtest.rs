// Grid Backtester CLI
// Single entry point for backtests, parameter sweeps and strategy comparisons

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::EnvFilter;

use grid_backtester::{Config, TradingResult};

#[path = "../cli/commands.rs"]
mod commands;

#[derive(Parser)]
#[command(name = "grid-backtest")]
#[command(version = "0.3.0")]
#[command(
    about = "Deterministic backtesting for grid, momentum and mean-reversion strategies",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path [default: config.toml, defaults used when absent]
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,

    /// Backtest the configured strategy on a price CSV
    Backtest {
        /// Price data CSV (exchange kline export or headered OHLCV)
        #[arg(short, long)]
        data: PathBuf,

        /// Strategy kind overriding the config (grid, improved_grid, momentum, mean_reversion)
        #[arg(short, long)]
        strategy: Option<String>,

        /// Initial capital overriding the config
        #[arg(long)]
        capital: Option<f64>,

        /// Output directory overriding the config
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Sweep grid count and range ratio, then backtest the best parameters
    Optimize {
        #[arg(short, long)]
        data: PathBuf,

        #[arg(long)]
        capital: Option<f64>,

        /// Number of ranked rows to print
        #[arg(short, long, default_value = "5")]
        top: usize,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compare improved grid, momentum and mean reversion with default parameters
    Compare {
        #[arg(short, long)]
        data: PathBuf,

        #[arg(long)]
        capital: Option<f64>,
    },

    /// Compare strategies on a seeded synthetic price history
    Demo {
        #[arg(long, default_value = "42")]
        seed: u64,

        #[arg(long, default_value = "2000")]
        samples: usize,
    },
}

fn main() {
    let cli = Cli::parse();

    // Setup logging first so config errors are visible
    let default_level = if cli.verbose {
        "debug".to_string()
    } else {
        Config::from_file(commands::config_path(cli.config.as_deref()))
            .map(|config| config.logging.level)
            .unwrap_or_else(|_| "info".to_string())
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    if let Err(e) = run(cli) {
        error!("❌ {} error", e.category());
        error!("{}", e.user_message());
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> TradingResult<()> {
    match cli.command {
        // Init doesn't require config (it creates it)
        Commands::Init => commands::init_config(commands::config_path(cli.config.as_deref())),

        Commands::Backtest { data, strategy, capital, output } => {
            let config = commands::load_config(cli.config.as_deref())?;
            commands::run_backtest_command(&config, &data, strategy.as_deref(), capital, output)
        }

        Commands::Optimize { data, capital, top, output } => {
            let config = commands::load_config(cli.config.as_deref())?;
            commands::run_optimize_command(&config, &data, capital, top, output)
        }

        Commands::Compare { data, capital } => {
            let config = commands::load_config(cli.config.as_deref())?;
            commands::run_compare_command(&config, &data, capital)
        }

        Commands::Demo { seed, samples } => {
            let config = commands::load_config(cli.config.as_deref())?;
            commands::run_demo_command(&config, seed, samples)
        }
    }
}
