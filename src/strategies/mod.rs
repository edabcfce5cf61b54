//! Strategy state machines.
//!
//! Every strategy consumes a price window and emits zero or more signals per
//! step, and keeps its own shadow copy of position bookkeeping which the
//! engine updates through [`TradingStrategy::apply`] after the ledger has
//! executed a signal.

pub mod grid;
pub mod improved_grid;
pub mod mean_reversion;
pub mod momentum;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::backtesting::engine::BacktestError;
use crate::backtesting::{PriceWindow, Signal};

pub use grid::{GridLevel, GridStrategy, LevelStatus};
pub use improved_grid::ImprovedGridStrategy;
pub use mean_reversion::MeanReversionStrategy;
pub use momentum::MomentumStrategy;

/// Share of capital committed by single-entry strategies.
pub(crate) const FULL_ENTRY_FRACTION: f64 = 0.95;

pub trait TradingStrategy {
    fn name(&self) -> &str;

    /// Signals for the step ending at the last sample of `window`.
    fn get_signals(&mut self, window: PriceWindow<'_>, timestamp: DateTime<Utc>) -> Vec<Signal>;

    /// Mirror an executed signal into the strategy's shadow bookkeeping.
    fn apply(&mut self, signal: &Signal);
}

impl<T: TradingStrategy + ?Sized> TradingStrategy for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn get_signals(&mut self, window: PriceWindow<'_>, timestamp: DateTime<Utc>) -> Vec<Signal> {
        (**self).get_signals(window, timestamp)
    }

    fn apply(&mut self, signal: &Signal) {
        (**self).apply(signal)
    }
}

/// The four concrete strategies as one tagged variant.
#[derive(Debug, Clone)]
pub enum Strategy {
    Grid(GridStrategy),
    ImprovedGrid(ImprovedGridStrategy),
    Momentum(MomentumStrategy),
    MeanReversion(MeanReversionStrategy),
}

impl TradingStrategy for Strategy {
    fn name(&self) -> &str {
        match self {
            Strategy::Grid(s) => s.name(),
            Strategy::ImprovedGrid(s) => s.name(),
            Strategy::Momentum(s) => s.name(),
            Strategy::MeanReversion(s) => s.name(),
        }
    }

    fn get_signals(&mut self, window: PriceWindow<'_>, timestamp: DateTime<Utc>) -> Vec<Signal> {
        match self {
            Strategy::Grid(s) => s.get_signals(window, timestamp),
            Strategy::ImprovedGrid(s) => s.get_signals(window, timestamp),
            Strategy::Momentum(s) => s.get_signals(window, timestamp),
            Strategy::MeanReversion(s) => s.get_signals(window, timestamp),
        }
    }

    fn apply(&mut self, signal: &Signal) {
        match self {
            Strategy::Grid(s) => s.apply(signal),
            Strategy::ImprovedGrid(s) => s.apply(signal),
            Strategy::Momentum(s) => s.apply(signal),
            Strategy::MeanReversion(s) => s.apply(signal),
        }
    }
}

/// Serializable strategy parameters, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    /// Fixed ladder between two bounds.
    Grid {
        lower_price: f64,
        upper_price: f64,
        #[serde(default = "default_grid_num")]
        grid_num: usize,
        /// Capital the ladder is sized for; the initial capital when omitted.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        total_amount: Option<f64>,
    },
    /// Ladder recentred every step from trailing volatility, with a stop-loss.
    ImprovedGrid {
        #[serde(default = "default_improved_grid_num")]
        grid_num: usize,
        #[serde(default = "default_volatility_window")]
        volatility_window: usize,
        #[serde(default = "default_stop_loss_pct")]
        stop_loss_pct: f64,
    },
    Momentum {
        #[serde(default = "default_lookback")]
        lookback: usize,
        #[serde(default = "default_momentum_threshold")]
        threshold: f64,
        /// Percent loss from entry that liquidates the position; off when omitted.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stop_loss_pct: Option<f64>,
    },
    MeanReversion {
        #[serde(default = "default_ma_period")]
        ma_period: usize,
        #[serde(default = "default_std_threshold")]
        std_threshold: f64,
    },
}

fn default_grid_num() -> usize {
    20
}

fn default_improved_grid_num() -> usize {
    15
}

fn default_volatility_window() -> usize {
    30
}

fn default_stop_loss_pct() -> f64 {
    15.0
}

fn default_lookback() -> usize {
    20
}

fn default_momentum_threshold() -> f64 {
    0.02
}

fn default_ma_period() -> usize {
    20
}

fn default_std_threshold() -> f64 {
    2.0
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self::improved_grid()
    }
}

impl StrategyConfig {
    pub fn improved_grid() -> Self {
        StrategyConfig::ImprovedGrid {
            grid_num: default_improved_grid_num(),
            volatility_window: default_volatility_window(),
            stop_loss_pct: default_stop_loss_pct(),
        }
    }

    pub fn momentum() -> Self {
        StrategyConfig::Momentum {
            lookback: default_lookback(),
            threshold: default_momentum_threshold(),
            stop_loss_pct: None,
        }
    }

    pub fn mean_reversion() -> Self {
        StrategyConfig::MeanReversion {
            ma_period: default_ma_period(),
            std_threshold: default_std_threshold(),
        }
    }

    pub fn grid(lower_price: f64, upper_price: f64, grid_num: usize) -> Self {
        StrategyConfig::Grid {
            lower_price,
            upper_price,
            grid_num,
            total_amount: None,
        }
    }

    /// Default parameters for a kind name. Fixed grids need explicit bounds
    /// and therefore have no default.
    pub fn default_for(kind: &str) -> Option<Self> {
        match kind {
            "improved_grid" | "improved-grid" => Some(Self::improved_grid()),
            "momentum" => Some(Self::momentum()),
            "mean_reversion" | "mean-reversion" => Some(Self::mean_reversion()),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StrategyConfig::Grid { .. } => "grid",
            StrategyConfig::ImprovedGrid { .. } => "improved_grid",
            StrategyConfig::Momentum { .. } => "momentum",
            StrategyConfig::MeanReversion { .. } => "mean_reversion",
        }
    }

    pub fn validate(&self) -> Result<(), BacktestError> {
        match *self {
            StrategyConfig::Grid {
                lower_price,
                upper_price,
                grid_num,
                total_amount,
            } => {
                if grid_num == 0 {
                    return Err(invalid("grid_num must be greater than 0"));
                }
                if !(lower_price.is_finite() && lower_price > 0.0) {
                    return Err(invalid("lower_price must be positive"));
                }
                if !(upper_price.is_finite() && upper_price > lower_price) {
                    return Err(invalid("upper_price must be greater than lower_price"));
                }
                if let Some(amount) = total_amount {
                    if !(amount.is_finite() && amount > 0.0) {
                        return Err(invalid("total_amount must be positive"));
                    }
                }
            }
            StrategyConfig::ImprovedGrid {
                grid_num,
                volatility_window,
                stop_loss_pct,
            } => {
                if grid_num == 0 {
                    return Err(invalid("grid_num must be greater than 0"));
                }
                // Volatility needs at least two simple returns.
                if volatility_window < 3 {
                    return Err(invalid("volatility_window must be at least 3"));
                }
                if !(stop_loss_pct.is_finite() && stop_loss_pct > 0.0) {
                    return Err(invalid("stop_loss_pct must be positive"));
                }
            }
            StrategyConfig::Momentum {
                lookback,
                threshold,
                stop_loss_pct,
            } => {
                if lookback == 0 {
                    return Err(invalid("lookback must be greater than 0"));
                }
                if !(threshold.is_finite() && threshold >= 0.0) {
                    return Err(invalid("threshold must be non-negative"));
                }
                if let Some(pct) = stop_loss_pct {
                    if !(pct.is_finite() && pct > 0.0) {
                        return Err(invalid("stop_loss_pct must be positive"));
                    }
                }
            }
            StrategyConfig::MeanReversion {
                ma_period,
                std_threshold,
            } => {
                if ma_period < 2 {
                    return Err(invalid("ma_period must be at least 2"));
                }
                if !(std_threshold.is_finite() && std_threshold >= 0.0) {
                    return Err(invalid("std_threshold must be non-negative"));
                }
            }
        }
        Ok(())
    }

    /// Validate and instantiate the strategy for a run starting with
    /// `initial_capital`.
    pub fn build(&self, initial_capital: f64) -> Result<Strategy, BacktestError> {
        self.validate()?;
        let strategy = match *self {
            StrategyConfig::Grid {
                lower_price,
                upper_price,
                grid_num,
                total_amount,
            } => Strategy::Grid(GridStrategy::new(
                lower_price,
                upper_price,
                grid_num,
                total_amount.unwrap_or(initial_capital),
            )),
            StrategyConfig::ImprovedGrid {
                grid_num,
                volatility_window,
                stop_loss_pct,
            } => Strategy::ImprovedGrid(ImprovedGridStrategy::new(
                initial_capital,
                grid_num,
                volatility_window,
                stop_loss_pct,
            )),
            StrategyConfig::Momentum {
                lookback,
                threshold,
                stop_loss_pct,
            } => {
                let strategy = MomentumStrategy::new(initial_capital, lookback, threshold);
                Strategy::Momentum(match stop_loss_pct {
                    Some(pct) => strategy.with_stop_loss(pct),
                    None => strategy,
                })
            }
            StrategyConfig::MeanReversion {
                ma_period,
                std_threshold,
            } => Strategy::MeanReversion(MeanReversionStrategy::new(
                initial_capital,
                ma_period,
                std_threshold,
            )),
        };
        Ok(strategy)
    }
}

impl fmt::Display for StrategyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyConfig::Grid {
                lower_price,
                upper_price,
                grid_num,
                ..
            } => write!(
                f,
                "grid ({} levels, {:.2} - {:.2})",
                grid_num, lower_price, upper_price
            ),
            StrategyConfig::ImprovedGrid {
                grid_num,
                volatility_window,
                stop_loss_pct,
            } => write!(
                f,
                "improved_grid ({} levels, {} bar volatility, {:.1}% stop)",
                grid_num, volatility_window, stop_loss_pct
            ),
            StrategyConfig::Momentum {
                lookback,
                threshold,
                stop_loss_pct,
            } => {
                write!(
                    f,
                    "momentum ({} bar lookback, {:.2}% threshold",
                    lookback,
                    threshold * 100.0
                )?;
                if let Some(pct) = stop_loss_pct {
                    write!(f, ", {:.1}% stop", pct)?;
                }
                write!(f, ")")
            }
            StrategyConfig::MeanReversion {
                ma_period,
                std_threshold,
            } => write!(
                f,
                "mean_reversion ({} bar mean, z < -{:.2})",
                ma_period, std_threshold
            ),
        }
    }
}

fn invalid(msg: &str) -> BacktestError {
    BacktestError::ConfigurationError(msg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_each_kind() {
        let configs = vec![
            StrategyConfig::grid(90.0, 110.0, 4),
            StrategyConfig::improved_grid(),
            StrategyConfig::momentum(),
            StrategyConfig::mean_reversion(),
        ];

        for config in configs {
            let strategy = config.build(10_000.0).expect("valid config");
            assert_eq!(strategy.name(), config.kind());
        }
    }

    #[test]
    fn test_grid_bounds_validation() {
        assert!(StrategyConfig::grid(110.0, 90.0, 4).validate().is_err());
        assert!(StrategyConfig::grid(90.0, 110.0, 0).validate().is_err());
        assert!(StrategyConfig::grid(-1.0, 110.0, 4).validate().is_err());
    }

    #[test]
    fn test_window_validation() {
        let config = StrategyConfig::ImprovedGrid {
            grid_num: 10,
            volatility_window: 2,
            stop_loss_pct: 10.0,
        };
        assert!(config.validate().is_err());

        let config = StrategyConfig::MeanReversion {
            ma_period: 1,
            std_threshold: 2.0,
        };
        assert!(config.validate().is_err());

        let config = StrategyConfig::Momentum {
            lookback: 5,
            threshold: 0.02,
            stop_loss_pct: Some(0.0),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_for_kind_names() {
        assert_eq!(StrategyConfig::default_for("momentum"), Some(StrategyConfig::momentum()));
        assert_eq!(
            StrategyConfig::default_for("mean-reversion"),
            Some(StrategyConfig::mean_reversion())
        );
        assert_eq!(StrategyConfig::default_for("grid"), None);
    }

    #[test]
    fn test_serde_tagging_fills_defaults() {
        let config: StrategyConfig =
            serde_json::from_str(r#"{"kind":"momentum","lookback":5}"#).unwrap();
        assert_eq!(
            config,
            StrategyConfig::Momentum {
                lookback: 5,
                threshold: 0.02,
                stop_loss_pct: None,
            }
        );

        let config: StrategyConfig =
            serde_json::from_str(r#"{"kind":"momentum","stop_loss_pct":5.0}"#).unwrap();
        assert_eq!(config.to_string(), "momentum (20 bar lookback, 2.00% threshold, 5.0% stop)");
    }
}
