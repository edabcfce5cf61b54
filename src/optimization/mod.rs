// Grid parameter sweep: every (grid count, range ratio) pair is backtested
// independently and the table is ranked by total return.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backtesting::engine::{run_backtest, BacktestError};
use crate::backtesting::PriceHistory;
use crate::strategies::StrategyConfig;

/// Discrete search space for the fixed grid strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterGrid {
    pub grid_counts: Vec<usize>,
    pub range_ratios: Vec<f64>,
}

impl Default for ParameterGrid {
    fn default() -> Self {
        Self {
            grid_counts: vec![10, 15, 20, 25, 30],
            range_ratios: vec![0.7, 0.8, 0.9, 1.0],
        }
    }
}

impl ParameterGrid {
    pub fn len(&self) -> usize {
        self.grid_counts.len() * self.range_ratios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn validate(&self) -> Result<(), BacktestError> {
        if self.grid_counts.is_empty() || self.range_ratios.is_empty() {
            return Err(BacktestError::ConfigurationError(
                "parameter grid needs at least one grid count and one range ratio".to_string(),
            ));
        }
        if self.grid_counts.iter().any(|&n| n == 0) {
            return Err(BacktestError::ConfigurationError(
                "grid counts must be greater than 0".to_string(),
            ));
        }
        if self.range_ratios.iter().any(|&r| !(r > 0.0 && r <= 1.0)) {
            return Err(BacktestError::ConfigurationError(
                "range ratios must be in (0, 1]".to_string(),
            ));
        }
        Ok(())
    }

    /// Cartesian product, grid count major, for an observed price band.
    pub fn combinations(&self, min_price: f64, max_price: f64) -> Vec<GridParameters> {
        self.grid_counts
            .iter()
            .flat_map(|&grid_num| {
                self.range_ratios.iter().map(move |&ratio| {
                    GridParameters::from_band(grid_num, ratio, min_price, max_price)
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridParameters {
    pub grid_num: usize,
    pub range_ratio: f64,
    pub lower_price: f64,
    pub upper_price: f64,
}

impl GridParameters {
    /// Shrink `[min_price, max_price]` symmetrically to `ratio` of its width.
    pub fn from_band(grid_num: usize, range_ratio: f64, min_price: f64, max_price: f64) -> Self {
        let margin = (max_price - min_price) * (1.0 - range_ratio) / 2.0;
        Self {
            grid_num,
            range_ratio,
            lower_price: min_price + margin,
            upper_price: max_price - margin,
        }
    }

    pub fn to_strategy_config(&self) -> StrategyConfig {
        StrategyConfig::grid(self.lower_price, self.upper_price, self.grid_num)
    }

    /// A band with no width: the history never moved, so no ladder can be built.
    pub fn is_degenerate(&self) -> bool {
        self.upper_price <= self.lower_price
    }
}

/// One ranked row of the sweep table. `rank` starts at 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationRow {
    pub rank: usize,
    pub grid_num: usize,
    pub range_ratio: f64,
    pub lower_price: f64,
    pub upper_price: f64,
    pub total_return: f64,
    pub max_drawdown: f64,
    pub trade_count: usize,
    pub final_equity: f64,
}

impl OptimizationRow {
    pub fn parameters(&self) -> GridParameters {
        GridParameters {
            grid_num: self.grid_num,
            range_ratio: self.range_ratio,
            lower_price: self.lower_price,
            upper_price: self.upper_price,
        }
    }

    pub fn to_strategy_config(&self) -> StrategyConfig {
        self.parameters().to_strategy_config()
    }
}

pub type ProgressCallback<'a> = &'a (dyn Fn(&OptimizationRow) + Sync);

pub struct ParameterOptimizer {
    grid: ParameterGrid,
    initial_capital: f64,
    parallel: bool,
}

impl ParameterOptimizer {
    pub fn new(grid: ParameterGrid, initial_capital: f64) -> Self {
        Self {
            grid,
            initial_capital,
            parallel: true,
        }
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn grid(&self) -> &ParameterGrid {
        &self.grid
    }

    pub fn run(&self, history: &PriceHistory) -> Result<Vec<OptimizationRow>, BacktestError> {
        self.run_with_callback(history, None)
    }

    /// Run the sweep, calling `on_result` after each combination finishes.
    /// The callback may be invoked from worker threads in any order; the
    /// returned table is ordered by total return descending with ties kept
    /// in combination order.
    pub fn run_with_callback(
        &self,
        history: &PriceHistory,
        on_result: Option<ProgressCallback<'_>>,
    ) -> Result<Vec<OptimizationRow>, BacktestError> {
        self.grid.validate()?;

        let (Some(min_price), Some(max_price)) = (history.min_low(), history.max_high()) else {
            return Err(BacktestError::InsufficientData(
                "cannot optimize over an empty price history".to_string(),
            ));
        };
        let combinations = self.grid.combinations(min_price, max_price);
        if max_price <= min_price {
            return self.flat_market_rows(&combinations, on_result);
        }

        info!(
            "🔧 Starting parameter optimization with {} configurations ({})",
            combinations.len(),
            if self.parallel { "parallel" } else { "sequential" }
        );

        let evaluate = |params: &GridParameters| -> Result<OptimizationRow, BacktestError> {
            let result = run_backtest(history, &params.to_strategy_config(), self.initial_capital)?;
            let row = OptimizationRow {
                rank: 0,
                grid_num: params.grid_num,
                range_ratio: params.range_ratio,
                lower_price: params.lower_price,
                upper_price: params.upper_price,
                total_return: result.metrics.total_return_pct,
                max_drawdown: result.metrics.max_drawdown_pct,
                trade_count: result.metrics.trade_count,
                final_equity: result.metrics.final_equity,
            };
            debug!(
                "grid_num={} ratio={:.2}: {:.2}% return, {} trades",
                row.grid_num, row.range_ratio, row.total_return, row.trade_count
            );
            if let Some(callback) = on_result {
                callback(&row);
            }
            Ok(row)
        };

        let mut rows = if self.parallel {
            combinations.par_iter().map(evaluate).collect::<Result<Vec<_>, _>>()?
        } else {
            combinations.iter().map(evaluate).collect::<Result<Vec<_>, _>>()?
        };

        rank_rows(&mut rows);

        if let Some(best) = rows.first() {
            info!("🏆 Optimization completed!");
            info!(
                "🥇 Best configuration: {} levels, {:.2} - {:.2}, {:.2}% return, {} trades",
                best.grid_num,
                best.lower_price,
                best.upper_price,
                best.total_return,
                best.trade_count
            );
        }

        Ok(rows)
    }
}

impl ParameterOptimizer {
    /// A history that never moved gives every ladder a zero-width band. No
    /// level can be crossed, so each combination ends flat with its capital.
    fn flat_market_rows(
        &self,
        combinations: &[GridParameters],
        on_result: Option<ProgressCallback<'_>>,
    ) -> Result<Vec<OptimizationRow>, BacktestError> {
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(BacktestError::ConfigurationError(
                "initial capital must be positive".to_string(),
            ));
        }
        warn!(
            "⚠️  Price never moved ({:.4}); reporting {} neutral configurations",
            combinations.first().map_or(0.0, |p| p.lower_price),
            combinations.len()
        );

        let mut rows: Vec<OptimizationRow> = combinations
            .iter()
            .map(|params| OptimizationRow {
                rank: 0,
                grid_num: params.grid_num,
                range_ratio: params.range_ratio,
                lower_price: params.lower_price,
                upper_price: params.upper_price,
                total_return: 0.0,
                max_drawdown: 0.0,
                trade_count: 0,
                final_equity: self.initial_capital,
            })
            .collect();
        if let Some(callback) = on_result {
            for row in &rows {
                callback(row);
            }
        }
        rank_rows(&mut rows);
        Ok(rows)
    }
}

/// Stable sort by total return descending, then number ranks from 1.
pub fn rank_rows(rows: &mut [OptimizationRow]) {
    rows.sort_by(|a, b| b.total_return.total_cmp(&a.total_return));
    for (i, row) in rows.iter_mut().enumerate() {
        row.rank = i + 1;
    }
}

/// Sweep `grid` over `history` with default (parallel) execution.
pub fn run_optimization(
    history: &PriceHistory,
    grid: &ParameterGrid,
    initial_capital: f64,
) -> Result<Vec<OptimizationRow>, BacktestError> {
    ParameterOptimizer::new(grid.clone(), initial_capital).run(history)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn row(total_return: f64, grid_num: usize) -> OptimizationRow {
        OptimizationRow {
            rank: 0,
            grid_num,
            range_ratio: 1.0,
            lower_price: 90.0,
            upper_price: 110.0,
            total_return,
            max_drawdown: 0.0,
            trade_count: 0,
            final_equity: 0.0,
        }
    }

    #[test]
    fn test_default_grid_has_twenty_combinations() {
        let grid = ParameterGrid::default();
        assert_eq!(grid.len(), 20);
        assert_eq!(grid.combinations(100.0, 200.0).len(), 20);
    }

    #[test]
    fn test_band_shrinks_symmetrically() {
        let params = GridParameters::from_band(10, 0.8, 100.0, 200.0);
        assert_relative_eq!(params.lower_price, 110.0, epsilon = 1e-9);
        assert_relative_eq!(params.upper_price, 190.0, epsilon = 1e-9);

        let full = GridParameters::from_band(10, 1.0, 100.0, 200.0);
        assert_eq!((full.lower_price, full.upper_price), (100.0, 200.0));
    }

    #[test]
    fn test_combinations_are_grid_count_major() {
        let grid = ParameterGrid {
            grid_counts: vec![5, 10],
            range_ratios: vec![0.5, 1.0],
        };
        let order: Vec<(usize, f64)> = grid
            .combinations(1.0, 2.0)
            .iter()
            .map(|p| (p.grid_num, p.range_ratio))
            .collect();
        assert_eq!(order, vec![(5, 0.5), (5, 1.0), (10, 0.5), (10, 1.0)]);
    }

    #[test]
    fn test_validation() {
        let mut grid = ParameterGrid::default();
        grid.range_ratios.push(1.5);
        assert!(grid.validate().is_err());

        let empty = ParameterGrid {
            grid_counts: vec![],
            range_ratios: vec![1.0],
        };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_rank_rows_is_stable_on_ties() {
        let mut rows = vec![row(1.0, 10), row(5.0, 15), row(1.0, 20), row(-2.0, 25)];
        rank_rows(&mut rows);

        let order: Vec<usize> = rows.iter().map(|r| r.grid_num).collect();
        assert_eq!(order, vec![15, 10, 20, 25]);
        let ranks: Vec<usize> = rows.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_flat_history_yields_neutral_table() {
        use chrono::{Duration, TimeZone, Utc};

        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let history =
            PriceHistory::from_closes(&[100.0, 100.0, 100.0], start, Duration::days(1)).unwrap();
        let rows = run_optimization(&history, &ParameterGrid::default(), 1_000.0).unwrap();

        assert_eq!(rows.len(), 20);
        assert_eq!((rows[0].grid_num, rows[0].range_ratio), (10, 0.7));
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.rank, i + 1);
            assert_eq!(row.total_return, 0.0);
            assert_eq!(row.trade_count, 0);
            assert_eq!(row.final_equity, 1_000.0);
            assert!(row.parameters().is_degenerate());
        }

        let broke = ParameterOptimizer::new(ParameterGrid::default(), 0.0).run(&history);
        assert!(matches!(broke, Err(BacktestError::ConfigurationError(_))));
    }

    #[test]
    fn test_row_converts_to_grid_config() {
        let config = row(0.0, 12).to_strategy_config();
        assert_eq!(config, StrategyConfig::grid(90.0, 110.0, 12));
    }
}
