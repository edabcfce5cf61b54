// Performance analytics over a finished equity curve and trade log

use ndarray::Array1;

use crate::backtesting::stats::{self, ANNUALIZATION_PERIODS, DAYS_PER_YEAR};
use crate::backtesting::{EquityPoint, PerformanceMetrics, Side, Trade};

/// Pure metric computation. Holds no state besides its annualization factor,
/// so analyzing the same inputs twice yields identical metrics.
#[derive(Debug, Clone, Copy)]
pub struct PerformanceAnalyzer {
    periods_per_year: f64,
}

impl PerformanceAnalyzer {
    pub fn new() -> Self {
        Self {
            periods_per_year: ANNUALIZATION_PERIODS,
        }
    }

    pub fn with_annualization(mut self, periods_per_year: f64) -> Self {
        self.periods_per_year = periods_per_year;
        self
    }

    pub fn analyze(
        &self,
        equity_curve: &[EquityPoint],
        trades: &[Trade],
        initial_capital: f64,
    ) -> PerformanceMetrics {
        let final_equity = equity_curve
            .last()
            .map(|point| point.equity)
            .unwrap_or(initial_capital);

        let elapsed_days = match (equity_curve.first(), equity_curve.last()) {
            (Some(first), Some(last)) => (last.timestamp - first.timestamp).num_days(),
            _ => 0,
        };

        let equity: Array1<f64> = equity_curve.iter().map(|point| point.equity).collect();

        PerformanceMetrics {
            initial_capital,
            final_equity,
            net_profit: final_equity - initial_capital,
            total_return_pct: total_return_pct(initial_capital, final_equity),
            cagr_pct: cagr_pct(initial_capital, final_equity, elapsed_days),
            max_drawdown_pct: max_drawdown_pct(&equity),
            sharpe_ratio: self.sharpe_ratio(&equity),
            win_rate_pct: win_rate_pct(trades),
            trade_count: trades.len(),
            elapsed_days,
        }
    }

    /// Mean over standard deviation of step returns, annualized.
    pub fn sharpe_ratio(&self, equity: &Array1<f64>) -> f64 {
        let returns = stats::simple_returns(equity.view());
        let Some(std) = stats::sample_std(returns.view()) else {
            return 0.0;
        };
        if !std.is_finite() || std <= 0.0 {
            return 0.0;
        }
        let mean = stats::mean(returns.view()).unwrap_or(0.0);
        mean / std * self.periods_per_year.sqrt()
    }
}

impl Default for PerformanceAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

pub fn total_return_pct(initial_capital: f64, final_equity: f64) -> f64 {
    if initial_capital <= 0.0 {
        return 0.0;
    }
    (final_equity - initial_capital) / initial_capital * 100.0
}

/// Geometric annual growth over whole elapsed days. Zero when no time passed.
pub fn cagr_pct(initial_capital: f64, final_equity: f64, elapsed_days: i64) -> f64 {
    let years = elapsed_days as f64 / DAYS_PER_YEAR;
    if years <= 0.0 || initial_capital <= 0.0 {
        return 0.0;
    }
    ((final_equity / initial_capital).powf(1.0 / years) - 1.0) * 100.0
}

/// Most negative percentage drop from the running peak, so always `<= 0`.
pub fn max_drawdown_pct(equity: &Array1<f64>) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for &value in equity.iter() {
        peak = peak.max(value);
        if peak > 0.0 {
            worst = worst.min((value - peak) / peak * 100.0);
        }
    }
    worst
}

/// Pairs each sell with the most recent preceding buy and counts the pairs
/// where the sell price beat the buy price.
pub fn win_rate_pct(trades: &[Trade]) -> f64 {
    let mut last_buy: Option<f64> = None;
    let mut pairs = 0usize;
    let mut wins = 0usize;

    for trade in trades {
        match trade.side {
            Side::Buy => last_buy = Some(trade.price),
            Side::Sell => {
                if let Some(buy_price) = last_buy {
                    pairs += 1;
                    if trade.price > buy_price {
                        wins += 1;
                    }
                }
            }
        }
    }

    if pairs == 0 {
        0.0
    } else {
        wins as f64 / pairs as f64 * 100.0
    }
}
