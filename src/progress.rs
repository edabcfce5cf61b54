//! Progress bar utilities for long-running operations
//!
//! Only the CLI draws progress. The optimizer reports each finished
//! combination through a callback, which `OptimizationProgress::record` is
//! shaped to serve from rayon worker threads.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

use crate::optimization::OptimizationRow;

/// Progress bar for optimization sweeps
pub struct OptimizationProgress {
    pub progress: ProgressBar,
    total_iterations: usize,
    best_return: Mutex<Option<f64>>,
}

impl OptimizationProgress {
    pub fn new(total_iterations: usize) -> Self {
        let progress = ProgressBar::new(total_iterations as u64);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})\n{msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );

        Self {
            progress,
            total_iterations,
            best_return: Mutex::new(None),
        }
    }

    /// Count one finished combination and refresh the best-so-far line.
    pub fn record(&self, row: &OptimizationRow) {
        let best = match self.best_return.lock() {
            Ok(mut best) => {
                if best.map_or(true, |b| row.total_return > b) {
                    *best = Some(row.total_return);
                }
                *best
            }
            Err(_) => None,
        };

        self.progress.inc(1);
        self.progress.set_message(format!(
            "🎯 Best Return: {:.2}% | Tested: {} levels @ {:.0}% range",
            best.unwrap_or(row.total_return),
            row.grid_num,
            row.range_ratio * 100.0
        ));
    }

    pub fn best_return(&self) -> Option<f64> {
        self.best_return.lock().ok().and_then(|best| *best)
    }

    /// Mark optimization as complete
    pub fn finish(&self) {
        let message = match self.best_return() {
            Some(best) => format!(
                "✅ Optimization complete! {} configurations, best return: {:.2}%",
                self.total_iterations, best
            ),
            None => format!("✅ Optimization complete! {} configurations", self.total_iterations),
        };
        self.progress.finish_with_message(message);
    }

    /// Mark optimization as failed
    pub fn finish_with_error(&self, error: &str) {
        self.progress.finish_with_message(format!("❌ Failed: {}", error));
    }
}

/// Spinner for single runs and data loading
pub struct Spinner {
    pub spinner: ProgressBar,
}

impl Spinner {
    pub fn new(message: &str) -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner.set_message(message.to_string());

        Self { spinner }
    }

    /// Finish spinner with success
    pub fn finish(&self, message: &str) {
        self.spinner.finish_with_message(format!("✅ {}", message));
    }

    /// Finish spinner with error
    pub fn finish_with_error(&self, message: &str) {
        self.spinner.finish_with_message(format!("❌ {}", message));
    }
}
