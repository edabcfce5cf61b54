//! Application-level error handling for the backtester
//!
//! Library internals report `BacktestError` and `ConfigError`; everything the
//! CLI touches (files, CSV, reports) funnels into `TradingError`, which adds
//! a category and a user-facing hint.

use std::fmt;
use std::io;

use crate::backtesting::engine::BacktestError;
use crate::config::ConfigError;

#[derive(Debug)]
pub enum TradingError {
    // Configuration errors
    ConfigNotFound(String),
    ConfigParse(String),
    ConfigValidation(String),

    // Price data errors
    DataParse { row: usize, reason: String },
    InsufficientData(String),
    InvalidPriceHistory(String),

    // Parameter errors
    InvalidParameter(String, String), // (parameter_name, reason)
    InvalidStrategy(String),

    // IO errors
    FileNotFound(String),
    FileRead(String),
    FileWrite(String),
    DirectoryCreate(String),
    Serialization(String),

    Internal(String),
}

impl TradingError {
    /// Get a user-friendly error message with helpful context
    pub fn user_message(&self) -> String {
        match self {
            TradingError::ConfigNotFound(path) => {
                format!(
                    "Configuration file not found: {}\n\n\
                    💡 Quick fix:\n\
                    1. Run: grid-backtest init\n\
                    2. Edit config.toml\n\
                    3. Try again",
                    path
                )
            }
            TradingError::ConfigValidation(msg) => {
                format!(
                    "Configuration validation error: {}\n\n\
                    💡 Check config.toml for:\n\
                    - Positive capital and prices\n\
                    - Non-empty optimization axes\n\
                    - Range ratios between 0 and 1",
                    msg
                )
            }
            TradingError::DataParse { row, reason } => {
                format!(
                    "Could not parse price data at row {}: {}\n\n\
                    💡 Expected either a headerless exchange kline export\n\
                    or a header of timestamp,open,high,low,close,volume",
                    row, reason
                )
            }
            TradingError::InsufficientData(msg) => {
                format!(
                    "Not enough price data: {}\n\n\
                    💡 Try a longer history or a smaller strategy window",
                    msg
                )
            }
            TradingError::InvalidStrategy(kind) => {
                format!(
                    "Unknown strategy: {}\n\n\
                    💡 Valid kinds: grid, improved_grid, momentum, mean_reversion\n\
                    Fixed grids need lower_price and upper_price in config.toml",
                    kind
                )
            }
            _ => self.to_string(),
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            TradingError::ConfigNotFound(_)
            | TradingError::ConfigParse(_)
            | TradingError::ConfigValidation(_) => "config",

            TradingError::DataParse { .. }
            | TradingError::InsufficientData(_)
            | TradingError::InvalidPriceHistory(_) => "data",

            TradingError::InvalidParameter(_, _) | TradingError::InvalidStrategy(_) => "validation",

            TradingError::FileNotFound(_)
            | TradingError::FileRead(_)
            | TradingError::FileWrite(_)
            | TradingError::DirectoryCreate(_)
            | TradingError::Serialization(_) => "io",

            TradingError::Internal(_) => "internal",
        }
    }
}

impl fmt::Display for TradingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradingError::ConfigNotFound(path) => {
                write!(f, "Configuration file not found: {}", path)
            }
            TradingError::ConfigParse(msg) => {
                write!(f, "Configuration parse error: {}", msg)
            }
            TradingError::ConfigValidation(msg) => {
                write!(f, "Configuration validation error: {}", msg)
            }

            TradingError::DataParse { row, reason } => {
                write!(f, "Price data parse error at row {}: {}", row, reason)
            }
            TradingError::InsufficientData(msg) => {
                write!(f, "Insufficient data: {}", msg)
            }
            TradingError::InvalidPriceHistory(msg) => {
                write!(f, "Invalid price history: {}", msg)
            }

            TradingError::InvalidParameter(param, reason) => {
                write!(f, "Invalid parameter '{}': {}", param, reason)
            }
            TradingError::InvalidStrategy(msg) => {
                write!(f, "Invalid strategy: {}", msg)
            }

            TradingError::FileNotFound(path) => {
                write!(f, "File not found: {}", path)
            }
            TradingError::FileRead(msg) => {
                write!(f, "File read error: {}", msg)
            }
            TradingError::FileWrite(msg) => {
                write!(f, "File write error: {}", msg)
            }
            TradingError::DirectoryCreate(msg) => {
                write!(f, "Directory creation error: {}", msg)
            }
            TradingError::Serialization(msg) => {
                write!(f, "Serialization error: {}", msg)
            }

            TradingError::Internal(msg) => {
                write!(f, "Internal error: {}", msg)
            }
        }
    }
}

impl std::error::Error for TradingError {}

// Conversion implementations for common error types

impl From<io::Error> for TradingError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => TradingError::FileNotFound(err.to_string()),
            io::ErrorKind::PermissionDenied => TradingError::FileRead(err.to_string()),
            _ => TradingError::Internal(format!("IO error: {}", err)),
        }
    }
}

impl From<csv::Error> for TradingError {
    fn from(err: csv::Error) -> Self {
        let row = err
            .position()
            .map(|pos| pos.line() as usize)
            .unwrap_or(0);
        match err.kind() {
            csv::ErrorKind::Io(_) => TradingError::FileRead(err.to_string()),
            csv::ErrorKind::Serialize(_) => TradingError::Serialization(err.to_string()),
            _ => TradingError::DataParse {
                row,
                reason: err.to_string(),
            },
        }
    }
}

impl From<serde_json::Error> for TradingError {
    fn from(err: serde_json::Error) -> Self {
        TradingError::Serialization(format!("JSON error: {}", err))
    }
}

impl From<toml::de::Error> for TradingError {
    fn from(err: toml::de::Error) -> Self {
        TradingError::ConfigParse(format!("TOML parse error: {}", err))
    }
}

impl From<ConfigError> for TradingError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NotFound(path) => TradingError::ConfigNotFound(path),
            ConfigError::FileRead(msg) => TradingError::FileRead(msg),
            ConfigError::FileWrite(msg) => TradingError::FileWrite(msg),
            ConfigError::Parse(msg) => TradingError::ConfigParse(msg),
            ConfigError::Serialize(msg) => TradingError::Serialization(msg),
            ConfigError::Validation(msg) => TradingError::ConfigValidation(msg),
        }
    }
}

impl From<BacktestError> for TradingError {
    fn from(err: BacktestError) -> Self {
        match err {
            BacktestError::InsufficientData(msg) => TradingError::InsufficientData(msg),
            BacktestError::InvalidPriceHistory(msg) => TradingError::InvalidPriceHistory(msg),
            BacktestError::ConfigurationError(msg) => TradingError::ConfigValidation(msg),
        }
    }
}

/// Result type alias using TradingError
pub type TradingResult<T> = Result<T, TradingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TradingError::ConfigNotFound("config.toml".to_string());
        assert!(err.to_string().contains("config.toml"));

        let err = TradingError::DataParse { row: 7, reason: "bad close".to_string() };
        assert_eq!(err.to_string(), "Price data parse error at row 7: bad close");
    }

    #[test]
    fn test_error_category() {
        assert_eq!(TradingError::ConfigValidation("x".into()).category(), "config");
        assert_eq!(TradingError::InsufficientData("x".into()).category(), "data");
        assert_eq!(TradingError::FileWrite("x".into()).category(), "io");
        assert_eq!(
            TradingError::InvalidParameter("capital".into(), "negative".into()).category(),
            "validation"
        );
    }

    #[test]
    fn test_user_message() {
        let err = TradingError::InvalidStrategy("martingale".to_string());
        let msg = err.user_message();
        assert!(msg.contains("martingale"));
        assert!(msg.contains("💡"));
    }

    #[test]
    fn test_io_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "test");
        let trading_err: TradingError = io_err.into();
        assert!(matches!(trading_err, TradingError::FileNotFound(_)));
    }

    #[test]
    fn test_missing_config_points_at_init() {
        let err: TradingError = ConfigError::NotFound("custom.toml".to_string()).into();
        assert!(matches!(err, TradingError::ConfigNotFound(_)));
        assert_eq!(err.category(), "config");
        assert!(err.user_message().contains("grid-backtest init"));
    }

    #[test]
    fn test_backtest_error_conversion() {
        let err: TradingError = BacktestError::ConfigurationError("grid_num".into()).into();
        assert!(matches!(err, TradingError::ConfigValidation(_)));
    }
}
