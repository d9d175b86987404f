//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for rotor.
#[derive(Debug, thiserror::Error)]
pub enum RotorError {
    #[error("price data unavailable: {reason}")]
    DataUnavailable { reason: String },

    #[error("empty portfolio: at least one ticker is required")]
    EmptyPortfolio,

    #[error("unknown ticker {ticker}: not in the eligible universe for {start}..{end}")]
    UnknownTicker {
        ticker: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("insufficient history: {dates} usable dates in window, need at least {minimum}")]
    InsufficientHistory { dates: usize, minimum: usize },

    #[error("insufficient universe: requested {requested} tickers, only {eligible} eligible")]
    InsufficientUniverse { requested: usize, eligible: usize },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    TickerList(#[from] crate::domain::universe::TickerParseError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&RotorError> for std::process::ExitCode {
    fn from(err: &RotorError) -> Self {
        let code: u8 = match err {
            RotorError::Io(_) => 1,
            RotorError::ConfigParse { .. }
            | RotorError::ConfigMissing { .. }
            | RotorError::ConfigInvalid { .. } => 2,
            RotorError::DataUnavailable { .. } => 3,
            RotorError::EmptyPortfolio
            | RotorError::UnknownTicker { .. }
            | RotorError::InsufficientUniverse { .. }
            | RotorError::TickerList(_) => 4,
            RotorError::InsufficientHistory { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
