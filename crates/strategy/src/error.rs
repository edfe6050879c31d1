use chrono::{DateTime, Utc};
use fxpilot_core::InstrumentId;
use thiserror::Error;

/// Errors from signal generation
#[derive(Error, Debug)]
pub enum Error {
    /// Window too short for the slowest configured indicator; skip the cycle
    #[error("Insufficient history for {instrument}: have {have} bars, need {need}")]
    InsufficientHistory {
        instrument: InstrumentId,
        have: usize,
        need: usize,
    },

    /// No model parameters loaded; the cycle emits HOLD
    #[error("No signal model loaded")]
    ModelUnavailable,

    #[error("Feature vector is missing model input '{0}'")]
    FeatureMismatch(String),

    #[error("Invalid model parameters: {0}")]
    InvalidModel(String),

    #[error("Out-of-order bar for {instrument}: last {last}, got {got}")]
    OutOfOrderBar {
        instrument: InstrumentId,
        last: DateTime<Utc>,
        got: DateTime<Utc>,
    },

    #[error("Bar for {got} pushed into window for {expected}")]
    InstrumentMismatch {
        expected: InstrumentId,
        got: InstrumentId,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
