use fxpilot_core::{InstrumentId, Timestamp};
use thiserror::Error;

/// Reasons the risk manager refuses to create an order.
/// Logged, never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RiskRejection {
    #[error("Circuit breaker tripped at {since}; no new orders until daily reset")]
    CircuitBreakerTripped { since: Timestamp },

    #[error("Position limit exceeded: {open} open/pending, max {max}")]
    PositionLimitExceeded { open: usize, max: usize },

    #[error("Duplicate exposure: {0} already has an order or position")]
    DuplicateExposure(InstrumentId),

    #[error("Cannot size order: {0}")]
    InvalidSizing(String),
}
