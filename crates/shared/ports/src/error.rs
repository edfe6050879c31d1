use fxpilot_core::IdempotencyKey;
use thiserror::Error;

/// Failures at the broker boundary.
///
/// A broker *rejection* is not an error here; it is a `SubmitAck::Rejected`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    #[error("Broker unavailable: {0}")]
    Unavailable(String),

    #[error("Unknown order key {0}")]
    UnknownOrder(IdempotencyKey),

    #[error("Broker transport error: {0}")]
    Transport(String),
}

pub type BrokerResult<T> = std::result::Result<T, BrokerError>;

/// Failures of the external regime-advisory collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdvisoryError {
    #[error("Advisory source unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed advisory response: {0}")]
    Malformed(String),
}
