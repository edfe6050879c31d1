//! Order Manager errors

use fxpilot_core::{IdempotencyKey, InstrumentId, InvalidTransition};
use fxpilot_ports::BrokerError;
use fxpilot_risk_manager::RiskRejection;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Terminal; the same key is never resubmitted
    #[error("Broker rejected {instrument} order {key}: {reason}")]
    BrokerRejection {
        instrument: InstrumentId,
        key: IdempotencyKey,
        reason: String,
    },

    /// No fill after the final attempt; alertable
    #[error("Order submission failed for {instrument} after {attempts} attempts (key {key})")]
    OrderSubmissionFailed {
        instrument: InstrumentId,
        key: IdempotencyKey,
        attempts: u32,
    },

    #[error("Order {key} for {instrument} cancelled before fill")]
    Cancelled {
        instrument: InstrumentId,
        key: IdempotencyKey,
    },

    #[error("No open position for {0}")]
    NoOpenPosition(InstrumentId),

    #[error("{0} already has a non-terminal order")]
    InstrumentBusy(InstrumentId),

    #[error("Close already in progress for {0}")]
    CloseInProgress(InstrumentId),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("Risk rejection: {0}")]
    Risk(#[from] RiskRejection),

    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),
}

pub type Result<T> = std::result::Result<T, Error>;
