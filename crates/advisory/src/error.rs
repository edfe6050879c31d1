use std::time::Duration;

use fxpilot_ports::AdvisoryError;
use thiserror::Error;

/// Advisory refresh failures. None of these reach the signal path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Advisory budget exhausted ({calls}/{cap} calls today)")]
    BudgetExhausted { calls: u32, cap: u32 },

    #[error("Advisory call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Advisory source failed: {0}")]
    Source(#[from] AdvisoryError),
}

pub type Result<T> = std::result::Result<T, Error>;
