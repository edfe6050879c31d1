use fxpilot_core::InstrumentId;
use fxpilot_risk_manager::RiskRejection;
use thiserror::Error;

use crate::config::ConfigError;

/// Failure of one evaluation cycle. Contained to that instrument's cycle.
#[derive(Error, Debug)]
pub enum CycleError {
    #[error("Strategy: {0}")]
    Strategy(#[from] fxpilot_strategy::Error),

    #[error("Risk: {0}")]
    Risk(#[from] RiskRejection),

    #[error("Execution: {0}")]
    Execution(#[from] fxpilot_order_manager::Error),

    #[error("Instrument {0} is not configured")]
    UnknownInstrument(InstrumentId),
}

impl CycleError {
    /// Routine outcomes (skip, risk refusal, cancellation) as opposed to
    /// failures an operator should look at
    pub fn is_expected(&self) -> bool {
        use fxpilot_order_manager::Error as Exec;
        use fxpilot_strategy::Error as Strat;
        match self {
            CycleError::Strategy(Strat::InsufficientHistory { .. } | Strat::ModelUnavailable) => true,
            CycleError::Strategy(_) => false,
            CycleError::Risk(_) => true,
            CycleError::Execution(Exec::Risk(_) | Exec::Cancelled { .. } | Exec::InstrumentBusy(_)) => true,
            CycleError::Execution(_) => false,
            CycleError::UnknownInstrument(_) => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to load signal model: {0}")]
    Model(#[from] fxpilot_strategy::Error),
}
