//! fxpilot Runner
//!
//! Wires the pipeline stages together and drives them:
//! - **Config**: one JSON document, defaults for everything
//! - **MarketStore**: per-instrument bar windows, advisory summaries
//! - **Pipeline**: one evaluation cycle, recorded in the `DecisionLog`
//! - **Scheduler**: non-overlapping cycles per instrument, daily risk reset
//!
//! ## Architecture
//!
//! ```text
//!  NDJSON feed ──► MarketEvent ──► Pipeline::ingest ──► MarketStore (windows)
//!                                        │
//!                                        └──► OrderExecutor::on_price (SL/TP/time exits)
//!
//!  Scheduler ──tick──► Pipeline::run_cycle
//!                        FeatureEngine → LocalSignalModel → RegimeFilter → RiskManager → OrderExecutor
//!                                                              ▲
//!  AdvisoryRefresher ──(budgeted, timed out)──► AdvisoryCache ─┘
//!        ▲
//!  refresh timer / news triggers
//! ```

pub mod audit;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod market;
pub mod pipeline;
pub mod scheduler;

pub use audit::{DecisionLog, DecisionRecord, Disposition};
pub use bootstrap::{Collaborators, Runtime, build};
pub use config::{ConfigError, PipelineConfig, load_config, load_config_from_str, load_default_config};
pub use error::{BootstrapError, CycleError};
pub use market::MarketStore;
pub use pipeline::{CycleOutcome, Pipeline};
pub use scheduler::{Scheduler, SchedulerStats};
