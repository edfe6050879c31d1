//! fxpilot Advisory
//!
//! The slow path of the pipeline. An external classifier labels each
//! instrument's regime; the fast signal path only ever reads the cached
//! result.
//!
//! ```text
//!  timer ──┐  Scheduled
//!  news  ──┼──────────────► mpsc ──► AdvisoryRefresher ──► AdvisoryBudget (daily cap)
//!  manual ─┘                               │                     │ granted
//!                                          │                     ▼
//!                                          │              AdvisorySource (timeout)
//!                                          ▼                     │
//!                                    AdvisoryCache ◄─────────────┘ apply (covered
//!                                          │                        instruments, TTL cap)
//!                                          ▼
//!  Signal ─────────────────────────► RegimeFilter ──► approved | dropped
//! ```
//!
//! Refresh failures never reach the signal path; a stale or missing entry
//! is read as UNKNOWN with the conservative threshold.

pub mod budget;
pub mod cache;
pub mod config;
pub mod error;
pub mod filter;
pub mod refresh;

pub use budget::AdvisoryBudget;
pub use cache::{AdvisoryCache, RegimeLookup};
pub use config::{AdvisoryConfig, RegimeThresholds};
pub use error::{Error, Result};
pub use filter::{DropReason, FilterDecision, RegimeFilter};
pub use refresh::{spawn_refresh_timer, AdvisoryRefresher, MarketSummaryProvider, RefreshTrigger};
