//! fxpilot Risk Manager
//!
//! Sizes approved signals and enforces portfolio limits:
//!
//! - **Sizing**: fixed-fractional risk over an ATR-derived stop distance
//! - **Position limit**: open + pending positions never exceed the maximum
//! - **Exclusivity**: one order or position per instrument
//! - **Circuit breaker**: sticky daily halt once realized loss reaches the
//!   configured fraction of day-start equity
//!
//! ## Architecture
//!
//! ```text
//!  approved Signal ──► RiskManager::evaluate ──► OrderTicket (+ ExposureReservation)
//!                          │  (one lock: RiskState)         │
//!                          │                                ▼
//!                          │                        Order Manager
//!                          │                                │ position closed
//!                          ◄──────── settle(pnl) ◄──────────┘
//!                          │
//!                          └──► breaker tripped? ──► cancel pending, alert
//! ```
//!
//! All shared risk state lives in one [`RiskState`] behind one lock; every
//! check-and-reserve happens in a single critical section, so a breach on
//! one instrument blocks every other instrument immediately.

pub mod error;
pub mod manager;
pub mod parameters;
pub mod sizing;
pub mod state;

// Re-export main types
pub use error::RiskRejection;
pub use manager::{ExposureReservation, OrderTicket, RiskManager, SettlementOutcome};
pub use parameters::RiskConfig;
pub use sizing::{PositionSizer, SizedOrder};
pub use state::{BreakerEvent, BreakerTrip, RiskSnapshot, RiskState};
