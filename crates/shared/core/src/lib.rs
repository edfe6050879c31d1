//! fxpilot Core Domain
//!
//! Pure domain types for the fxpilot decision pipeline: bars, feature
//! vectors, signals, regime state, orders and positions.
//! This crate contains no async, no I/O, and is 100% unit testable.

pub mod entities;
pub mod values;

// Re-export commonly used types at crate root
pub use entities::{
    CloseReason,
    Direction,
    FeatureVector,
    InvalidTransition,
    // Market data
    MarketBar,
    MarketEvent,
    // Order lifecycle
    Order,
    OrderState,
    OrderTransition,
    // Positions
    Position,
    PositionStatus,
    // Regime advisory
    RegimeLabel,
    RegimeState,
    Side,
    // Decision trail
    Signal,
};
pub use values::{IdempotencyKey, InstrumentId, Price, Quantity, Timestamp};
