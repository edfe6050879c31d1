//! fxpilot Clock Infrastructure
//!
//! Time sources and the trading-day calendar:
//!
//! ```text
//! Clock (port)
//!   ├── SystemClock   wall time, production
//!   └── ManualClock   frozen until set/advanced, tests
//!
//! TradingCalendar     maps a timestamp to its trading day
//!                     (daily risk reset, advisory budget window)
//! ```

mod calendar;
mod manual;
mod system;

pub use calendar::TradingCalendar;
pub use manual::ManualClock;
pub use system::SystemClock;

// Re-export the Clock trait for convenience
pub use fxpilot_ports::Clock;
