use fxpilot_core::Timestamp;

/// Port for time abstraction
///
/// Production uses the system clock; tests use a manual clock so day
/// boundaries, advisory expiry and holding periods are deterministic.
pub trait Clock: Send + Sync {
    /// Get the current time according to this clock
    fn now(&self) -> Timestamp;

    /// Get the clock's name/identifier for debugging
    fn name(&self) -> &str {
        "Clock"
    }
}
