use std::sync::Arc;

use chrono::Duration;
use fxpilot_core::Timestamp;
use fxpilot_ports::Clock;
use parking_lot::RwLock;

/// Clock that only moves when told to.
///
/// Shared through `Arc`; every component holding it observes the same time.
pub struct ManualClock {
    current: RwLock<Timestamp>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Arc<Self> {
        Arc::new(Self {
            current: RwLock::new(start),
        })
    }

    /// Move time forward
    pub fn advance(&self, by: Duration) {
        *self.current.write() += by;
    }

    /// Jump to an explicit time (may move backwards)
    pub fn set(&self, time: Timestamp) {
        *self.current.write() = time;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.current.read()
    }

    fn name(&self) -> &str {
        "ManualClock"
    }
}
