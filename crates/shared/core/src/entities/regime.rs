use serde::{Deserialize, Serialize};

use crate::values::{InstrumentId, Timestamp};

/// Coarse market condition reported by the advisory collaborator.
///
/// `Unknown` is a defined degraded mode (also used for absent or expired
/// advisories), not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RegimeLabel {
    Trending,
    Ranging,
    Unknown,
}

impl std::fmt::Display for RegimeLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegimeLabel::Trending => write!(f, "TRENDING"),
            RegimeLabel::Ranging => write!(f, "RANGING"),
            RegimeLabel::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Latest regime classification for one instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeState {
    pub instrument: InstrumentId,
    pub label: RegimeLabel,
    /// Effective confidence threshold for signals on this instrument
    pub threshold: f64,
    pub issued_at: Timestamp,
    pub valid_until: Timestamp,
}

impl RegimeState {
    /// True while `now` is before `valid_until`
    pub fn is_valid_at(&self, now: Timestamp) -> bool {
        now < self.valid_until
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn test_validity_window_is_exclusive_at_end() {
        let now = Utc::now();
        let state = RegimeState {
            instrument: "EURUSD".into(),
            label: RegimeLabel::Trending,
            threshold: 0.65,
            issued_at: now,
            valid_until: now + Duration::hours(1),
        };
        assert!(state.is_valid_at(now));
        assert!(!state.is_valid_at(now + Duration::hours(1)));
    }
}
