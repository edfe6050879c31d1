use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{FeatureVector, Side};
use crate::values::{InstrumentId, Timestamp};

/// Direction predicted by the local model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
    Hold,
}

impl Direction {
    /// Order side for an actionable direction; `None` for Hold
    pub fn side(&self) -> Option<Side> {
        match self {
            Direction::Buy => Some(Side::Buy),
            Direction::Sell => Some(Side::Sell),
            Direction::Hold => None,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Buy => write!(f, "BUY"),
            Direction::Sell => write!(f, "SELL"),
            Direction::Hold => write!(f, "HOLD"),
        }
    }
}

/// A directional prediction with the features it came from.
///
/// Immutable after creation; confidence is clamped into [0, 1] and a
/// non-finite confidence becomes 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    instrument: InstrumentId,
    timestamp: Timestamp,
    direction: Direction,
    confidence: f64,
    features: Arc<FeatureVector>,
}

impl Signal {
    pub fn new(direction: Direction, confidence: f64, features: Arc<FeatureVector>) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            instrument: features.instrument().clone(),
            timestamp: features.timestamp(),
            direction,
            confidence,
            features,
        }
    }

    /// Zero-confidence HOLD, emitted when no prediction can be made
    pub fn hold(features: Arc<FeatureVector>) -> Self {
        Self::new(Direction::Hold, 0.0, features)
    }

    pub fn instrument(&self) -> &InstrumentId {
        &self.instrument
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn features(&self) -> &Arc<FeatureVector> {
        &self.features
    }
}
