use async_trait::async_trait;
use fxpilot_core::{InstrumentId, RegimeLabel, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::AdvisoryError;

/// Aggregated statistics for one instrument over the lookback window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSummary {
    pub instrument: InstrumentId,
    pub pct_change: f64,
    /// Named indicator snapshot (latest values)
    pub indicators: Vec<(String, f64)>,
}

/// Request sent to the advisory collaborator. Never carries raw ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryRequest {
    pub generated_at: Timestamp,
    pub lookback_bars: usize,
    pub instruments: Vec<InstrumentSummary>,
}

impl AdvisoryRequest {
    pub fn covers(&self, instrument: &InstrumentId) -> bool {
        self.instruments.iter().any(|s| &s.instrument == instrument)
    }
}

/// Regime call for one instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeAdvice {
    pub instrument: InstrumentId,
    pub label: RegimeLabel,
    /// Replaces the label's default confidence threshold when present
    #[serde(default)]
    pub threshold_override: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryResponse {
    pub regimes: Vec<RegimeAdvice>,
    /// Suggested expiry; capped by the cache TTL
    #[serde(default)]
    pub valid_until: Option<Timestamp>,
}

/// Port to the slow external regime classifier
#[async_trait]
pub trait AdvisorySource: Send + Sync {
    async fn classify(&self, request: &AdvisoryRequest) -> Result<AdvisoryResponse, AdvisoryError>;

    fn name(&self) -> &str {
        "Advisory"
    }
}
