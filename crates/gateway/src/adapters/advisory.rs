//! Static regime advisory
//!
//! Stand-in for the external classifier in dry runs: labels every requested
//! instrument with a fixed regime, optionally per instrument.

use std::collections::HashMap;

use async_trait::async_trait;
use fxpilot_core::{InstrumentId, RegimeLabel};
use fxpilot_ports::{AdvisoryError, AdvisoryRequest, AdvisoryResponse, AdvisorySource, RegimeAdvice};
use log::debug;

#[derive(Debug, Clone)]
pub struct StaticAdvisory {
    default: RegimeLabel,
    overrides: HashMap<InstrumentId, RegimeLabel>,
}

impl StaticAdvisory {
    pub fn new(default: RegimeLabel) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
        }
    }

    pub fn with_label(mut self, instrument: impl Into<InstrumentId>, label: RegimeLabel) -> Self {
        self.overrides.insert(instrument.into(), label);
        self
    }
}

#[async_trait]
impl AdvisorySource for StaticAdvisory {
    async fn classify(&self, request: &AdvisoryRequest) -> Result<AdvisoryResponse, AdvisoryError> {
        let regimes = request
            .instruments
            .iter()
            .map(|summary| RegimeAdvice {
                instrument: summary.instrument.clone(),
                label: self
                    .overrides
                    .get(&summary.instrument)
                    .copied()
                    .unwrap_or(self.default),
                threshold_override: None,
            })
            .collect::<Vec<_>>();
        debug!("[ADVISORY] static source labelled {} instruments", regimes.len());
        Ok(AdvisoryResponse {
            regimes,
            valid_until: None,
        })
    }

    fn name(&self) -> &str {
        "StaticAdvisory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fxpilot_ports::InstrumentSummary;

    fn summary(instrument: &str) -> InstrumentSummary {
        InstrumentSummary {
            instrument: instrument.into(),
            pct_change: 0.1,
            indicators: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_labels_requested_instruments_only() {
        let source = StaticAdvisory::new(RegimeLabel::Ranging).with_label("EURUSD", RegimeLabel::Trending);
        let request = AdvisoryRequest {
            generated_at: Utc::now(),
            lookback_bars: 48,
            instruments: vec![summary("EURUSD"), summary("GBPUSD")],
        };
        let response = source.classify(&request).await.unwrap();
        assert_eq!(response.regimes.len(), 2);
        assert_eq!(response.regimes[0].label, RegimeLabel::Trending);
        assert_eq!(response.regimes[1].label, RegimeLabel::Ranging);
    }
}
