use dashmap::DashMap;
use fxpilot_core::{InstrumentId, RegimeState, Timestamp};
use fxpilot_ports::{AdvisoryRequest, AdvisoryResponse};
use log::{debug, warn};

use crate::config::RegimeThresholds;

/// Result of a cache read
#[derive(Debug, Clone, PartialEq)]
pub enum RegimeLookup {
    Fresh(RegimeState),
    /// Past `valid_until`; callers treat it as UNKNOWN
    Expired(RegimeState),
    Absent,
}

/// Latest regime per instrument.
///
/// Written only through [`AdvisoryCache::apply`], which enforces the
/// refresh write contract: only instruments the request covered are
/// touched, and no entry outlives the configured TTL.
pub struct AdvisoryCache {
    entries: DashMap<InstrumentId, RegimeState>,
    thresholds: RegimeThresholds,
    ttl: chrono::Duration,
}

impl AdvisoryCache {
    pub fn new(thresholds: RegimeThresholds, ttl: chrono::Duration) -> Self {
        Self {
            entries: DashMap::new(),
            thresholds,
            ttl,
        }
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    pub fn lookup(&self, instrument: &InstrumentId, now: Timestamp) -> RegimeLookup {
        match self.entries.get(instrument) {
            None => RegimeLookup::Absent,
            Some(entry) if entry.is_valid_at(now) => RegimeLookup::Fresh(entry.clone()),
            Some(entry) => RegimeLookup::Expired(entry.clone()),
        }
    }

    /// Writes the regimes from `response`, returning how many were stored.
    pub fn apply(
        &self,
        request: &AdvisoryRequest,
        response: &AdvisoryResponse,
        now: Timestamp,
    ) -> usize {
        let ceiling = now + self.ttl;
        let valid_until = response
            .valid_until
            .map(|v| v.min(ceiling))
            .unwrap_or(ceiling);

        let mut written = 0;
        for advice in &response.regimes {
            if !request.covers(&advice.instrument) {
                warn!(
                    "[ADVISORY] ignoring regime for {} (not in request)",
                    advice.instrument
                );
                continue;
            }
            let threshold = self
                .thresholds
                .clamp_override(advice.label, advice.threshold_override);
            let state = RegimeState {
                instrument: advice.instrument.clone(),
                label: advice.label,
                threshold,
                issued_at: now,
                valid_until,
            };
            debug!(
                "[ADVISORY] {} -> {} threshold={:.2} valid_until={}",
                state.instrument, state.label, state.threshold, state.valid_until
            );
            self.entries.insert(state.instrument.clone(), state);
            written += 1;
        }
        written
    }

    pub fn snapshot(&self) -> Vec<RegimeState> {
        let mut states: Vec<RegimeState> = self.entries.iter().map(|e| e.value().clone()).collect();
        states.sort_by(|a, b| a.instrument.cmp(&b.instrument));
        states
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
