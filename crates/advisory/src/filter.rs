use std::sync::Arc;

use fxpilot_core::{Direction, InstrumentId, RegimeLabel, Signal, Timestamp};
use fxpilot_ports::Clock;
use log::info;

use crate::cache::{AdvisoryCache, RegimeLookup};
use crate::config::RegimeThresholds;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The model had no directional view
    Hold,
    BelowThreshold,
}

/// Outcome of filtering one signal. A drop is a normal result, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterDecision {
    Approved {
        signal: Signal,
        regime: RegimeLabel,
        threshold: f64,
    },
    Dropped {
        signal: Signal,
        reason: DropReason,
        regime: RegimeLabel,
        threshold: f64,
    },
}

impl FilterDecision {
    pub fn is_approved(&self) -> bool {
        matches!(self, FilterDecision::Approved { .. })
    }

    pub fn threshold(&self) -> f64 {
        match self {
            FilterDecision::Approved { threshold, .. } | FilterDecision::Dropped { threshold, .. } => {
                *threshold
            }
        }
    }

    pub fn regime(&self) -> RegimeLabel {
        match self {
            FilterDecision::Approved { regime, .. } | FilterDecision::Dropped { regime, .. } => *regime,
        }
    }
}

/// Gates signals on the cached regime for their instrument
pub struct RegimeFilter {
    cache: Arc<AdvisoryCache>,
    thresholds: RegimeThresholds,
    clock: Arc<dyn Clock>,
}

impl RegimeFilter {
    pub fn new(cache: Arc<AdvisoryCache>, thresholds: RegimeThresholds, clock: Arc<dyn Clock>) -> Self {
        Self {
            cache,
            thresholds,
            clock,
        }
    }

    /// Regime and threshold in force for `instrument` at `now`.
    /// Absent and expired entries degrade to UNKNOWN.
    pub fn effective(&self, instrument: &InstrumentId, now: Timestamp) -> (RegimeLabel, f64) {
        match self.cache.lookup(instrument, now) {
            RegimeLookup::Fresh(state) => (state.label, state.threshold),
            RegimeLookup::Expired(_) | RegimeLookup::Absent => {
                (RegimeLabel::Unknown, self.thresholds.unknown)
            }
        }
    }

    pub fn evaluate(&self, signal: Signal) -> FilterDecision {
        self.evaluate_at(signal, self.clock.now())
    }

    pub fn evaluate_at(&self, signal: Signal, now: Timestamp) -> FilterDecision {
        let (regime, threshold) = self.effective(signal.instrument(), now);

        let reason = if signal.direction() == Direction::Hold {
            Some(DropReason::Hold)
        } else if signal.confidence() < threshold {
            Some(DropReason::BelowThreshold)
        } else {
            None
        };

        match reason {
            None => {
                info!(
                    "[REGIME] approved {} {} confidence={:.3} regime={} threshold={:.2}",
                    signal.instrument(),
                    signal.direction(),
                    signal.confidence(),
                    regime,
                    threshold
                );
                FilterDecision::Approved {
                    signal,
                    regime,
                    threshold,
                }
            }
            Some(reason) => {
                info!(
                    "[REGIME] dropped {} {} confidence={:.3} regime={} threshold={:.2} reason={:?}",
                    signal.instrument(),
                    signal.direction(),
                    signal.confidence(),
                    regime,
                    threshold,
                    reason
                );
                FilterDecision::Dropped {
                    signal,
                    reason,
                    regime,
                    threshold,
                }
            }
        }
    }
}
