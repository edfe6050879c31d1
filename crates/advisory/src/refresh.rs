use std::sync::Arc;
use std::time::Duration;

use fxpilot_core::InstrumentId;
use fxpilot_ports::{
    AdvisoryRequest, AdvisorySource, Clock, InstrumentSummary, NotificationEvent, NotificationSink,
};
use log::{error, info, warn};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::budget::AdvisoryBudget;
use crate::cache::AdvisoryCache;
use crate::config::AdvisoryConfig;
use crate::error::{Error, Result};

/// Why a refresh was requested
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshTrigger {
    /// Periodic refresh of every tracked instrument
    Scheduled,
    /// Market-moving news for specific instruments
    News { instruments: Vec<InstrumentId> },
    /// Operator request
    Manual { instruments: Vec<InstrumentId> },
}

/// Source of the aggregated statistics sent to the advisory collaborator
pub trait MarketSummaryProvider: Send + Sync {
    /// Instruments a scheduled refresh covers
    fn instruments(&self) -> Vec<InstrumentId>;

    /// Summaries for the instruments that have enough data; others are skipped
    fn summarize(&self, instruments: &[InstrumentId], lookback_bars: usize) -> Vec<InstrumentSummary>;
}

/// Drives advisory refreshes from trigger messages.
///
/// Never touches per-instrument trading state; its only write is to the
/// cache, and every failure leaves the cache as it was.
pub struct AdvisoryRefresher {
    source: Arc<dyn AdvisorySource>,
    summaries: Arc<dyn MarketSummaryProvider>,
    cache: Arc<AdvisoryCache>,
    budget: Arc<AdvisoryBudget>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn NotificationSink>,
    config: AdvisoryConfig,
}

impl AdvisoryRefresher {
    pub fn new(
        source: Arc<dyn AdvisorySource>,
        summaries: Arc<dyn MarketSummaryProvider>,
        cache: Arc<AdvisoryCache>,
        budget: Arc<AdvisoryBudget>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn NotificationSink>,
        config: AdvisoryConfig,
    ) -> Self {
        Self {
            source,
            summaries,
            cache,
            budget,
            clock,
            notifier,
            config,
        }
    }

    /// Runs one refresh. Returns the number of cache entries written.
    pub async fn refresh(&self, trigger: &RefreshTrigger) -> Result<usize> {
        let instruments = match trigger {
            RefreshTrigger::Scheduled => self.summaries.instruments(),
            RefreshTrigger::News { instruments } | RefreshTrigger::Manual { instruments } => {
                instruments.clone()
            }
        };
        let summaries = self.summaries.summarize(&instruments, self.config.lookback_bars);
        if summaries.is_empty() {
            info!("[ADVISORY] {trigger:?}: nothing to summarise, skipping call");
            return Ok(0);
        }

        let now = self.clock.now();
        if !self.budget.try_consume(now) {
            let calls = self.budget.calls_today(now);
            if self.budget.claim_exhaustion_alert(now) {
                error!(
                    "[ADVISORY] ALERT budget exhausted ({calls}/{}); regimes will go stale",
                    self.budget.cap()
                );
                self.notifier.notify(NotificationEvent::AdvisoryBudgetExhausted {
                    calls_today: calls,
                    cap: self.budget.cap(),
                });
            }
            return Err(Error::BudgetExhausted {
                calls,
                cap: self.budget.cap(),
            });
        }

        let request = AdvisoryRequest {
            generated_at: now,
            lookback_bars: self.config.lookback_bars,
            instruments: summaries,
        };
        let timeout = self.config.request_timeout();
        let response = match tokio::time::timeout(timeout, self.source.classify(&request)).await {
            Err(_) => return Err(Error::Timeout(timeout)),
            Ok(result) => result?,
        };

        let written = self.cache.apply(&request, &response, self.clock.now());
        info!(
            "[ADVISORY] {trigger:?}: {written}/{} regimes updated via {}",
            request.instruments.len(),
            self.source.name()
        );
        Ok(written)
    }

    /// Consumes triggers until the channel closes or shutdown is signalled.
    pub async fn run(
        self: Arc<Self>,
        mut triggers: mpsc::Receiver<RefreshTrigger>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("[ADVISORY] refresher started");
        loop {
            tokio::select! {
                trigger = triggers.recv() => {
                    let Some(trigger) = trigger else {
                        info!("[ADVISORY] trigger channel closed");
                        break;
                    };
                    match self.refresh(&trigger).await {
                        Ok(_) => {}
                        Err(Error::BudgetExhausted { .. }) => {
                            warn!("[ADVISORY] {trigger:?} skipped: budget exhausted");
                        }
                        Err(e) => {
                            warn!("[ADVISORY] {trigger:?} failed, cache left stale: {e}");
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("[ADVISORY] refresher stopped");
    }
}

/// Produces a `Scheduled` trigger every `period`, the first one immediately.
pub fn spawn_refresh_timer(
    triggers: mpsc::Sender<RefreshTrigger>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if triggers.send(RefreshTrigger::Scheduled).await.is_err() {
                        break;
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    })
}
