//! Cycle scheduler
//!
//! One interval task per instrument. Each tick spawns a cycle unless the
//! previous cycle for that instrument is still running, in which case the
//! tick is skipped and logged. A separate task watches the trading-day
//! boundary and performs the explicit daily risk reset.
//!
//! ```text
//!   interval(EURUSD) ──tick──► trigger ──► [in-flight?] ──no──► spawn run_cycle
//!   interval(GBPUSD) ──tick──► trigger ──►      │yes
//!   ...                                         └──► skip + log
//!   interval(day check) ──► RiskManager::needs_reset ──► reset_daily
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use fxpilot_core::InstrumentId;
use fxpilot_ports::Clock;
use fxpilot_risk_manager::RiskManager;
use log::{debug, error, info, warn};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::SchedulerConfig;
use crate::error::CycleError;
use crate::pipeline::{CycleOutcome, Pipeline};

#[derive(Debug, Default)]
struct Counters {
    started: AtomicU64,
    overlapped: AtomicU64,
    executed: AtomicU64,
    dropped: AtomicU64,
    refused: AtomicU64,
    failed: AtomicU64,
}

/// Cycle counters since start
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub started: u64,
    /// Ticks skipped because the previous cycle was still running
    pub overlapped: u64,
    pub executed: u64,
    pub dropped: u64,
    /// Skips and risk refusals
    pub refused: u64,
    pub failed: u64,
}

/// Clears the in-flight flag when the cycle ends, panics included
struct InFlightGuard(Arc<AtomicBool>);

impl InFlightGuard {
    fn acquire(flag: Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Scheduler {
    pipeline: Arc<Pipeline>,
    risk: Arc<RiskManager>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
    in_flight: DashMap<InstrumentId, Arc<AtomicBool>>,
    counters: Counters,
}

impl Scheduler {
    pub fn new(
        pipeline: Arc<Pipeline>,
        risk: Arc<RiskManager>,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            pipeline,
            risk,
            clock,
            config,
            in_flight: DashMap::new(),
            counters: Counters::default(),
        }
    }

    pub fn stats(&self) -> SchedulerStats {
        let c = &self.counters;
        SchedulerStats {
            started: c.started.load(Ordering::Relaxed),
            overlapped: c.overlapped.load(Ordering::Relaxed),
            executed: c.executed.load(Ordering::Relaxed),
            dropped: c.dropped.load(Ordering::Relaxed),
            refused: c.refused.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
        }
    }

    pub fn is_running(&self, instrument: &InstrumentId) -> bool {
        self.in_flight
            .get(instrument)
            .is_some_and(|flag| flag.load(Ordering::Acquire))
    }

    /// Starts a cycle for `instrument` unless one is already running.
    /// The returned handle resolves to the cycle result.
    pub fn trigger(
        self: &Arc<Self>,
        instrument: &InstrumentId,
    ) -> Option<JoinHandle<Result<CycleOutcome, CycleError>>> {
        let flag = self
            .in_flight
            .entry(instrument.clone())
            .or_insert_with(|| Arc::new(AtomicBool::new(false)))
            .clone();
        let Some(guard) = InFlightGuard::acquire(flag) else {
            self.counters.overlapped.fetch_add(1, Ordering::Relaxed);
            warn!("[SCHED] {instrument} previous cycle still running, tick skipped");
            return None;
        };

        self.counters.started.fetch_add(1, Ordering::Relaxed);
        let this = Arc::clone(self);
        let instrument = instrument.clone();
        Some(tokio::spawn(async move {
            let _guard = guard;
            let result = this.pipeline.run_cycle(&instrument).await;
            this.account(&instrument, &result);
            result
        }))
    }

    fn account(&self, instrument: &InstrumentId, result: &Result<CycleOutcome, CycleError>) {
        let c = &self.counters;
        match result {
            Ok(CycleOutcome::Executed(order)) => {
                c.executed.fetch_add(1, Ordering::Relaxed);
                info!(
                    "[SCHED] {instrument} cycle opened {} size={} key={}",
                    order.side, order.size, order.key
                );
            }
            Ok(CycleOutcome::Dropped { .. }) => {
                c.dropped.fetch_add(1, Ordering::Relaxed);
                debug!("[SCHED] {instrument} cycle: signal dropped");
            }
            Err(e) if e.is_expected() => {
                c.refused.fetch_add(1, Ordering::Relaxed);
                info!("[SCHED] {instrument} cycle ended: {e}");
            }
            Err(e) => {
                c.failed.fetch_add(1, Ordering::Relaxed);
                error!("[SCHED] {instrument} cycle failed: {e}");
            }
        }
    }

    /// Resets the risk day when the clock has crossed the boundary
    pub fn check_day_boundary(&self) -> bool {
        let now = self.clock.now();
        if !self.risk.needs_reset(now) {
            return false;
        }
        self.risk.reset_daily(now);
        info!("[SCHED] trading day rolled over at {now}, risk state reset");
        true
    }

    /// Spawns the per-instrument interval tasks and the day-boundary task.
    /// All of them stop when `shutdown` flips to true.
    pub fn spawn(
        self: &Arc<Self>,
        instruments: &[InstrumentId],
        shutdown: watch::Receiver<bool>,
    ) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(instruments.len() + 1);
        for instrument in instruments {
            let this = Arc::clone(self);
            let instrument = instrument.clone();
            let period = self.config.cycle_interval();
            let mut shutdown = shutdown.clone();
            handles.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                info!("[SCHED] {instrument} every {period:?}");
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            this.trigger(&instrument);
                        }
                        changed = shutdown.changed() => {
                            if changed.is_err() || *shutdown.borrow() {
                                break;
                            }
                        }
                    }
                }
                debug!("[SCHED] {instrument} ticker stopped");
            }));
        }

        let this = Arc::clone(self);
        let period = self.config.day_check_interval();
        let mut shutdown = shutdown;
        handles.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        this.check_day_boundary();
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
        }));
        handles
    }

    /// Waits for running cycles to finish, up to `timeout`
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let idle = async {
            while self.in_flight.iter().any(|f| f.value().load(Ordering::Acquire)) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };
        tokio::time::timeout(timeout, idle).await.is_ok()
    }
}
