//! Evaluation pipeline
//!
//! One cycle for one instrument:
//!
//! ```text
//! MarketStore ─► FeatureEngine ─► LocalSignalModel ─► RegimeFilter ─► RiskManager ─► OrderExecutor
//!   snapshot        compute           predict          approve/drop     ticket          execute
//! ```
//!
//! Every cycle writes one `DecisionRecord`. Market events go through
//! `ingest`, which keeps the windows current and marks open positions.

use std::sync::Arc;

use fxpilot_advisory::{DropReason, FilterDecision, RegimeFilter};
use fxpilot_core::{Direction, InstrumentId, MarketEvent, Order, Position, RegimeLabel};
use fxpilot_order_manager::OrderExecutor;
use fxpilot_ports::{Clock, NotificationEvent, NotificationSink};
use fxpilot_risk_manager::RiskManager;
use fxpilot_strategy::{FeatureEngine, LocalSignalModel};
use log::{debug, info, warn};

use crate::audit::{DecisionLog, DecisionRecord, Disposition};
use crate::error::CycleError;
use crate::market::MarketStore;

/// Successful end of a cycle
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// Signal filtered out by the regime gate
    Dropped {
        instrument: InstrumentId,
        direction: Direction,
        confidence: f64,
        regime: RegimeLabel,
        threshold: f64,
        reason: DropReason,
    },
    /// Order reached OPEN
    Executed(Order),
}

pub struct Pipeline {
    market: Arc<MarketStore>,
    engine: FeatureEngine,
    model: Arc<LocalSignalModel>,
    filter: Arc<RegimeFilter>,
    risk: Arc<RiskManager>,
    executor: Arc<OrderExecutor>,
    notifier: Arc<dyn NotificationSink>,
    decisions: Arc<DecisionLog>,
    clock: Arc<dyn Clock>,
}

impl Pipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        market: Arc<MarketStore>,
        engine: FeatureEngine,
        model: Arc<LocalSignalModel>,
        filter: Arc<RegimeFilter>,
        risk: Arc<RiskManager>,
        executor: Arc<OrderExecutor>,
        notifier: Arc<dyn NotificationSink>,
        decisions: Arc<DecisionLog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            market,
            engine,
            model,
            filter,
            risk,
            executor,
            notifier,
            decisions,
            clock,
        }
    }

    pub fn market(&self) -> &Arc<MarketStore> {
        &self.market
    }

    pub fn decisions(&self) -> &Arc<DecisionLog> {
        &self.decisions
    }

    pub fn executor(&self) -> &Arc<OrderExecutor> {
        &self.executor
    }

    /// Runs one evaluation cycle for `instrument`.
    ///
    /// Callers must not run two cycles for the same instrument at once; the
    /// scheduler enforces that.
    pub async fn run_cycle(&self, instrument: &InstrumentId) -> Result<CycleOutcome, CycleError> {
        if !self.market.tracks(instrument) {
            return Err(CycleError::UnknownInstrument(instrument.clone()));
        }
        let started = self.clock.now();

        let bars = self.market.snapshot(instrument);
        let signal = match self
            .engine
            .compute(&bars)
            .and_then(|features| self.model.predict(Arc::new(features)))
        {
            Ok(signal) => signal,
            Err(e) => {
                debug!("[PIPELINE] {instrument} cycle skipped: {e}");
                let mut record = DecisionRecord::skipped(started, instrument.clone(), e.to_string());
                if matches!(e, fxpilot_strategy::Error::ModelUnavailable) {
                    // No model means the cycle's signal is HOLD
                    record.direction = Some(Direction::Hold);
                }
                self.decisions.record(record);
                return Err(e.into());
            }
        };

        let (signal, regime, threshold) = match self.filter.evaluate(signal) {
            FilterDecision::Dropped {
                signal,
                reason,
                regime,
                threshold,
            } => {
                self.decisions.record(DecisionRecord {
                    at: started,
                    instrument: instrument.clone(),
                    direction: Some(signal.direction()),
                    confidence: Some(signal.confidence()),
                    regime: Some(regime),
                    threshold: Some(threshold),
                    disposition: Disposition::Dropped {
                        reason: format!("{reason:?}"),
                    },
                });
                return Ok(CycleOutcome::Dropped {
                    instrument: instrument.clone(),
                    direction: signal.direction(),
                    confidence: signal.confidence(),
                    regime,
                    threshold,
                    reason,
                });
            }
            FilterDecision::Approved {
                signal,
                regime,
                threshold,
            } => (signal, regime, threshold),
        };

        self.notifier.notify(NotificationEvent::SignalApproved {
            instrument: instrument.clone(),
            direction: signal.direction(),
            confidence: signal.confidence(),
            threshold,
        });

        let record = |disposition| DecisionRecord {
            at: started,
            instrument: instrument.clone(),
            direction: Some(signal.direction()),
            confidence: Some(signal.confidence()),
            regime: Some(regime),
            threshold: Some(threshold),
            disposition,
        };

        let ticket = match self.risk.evaluate(&signal) {
            Ok(ticket) => ticket,
            Err(rejection) => {
                info!("[PIPELINE] {instrument} risk rejected: {rejection}");
                self.decisions.record(record(Disposition::Rejected {
                    reason: rejection.to_string(),
                }));
                return Err(rejection.into());
            }
        };

        match self.executor.execute(ticket).await {
            Ok(order) => {
                self.decisions.record(record(Disposition::Executed {
                    key: order.key,
                    state: order.state,
                }));
                Ok(CycleOutcome::Executed(order))
            }
            Err(e) => {
                self.decisions.record(record(Disposition::Failed { reason: e.to_string() }));
                Err(e.into())
            }
        }
    }

    /// Applies one market event: windows first, then position marking.
    /// Returns the position a price event closed, if any.
    pub async fn ingest(&self, event: MarketEvent) -> Result<Option<Position>, CycleError> {
        match event {
            MarketEvent::Bar(bar) => {
                let (instrument, close, at) = (bar.instrument.clone(), bar.close, bar.timestamp);
                if let Err(e) = self.market.apply_bar(bar) {
                    warn!("[PIPELINE] bar refused: {e}");
                    return Err(e.into());
                }
                Ok(self.executor.on_price(&instrument, close, at).await?)
            }
            MarketEvent::Gap { instrument, from, to } => {
                debug!("[PIPELINE] gap {instrument} {from} .. {to}");
                self.market.mark_gap(&instrument);
                Ok(None)
            }
            MarketEvent::Tick { instrument, price, at } => {
                Ok(self.executor.on_price(&instrument, price, at).await?)
            }
        }
    }
}
