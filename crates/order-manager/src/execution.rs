//! Order Execution State Machine
//!
//! Drives one bracket order per instrument through its lifecycle:
//!
//! ```text
//! CREATED ──► SUBMITTED ──► FILLED ──► OPEN ──► CLOSED
//!                │  ▲
//!                │  └── AWAITING_RETRY ◄── (pending / no response)
//!                ├──► REJECTED
//!                ├──► TIMED_OUT   (attempts exhausted)
//!                └──► CANCELLED   (circuit breaker)
//! ```
//!
//! Each instrument has its own slot lock. Only state transitions happen under
//! it; broker calls and backoff waits run with the lock released, so a price
//! driven close is never stuck behind a retrying submission.

use std::sync::Arc;

use dashmap::DashMap;
use fxpilot_core::{
    CloseReason, IdempotencyKey, InstrumentId, InvalidTransition, Order, OrderState, Position,
    Price, Quantity, Timestamp,
};
use fxpilot_ports::{
    BrokerGateway, Clock, Fill, NotificationEvent, NotificationSink, SubmitAck, SubmitRequest,
};
use fxpilot_risk_manager::{ExposureReservation, OrderTicket, RiskManager};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::{Error, Result};
use crate::ledger::PositionLedger;
use crate::retry::{RetryPolicy, wait_or_cancel};

/// Execution configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub retry: RetryPolicy,
    /// Positions older than this are closed with a time exit; 0 disables
    pub max_holding_secs: u64,
}

impl ExecutionConfig {
    /// Longest accepted holding time, one year
    pub const MAX_HOLDING_SECS: u64 = 365 * 24 * 60 * 60;

    /// None when time exits are disabled or the value is out of range
    pub fn max_holding(&self) -> Option<chrono::Duration> {
        if self.max_holding_secs == 0 || self.max_holding_secs > Self::MAX_HOLDING_SECS {
            return None;
        }
        i64::try_from(self.max_holding_secs)
            .ok()
            .map(chrono::Duration::seconds)
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            max_holding_secs: 24 * 60 * 60,
        }
    }
}

/// Per-instrument mutable state
struct InstrumentSlot {
    /// Current order; taken out once it reaches a terminal state
    order: Option<Order>,
    /// A broker-side close is in flight
    closing: bool,
    cancel: watch::Sender<bool>,
}

impl InstrumentSlot {
    fn new() -> Self {
        Self {
            order: None,
            closing: false,
            cancel: watch::channel(false).0,
        }
    }
}

/// Mismatches between the ledger and the broker's open trades
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub matched: usize,
    /// Open in the ledger, unknown to the broker
    pub missing_at_broker: Vec<InstrumentId>,
    /// Open at the broker, unknown to the ledger
    pub unknown_at_broker: Vec<IdempotencyKey>,
    /// (instrument, ledger size, broker size)
    pub size_mismatches: Vec<(InstrumentId, Quantity, Quantity)>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.missing_at_broker.is_empty()
            && self.unknown_at_broker.is_empty()
            && self.size_mismatches.is_empty()
    }
}

pub struct OrderExecutor {
    broker: Arc<dyn BrokerGateway>,
    risk: Arc<RiskManager>,
    ledger: Arc<PositionLedger>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn NotificationSink>,
    config: ExecutionConfig,
    slots: DashMap<InstrumentId, Arc<Mutex<InstrumentSlot>>>,
    archive: Mutex<Vec<Order>>,
}

impl OrderExecutor {
    pub fn new(
        broker: Arc<dyn BrokerGateway>,
        risk: Arc<RiskManager>,
        ledger: Arc<PositionLedger>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn NotificationSink>,
        config: ExecutionConfig,
    ) -> Self {
        info!(
            "[EXEC] Executor ready: broker={} max_attempts={} submit_timeout={:?}",
            broker.name(),
            config.retry.max_attempts,
            config.retry.submit_timeout()
        );
        Self {
            broker,
            risk,
            ledger,
            clock,
            notifier,
            config,
            slots: DashMap::new(),
            archive: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<PositionLedger> {
        &self.ledger
    }

    fn slot(&self, instrument: &InstrumentId) -> Arc<Mutex<InstrumentSlot>> {
        Arc::clone(
            self.slots
                .entry(instrument.clone())
                .or_insert_with(|| Arc::new(Mutex::new(InstrumentSlot::new())))
                .value(),
        )
    }

    fn existing_slot(&self, instrument: &InstrumentId) -> Option<Arc<Mutex<InstrumentSlot>>> {
        self.slots.get(instrument).map(|s| Arc::clone(s.value()))
    }

    /// Moves a finished order from its slot into the archive
    fn retire(&self, slot: &mut InstrumentSlot) -> Option<Order> {
        let order = slot.order.take()?;
        self.archive.lock().push(order.clone());
        Some(order)
    }

    // ========================================================================
    // Submission
    // ========================================================================

    /// Submits the ticket's order and follows it until it opens a position
    /// or reaches a terminal state.
    ///
    /// Every attempt reuses the same idempotency key. The reservation is
    /// committed on fill and released on any other outcome.
    pub async fn execute(&self, ticket: OrderTicket) -> Result<Order> {
        let OrderTicket {
            instrument,
            sized,
            reservation,
        } = ticket;
        let slot = self.slot(&instrument);
        let policy = self.config.retry.clone();

        let (request, mut cancel_rx) = {
            let mut guard = slot.lock();
            if guard.order.as_ref().is_some_and(|o| !o.is_terminal()) {
                return Err(Error::InstrumentBusy(instrument));
            }
            // The breaker may have tripped since the ticket was approved
            if let Err(rejection) = self.risk.ensure_trading() {
                info!("[EXEC] {instrument} not created: {rejection}");
                return Err(rejection.into());
            }
            let order = Order::new(
                instrument.clone(),
                sized.side,
                sized.size,
                sized.stop_loss,
                sized.take_profit,
                self.clock.now(),
            );
            let (cancel_tx, cancel_rx) = watch::channel(false);
            let request = SubmitRequest {
                key: order.key,
                instrument: instrument.clone(),
                side: order.side,
                size: order.size,
                stop_loss: order.stop_loss,
                take_profit: order.take_profit,
            };
            guard.order = Some(order);
            guard.closing = false;
            guard.cancel = cancel_tx;
            (request, cancel_rx)
        };
        let key = request.key;
        info!(
            "[EXEC] created {instrument} {} size={} sl={} tp={} key={key}",
            request.side, request.size, request.stop_loss, request.take_profit
        );

        loop {
            let cancelled = *cancel_rx.borrow();
            let attempt = match self.begin_attempt(&slot, cancelled) {
                Ok(Some(attempt)) => attempt,
                Ok(None) => {
                    info!("[EXEC] {instrument} key={key} cancelled before submission");
                    return Err(Error::Cancelled { instrument, key });
                }
                Err(e @ Error::Risk(_)) => {
                    if let Err(err) = self.broker.cancel(key).await {
                        warn!("[EXEC] broker cancel for {instrument} key={key} failed: {err}");
                    }
                    return Err(e);
                }
                Err(e) => return Err(e),
            };
            debug!(
                "[EXEC] submit {instrument} key={key} attempt={attempt}/{}",
                policy.max_attempts
            );

            let response =
                tokio::time::timeout(policy.submit_timeout(), self.broker.submit(&request)).await;
            let note = match response {
                Ok(Ok(SubmitAck::Accepted(fill))) => {
                    return self.on_fill(&slot, fill, reservation);
                }
                Ok(Ok(SubmitAck::Rejected { reason })) => {
                    self.finish(&slot, OrderState::Rejected, Some(reason.clone()))?;
                    warn!("[EXEC] broker rejected {instrument} key={key}: {reason}");
                    return Err(Error::BrokerRejection {
                        instrument,
                        key,
                        reason,
                    });
                }
                Ok(Ok(SubmitAck::Pending)) => "broker pending".to_string(),
                Ok(Err(e)) => format!("broker error: {e}"),
                Err(_) => format!("no response within {:?}", policy.submit_timeout()),
            };

            if *cancel_rx.borrow() {
                self.finish(&slot, OrderState::Cancelled, Some(format!("cancelled after {note}")))?;
                if let Err(e) = self.broker.cancel(key).await {
                    warn!("[EXEC] broker cancel for {instrument} key={key} failed: {e}");
                }
                info!("[EXEC] {instrument} key={key} cancelled in flight");
                return Err(Error::Cancelled { instrument, key });
            }

            if attempt >= policy.max_attempts {
                self.finish(&slot, OrderState::TimedOut, Some(note.clone()))?;
                error!(
                    "[EXEC] ALERT submission failed for {instrument} key={key} after {attempt} attempts ({note})"
                );
                self.notifier.notify(NotificationEvent::OrderSubmissionFailed {
                    instrument: instrument.clone(),
                    key,
                    attempts: attempt,
                });
                return Err(Error::OrderSubmissionFailed {
                    instrument,
                    key,
                    attempts: attempt,
                });
            }

            let delay = policy.backoff(attempt);
            self.advance(&slot, OrderState::AwaitingRetry, Some(note.clone()))?;
            warn!(
                "[EXEC] {instrument} key={key} attempt {attempt} unfilled ({note}); retrying in {delay:?}"
            );
            // A cancel during the wait is picked up by the next begin_attempt
            wait_or_cancel(delay, &mut cancel_rx).await;
        }
    }

    /// Marks the next submission, or retires the order if it was cancelled
    /// or the breaker is set. Returns the attempt number, None when cancelled.
    fn begin_attempt(&self, slot: &Mutex<InstrumentSlot>, cancelled: bool) -> Result<Option<u32>> {
        let now = self.clock.now();
        let mut guard = slot.lock();
        let state = &mut *guard;
        let Some(order) = state.order.as_mut() else {
            return Ok(None);
        };
        if cancelled && order.state.is_pending() {
            order.transition(OrderState::Cancelled, now, Some("cancelled".into()))?;
        }
        if order.state == OrderState::Cancelled {
            self.retire(state);
            return Ok(None);
        }
        if let Err(rejection) = self.risk.ensure_trading() {
            order.transition(OrderState::Cancelled, now, Some(rejection.to_string()))?;
            info!("[EXEC] {} key={} cancelled: {rejection}", order.instrument, order.key);
            self.retire(state);
            return Err(rejection.into());
        }
        order.transition(OrderState::Submitted, now, None)?;
        Ok(Some(order.attempts))
    }

    fn advance(&self, slot: &Mutex<InstrumentSlot>, next: OrderState, note: Option<String>) -> Result<()> {
        let now = self.clock.now();
        let mut guard = slot.lock();
        match guard.order.as_mut() {
            Some(order) => Ok(order.transition(next, now, note)?),
            None => Err(Error::InvalidTransition(InvalidTransition {
                from: OrderState::Cancelled,
                to: next,
            })),
        }
    }

    /// Moves to a terminal state and archives the order
    fn finish(&self, slot: &Mutex<InstrumentSlot>, terminal: OrderState, note: Option<String>) -> Result<Order> {
        let now = self.clock.now();
        let mut guard = slot.lock();
        let state = &mut *guard;
        if let Some(order) = state.order.as_mut() {
            order.transition(terminal, now, note)?;
        }
        self.retire(state).ok_or(Error::InvalidTransition(InvalidTransition {
            from: OrderState::Cancelled,
            to: terminal,
        }))
    }

    fn on_fill(&self, slot: &Mutex<InstrumentSlot>, fill: Fill, reservation: ExposureReservation) -> Result<Order> {
        let (order, position) = {
            let mut guard = slot.lock();
            let Some(order) = guard.order.as_mut() else {
                return Err(Error::NoOpenPosition(reservation.instrument().clone()));
            };
            order.record_fill(fill.price, fill.at)?;
            let position = self.ledger.open_position(order, fill.price, fill.at)?;
            order.transition(OrderState::Open, fill.at, None)?;
            (order.clone(), position)
        };
        reservation.commit();

        info!(
            "[EXEC] filled {} {} size={} @ {} key={} attempts={}",
            order.instrument, order.side, order.size, fill.price, order.key, order.attempts
        );
        self.notifier.notify(NotificationEvent::OrderFilled {
            instrument: order.instrument.clone(),
            key: order.key,
            side: order.side,
            size: position.size,
            price: position.entry_price,
        });
        Ok(order)
    }

    // ========================================================================
    // Cancellation
    // ========================================================================

    /// Cancels every order that has not filled yet. Open positions are left
    /// alone. Orders whose submission is in flight are signalled and cancel
    /// themselves unless that submission fills.
    ///
    /// Returns the number of pending orders signalled.
    pub async fn cancel_pending(&self, reason: &str) -> usize {
        let now = self.clock.now();
        let slots: Vec<_> = self
            .slots
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();

        let mut signalled = 0;
        let mut broker_keys = Vec::new();
        for (instrument, slot) in slots {
            let mut guard = slot.lock();
            let state = &mut *guard;
            let Some(order) = state.order.as_mut() else {
                continue;
            };
            if !order.state.is_pending() {
                continue;
            }
            state.cancel.send_replace(true);
            signalled += 1;

            let previous = order.state;
            if previous == OrderState::Submitted {
                debug!("[EXEC] {instrument} key={} in flight, cancel signalled", order.key);
                continue;
            }
            match order.transition(OrderState::Cancelled, now, Some(reason.to_string())) {
                Ok(()) => {
                    info!("[EXEC] cancelled {instrument} key={} ({reason})", order.key);
                    if previous == OrderState::AwaitingRetry {
                        broker_keys.push(order.key);
                    }
                }
                Err(e) => warn!("[EXEC] could not cancel {instrument}: {e}"),
            }
        }

        for key in broker_keys {
            if let Err(e) = self.broker.cancel(key).await {
                warn!("[EXEC] broker cancel for key={key} failed: {e}");
            }
        }
        if signalled > 0 {
            warn!("[EXEC] {signalled} pending orders cancelled: {reason}");
        }
        signalled
    }

    /// Trips the circuit breaker by hand, alerts, and cancels every pending
    /// order. Returns false if the breaker was already set.
    pub async fn halt(&self, reason: &str) -> bool {
        let Some(trip) = self.risk.halt(reason, self.clock.now()) else {
            return false;
        };
        self.notifier.notify(NotificationEvent::CircuitBreakerTripped {
            daily_loss: trip.daily_loss,
            limit: trip.limit,
        });
        self.cancel_pending(reason).await;
        true
    }

    // ========================================================================
    // Closing
    // ========================================================================

    /// Closes an open position at market through the broker
    pub async fn close_position(&self, instrument: &InstrumentId, reason: CloseReason) -> Result<Position> {
        let slot = self
            .existing_slot(instrument)
            .ok_or_else(|| Error::NoOpenPosition(instrument.clone()))?;
        let key = {
            let mut guard = slot.lock();
            let state = &mut *guard;
            let key = match state.order.as_ref() {
                Some(order) if order.state == OrderState::Open => order.key,
                _ => return Err(Error::NoOpenPosition(instrument.clone())),
            };
            if state.closing {
                return Err(Error::CloseInProgress(instrument.clone()));
            }
            state.closing = true;
            key
        };

        info!("[EXEC] closing {instrument} key={key} reason={reason}");
        let fill = match self.broker.close_trade(key).await {
            Ok(fill) => fill,
            Err(e) => {
                slot.lock().closing = false;
                warn!("[EXEC] close of {instrument} failed: {e}");
                return Err(e.into());
            }
        };
        self.finalize_close(instrument, fill.price, fill.at, reason, true).await
    }

    /// Books a close: ledger, order lifecycle, then risk settlement.
    ///
    /// A trip of the circuit breaker cancels all pending orders.
    async fn finalize_close(
        &self,
        instrument: &InstrumentId,
        price: Price,
        at: Timestamp,
        reason: CloseReason,
        via_broker: bool,
    ) -> Result<Position> {
        let slot = self
            .existing_slot(instrument)
            .ok_or_else(|| Error::NoOpenPosition(instrument.clone()))?;
        let position = {
            let mut guard = slot.lock();
            let state = &mut *guard;
            let Some(order) = state.order.as_mut().filter(|o| o.state == OrderState::Open) else {
                return Err(Error::NoOpenPosition(instrument.clone()));
            };
            if state.closing && !via_broker {
                return Err(Error::CloseInProgress(instrument.clone()));
            }
            let position = self.ledger.close(instrument, price, at, reason)?;
            order.transition(OrderState::Closed, at, Some(reason.to_string()))?;
            state.closing = false;
            self.retire(state);
            position
        };

        let outcome = self.risk.settle(instrument, position.realized_pnl, at);
        self.notifier.notify(NotificationEvent::PositionClosed {
            instrument: instrument.clone(),
            reason,
            realized_pnl: position.realized_pnl,
        });
        if outcome.tripped {
            self.notifier.notify(NotificationEvent::CircuitBreakerTripped {
                daily_loss: outcome.daily_loss,
                limit: outcome.limit,
            });
            self.cancel_pending("circuit breaker").await;
        }
        Ok(position)
    }

    /// Marks the instrument's position and closes it on a bracket hit or
    /// when it has been held too long.
    ///
    /// Bracket exits are booked at the observed price.
    pub async fn on_price(
        &self,
        instrument: &InstrumentId,
        price: Price,
        at: Timestamp,
    ) -> Result<Option<Position>> {
        let Some(mark) = self.ledger.mark(instrument, price) else {
            return Ok(None);
        };

        let closed = if let Some(reason) = mark.trigger {
            self.finalize_close(instrument, price, at, reason, false).await
        } else if self
            .config
            .max_holding()
            .is_some_and(|max| at - mark.opened_at >= max)
        {
            self.close_position(instrument, CloseReason::TimeExit).await
        } else {
            return Ok(None);
        };

        match closed {
            Ok(position) => Ok(Some(position)),
            // Another close got there first
            Err(Error::CloseInProgress(_)) | Err(Error::NoOpenPosition(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Current order for the instrument (pending or open)
    pub fn active_order(&self, instrument: &InstrumentId) -> Option<Order> {
        let slot = self.existing_slot(instrument)?;
        let order = slot.lock().order.clone();
        order
    }

    /// All orders still held by an instrument slot
    pub fn orders(&self) -> Vec<Order> {
        let slots: Vec<_> = self.slots.iter().map(|e| Arc::clone(e.value())).collect();
        let mut orders: Vec<_> = slots.iter().filter_map(|s| s.lock().order.clone()).collect();
        orders.sort_by(|a, b| a.instrument.cmp(&b.instrument));
        orders
    }

    /// Orders that reached a terminal state, in completion order
    pub fn archived_orders(&self) -> Vec<Order> {
        self.archive.lock().clone()
    }

    /// Compares the broker's open trades against the ledger
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let trades = self.broker.open_trades().await?;
        let positions = self.ledger.open_positions();
        let mut report = ReconcileReport::default();

        for position in &positions {
            match trades.iter().find(|t| t.key == position.order_key) {
                Some(trade) if trade.size == position.size => report.matched += 1,
                Some(trade) => report.size_mismatches.push((
                    position.instrument.clone(),
                    position.size,
                    trade.size,
                )),
                None => report.missing_at_broker.push(position.instrument.clone()),
            }
        }
        report.unknown_at_broker = trades
            .iter()
            .filter(|t| !positions.iter().any(|p| p.order_key == t.key))
            .map(|t| t.key)
            .collect();

        if report.is_clean() {
            debug!("[EXEC] reconcile clean: {} positions", report.matched);
        } else {
            warn!(
                "[EXEC] reconcile mismatch: missing_at_broker={:?} unknown_at_broker={:?} size={:?}",
                report.missing_at_broker, report.unknown_at_broker, report.size_mismatches
            );
        }
        Ok(report)
    }
}
