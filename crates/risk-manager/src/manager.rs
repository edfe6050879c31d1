//! Trading Risk Manager
//!
//! Owns the single [`RiskState`] and every check that reads or writes it.

use std::sync::Arc;

use fxpilot_clock::TradingCalendar;
use fxpilot_core::{InstrumentId, Price, Quantity, Side, Signal, Timestamp};
use log::{debug, error, info};
use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::error::RiskRejection;
use crate::parameters::RiskConfig;
use crate::sizing::{PositionSizer, SizedOrder};
use crate::state::{BreakerEvent, BreakerTrip, RiskSnapshot, RiskState};

/// Result of settling a closed position
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementOutcome {
    pub daily_realized_pnl: Decimal,
    pub daily_loss: Decimal,
    pub limit: Decimal,
    /// True only for the settlement that tripped the breaker
    pub tripped: bool,
}

/// Account-level risk gate
pub struct RiskManager {
    config: RiskConfig,
    sizer: PositionSizer,
    calendar: TradingCalendar,
    state: Mutex<RiskState>,
}

impl RiskManager {
    pub fn new(config: RiskConfig, calendar: TradingCalendar, now: Timestamp) -> Self {
        let state = RiskState::new(config.account_equity, calendar.trading_day(now));
        Self {
            sizer: PositionSizer::new(config.clone()),
            config,
            calendar,
            state: Mutex::new(state),
        }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Read-modify-write of the risk state in one critical section
    fn transact<R>(&self, f: impl FnOnce(&mut RiskState) -> R) -> R {
        let mut state = self.state.lock();
        f(&mut state)
    }

    fn loss_limit(&self, state: &RiskState) -> Decimal {
        state.day_start_equity * self.config.daily_loss_limit
    }

    /// Checks an approved signal and reserves a position slot for it.
    ///
    /// Order of checks: circuit breaker, position limit, existing exposure,
    /// then sizing. Nothing is reserved on rejection.
    pub fn evaluate(self: &Arc<Self>, signal: &Signal) -> Result<OrderTicket, RiskRejection> {
        let instrument = signal.instrument().clone();
        let result = self.transact(|state| {
            if let Some(trip) = &state.breaker {
                return Err(RiskRejection::CircuitBreakerTripped { since: trip.at });
            }
            let in_use = state.slots_in_use();
            if in_use >= self.config.max_open_positions {
                return Err(RiskRejection::PositionLimitExceeded {
                    open: in_use,
                    max: self.config.max_open_positions,
                });
            }
            if state.exposed.contains(&instrument) {
                return Err(RiskRejection::DuplicateExposure(instrument.clone()));
            }
            let sized = self.sizer.size(signal, state.equity)?;

            state.pending_orders += 1;
            state.exposed.insert(instrument.clone());
            Ok(sized)
        });

        match result {
            Ok(sized) => {
                info!(
                    "[RISK] approved {} {} size={} sl={} tp={} risk={}",
                    instrument,
                    sized.side,
                    sized.size,
                    sized.stop_loss,
                    sized.take_profit,
                    sized.risk_amount.round_dp(2)
                );
                Ok(OrderTicket {
                    reservation: ExposureReservation {
                        manager: Arc::clone(self),
                        instrument: instrument.clone(),
                        committed: false,
                    },
                    instrument,
                    sized,
                })
            }
            Err(rejection) => {
                info!("[RISK] rejected {instrument}: {rejection}");
                Err(rejection)
            }
        }
    }

    fn release(&self, instrument: &InstrumentId) {
        self.transact(|state| {
            state.pending_orders = state.pending_orders.saturating_sub(1);
            state.exposed.remove(instrument);
        });
        debug!("[RISK] released reservation for {instrument}");
    }

    fn commit(&self, instrument: &InstrumentId) {
        self.transact(|state| {
            state.pending_orders = state.pending_orders.saturating_sub(1);
            state.open_positions += 1;
        });
        debug!("[RISK] {instrument} position open");
    }

    /// Books the realized P&L of a closed position and frees its slot.
    /// Trips the breaker when the day's net loss reaches the limit.
    pub fn settle(&self, instrument: &InstrumentId, realized_pnl: Decimal, at: Timestamp) -> SettlementOutcome {
        let outcome = self.transact(|state| {
            state.open_positions = state.open_positions.saturating_sub(1);
            state.exposed.remove(instrument);
            state.equity += realized_pnl;
            state.daily_realized_pnl += realized_pnl;

            let limit = self.loss_limit(state);
            let daily_loss = state.daily_loss();
            let tripped = state.breaker.is_none() && daily_loss >= limit;
            if tripped {
                let trip = BreakerTrip {
                    at,
                    daily_loss,
                    limit,
                    reason: format!("daily loss {daily_loss} >= limit {limit} after closing {instrument}"),
                };
                state.breaker_log.push(BreakerEvent::Tripped(trip.clone()));
                state.breaker = Some(trip);
            }
            SettlementOutcome {
                daily_realized_pnl: state.daily_realized_pnl,
                daily_loss,
                limit,
                tripped,
            }
        });

        info!(
            "[RISK] settled {instrument} pnl={realized_pnl} daily_pnl={} loss={}/{}",
            outcome.daily_realized_pnl, outcome.daily_loss, outcome.limit
        );
        if outcome.tripped {
            error!(
                "[RISK] ALERT circuit breaker tripped: daily loss {} >= {}",
                outcome.daily_loss, outcome.limit
            );
        }
        outcome
    }

    /// Trips the breaker by hand. Returns None if it was already set.
    ///
    /// Pending orders are not touched here; `OrderExecutor::halt` cancels them.
    pub fn halt(&self, reason: impl Into<String>, at: Timestamp) -> Option<BreakerTrip> {
        let reason = reason.into();
        let trip = self.transact(|state| {
            if state.breaker.is_some() {
                return None;
            }
            let trip = BreakerTrip {
                at,
                daily_loss: state.daily_loss(),
                limit: self.loss_limit(state),
                reason: reason.clone(),
            };
            state.breaker_log.push(BreakerEvent::Tripped(trip.clone()));
            state.breaker = Some(trip.clone());
            Some(trip)
        });
        if trip.is_some() {
            error!("[RISK] ALERT trading halted: {reason}");
        }
        trip
    }

    /// Explicit trading-day rollover: clears the breaker and daily P&L and
    /// re-bases the loss limit on current equity. Open positions are kept.
    pub fn reset_daily(&self, now: Timestamp) {
        let day = self.calendar.trading_day(now);
        let (previous_pnl, cleared) = self.transact(|state| {
            let previous = state.daily_realized_pnl;
            state.trading_day = day;
            state.day_start_equity = state.equity;
            state.daily_realized_pnl = Decimal::ZERO;
            let cleared = state.breaker.take().is_some();
            if cleared {
                state.breaker_log.push(BreakerEvent::Reset {
                    at: now,
                    trading_day: day,
                });
            }
            (previous, cleared)
        });
        info!("[RISK] Daily reset for {day}: PnL was {previous_pnl}, breaker cleared={cleared}");
    }

    /// True when `now` falls on a later trading day than the state
    pub fn needs_reset(&self, now: Timestamp) -> bool {
        let day = self.calendar.trading_day(now);
        self.transact(|state| day > state.trading_day)
    }

    pub fn is_halted(&self) -> bool {
        self.transact(|state| state.breaker.is_some())
    }

    /// Fails while the breaker is set. Checked again right before an order
    /// is created or resubmitted.
    pub fn ensure_trading(&self) -> Result<(), RiskRejection> {
        self.transact(|state| match &state.breaker {
            Some(trip) => Err(RiskRejection::CircuitBreakerTripped { since: trip.at }),
            None => Ok(()),
        })
    }

    pub fn snapshot(&self) -> RiskSnapshot {
        self.transact(|state| state.snapshot())
    }
}

/// Approved, sized order request holding a reserved slot
#[derive(Debug)]
pub struct OrderTicket {
    pub instrument: InstrumentId,
    pub sized: SizedOrder,
    pub reservation: ExposureReservation,
}

impl OrderTicket {
    pub fn side(&self) -> Side {
        self.sized.side
    }

    pub fn size(&self) -> Quantity {
        self.sized.size
    }

    pub fn stop_loss(&self) -> Price {
        self.sized.stop_loss
    }

    pub fn take_profit(&self) -> Price {
        self.sized.take_profit
    }
}

/// Slot reserved for an order that has not opened a position yet.
///
/// Dropping it releases the slot and the instrument; `commit` turns it into
/// an open position that is released later by `settle`.
pub struct ExposureReservation {
    manager: Arc<RiskManager>,
    instrument: InstrumentId,
    committed: bool,
}

impl ExposureReservation {
    pub fn instrument(&self) -> &InstrumentId {
        &self.instrument
    }

    pub fn commit(mut self) {
        self.committed = true;
        self.manager.commit(&self.instrument);
    }
}

impl Drop for ExposureReservation {
    fn drop(&mut self) {
        if !self.committed {
            self.manager.release(&self.instrument);
        }
    }
}

impl std::fmt::Debug for ExposureReservation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExposureReservation")
            .field("instrument", &self.instrument)
            .field("committed", &self.committed)
            .finish()
    }
}
