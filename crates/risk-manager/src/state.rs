use std::collections::HashSet;

use chrono::NaiveDate;
use fxpilot_core::{InstrumentId, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Why and when the breaker tripped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerTrip {
    pub at: Timestamp,
    pub daily_loss: Decimal,
    pub limit: Decimal,
    pub reason: String,
}

/// Append-only breaker audit entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BreakerEvent {
    Tripped(BreakerTrip),
    Reset { at: Timestamp, trading_day: NaiveDate },
}

/// Account-wide risk state. Only the risk manager mutates it, under its lock.
#[derive(Debug, Clone)]
pub struct RiskState {
    pub(crate) trading_day: NaiveDate,
    pub(crate) day_start_equity: Decimal,
    pub(crate) equity: Decimal,
    pub(crate) daily_realized_pnl: Decimal,
    pub(crate) open_positions: usize,
    pub(crate) pending_orders: usize,
    pub(crate) exposed: HashSet<InstrumentId>,
    pub(crate) breaker: Option<BreakerTrip>,
    pub(crate) breaker_log: Vec<BreakerEvent>,
}

impl RiskState {
    pub(crate) fn new(equity: Decimal, trading_day: NaiveDate) -> Self {
        Self {
            trading_day,
            day_start_equity: equity,
            equity,
            daily_realized_pnl: Decimal::ZERO,
            open_positions: 0,
            pending_orders: 0,
            exposed: HashSet::new(),
            breaker: None,
            breaker_log: Vec::new(),
        }
    }

    /// Net realized loss today, zero when net positive
    pub fn daily_loss(&self) -> Decimal {
        (-self.daily_realized_pnl).max(Decimal::ZERO)
    }

    /// Slots taken by open positions and in-flight orders
    pub fn slots_in_use(&self) -> usize {
        self.open_positions + self.pending_orders
    }

    pub fn is_exposed(&self, instrument: &InstrumentId) -> bool {
        self.exposed.contains(instrument)
    }

    pub fn snapshot(&self) -> RiskSnapshot {
        let mut exposed: Vec<InstrumentId> = self.exposed.iter().cloned().collect();
        exposed.sort();
        RiskSnapshot {
            trading_day: self.trading_day,
            day_start_equity: self.day_start_equity,
            equity: self.equity,
            daily_realized_pnl: self.daily_realized_pnl,
            daily_loss: self.daily_loss(),
            open_positions: self.open_positions,
            pending_orders: self.pending_orders,
            exposed,
            breaker: self.breaker.clone(),
            breaker_log: self.breaker_log.clone(),
        }
    }
}

/// Read-only copy for reporting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSnapshot {
    pub trading_day: NaiveDate,
    pub day_start_equity: Decimal,
    pub equity: Decimal,
    pub daily_realized_pnl: Decimal,
    pub daily_loss: Decimal,
    pub open_positions: usize,
    pub pending_orders: usize,
    pub exposed: Vec<InstrumentId>,
    pub breaker: Option<BreakerTrip>,
    pub breaker_log: Vec<BreakerEvent>,
}

impl RiskSnapshot {
    pub fn breaker_tripped(&self) -> bool {
        self.breaker.is_some()
    }
}
