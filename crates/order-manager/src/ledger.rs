//! Position Ledger
//!
//! Authoritative store of positions. One position per instrument at most;
//! closed positions are kept in an append-only history for reporting.
//!
//! Mark-to-market runs on every price update and reports (but never acts
//! on) stop-loss / take-profit triggers. Closing goes through the executor so
//! the order lifecycle and risk settlement stay in step with the ledger.

use std::collections::HashMap;

use fxpilot_core::{CloseReason, InstrumentId, Order, OrderState, Position, Price, Timestamp};
use log::{debug, info};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Result of marking an open position
#[derive(Debug, Clone, PartialEq)]
pub struct MarkOutcome {
    pub unrealized_pnl: Decimal,
    /// Bracket leg reached by this price, if any
    pub trigger: Option<CloseReason>,
    pub opened_at: Timestamp,
}

/// Read-only view for risk, dashboards, and notifications
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub open: Vec<Position>,
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Decimal,
    pub closed_count: usize,
}

#[derive(Debug, Default)]
struct LedgerBook {
    open: HashMap<InstrumentId, Position>,
    closed: Vec<Position>,
    realized_pnl: Decimal,
}

#[derive(Debug, Default)]
pub struct PositionLedger {
    book: RwLock<LedgerBook>,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a position from a filled order
    pub fn open_position(&self, order: &Order, entry_price: Price, at: Timestamp) -> Result<Position> {
        if order.state != OrderState::Filled {
            return Err(Error::InvalidTransition(fxpilot_core::InvalidTransition {
                from: order.state,
                to: OrderState::Open,
            }));
        }
        let mut book = self.book.write();
        if book.open.contains_key(&order.instrument) {
            return Err(Error::InstrumentBusy(order.instrument.clone()));
        }
        let position = Position::open(
            order.instrument.clone(),
            order.key,
            order.side,
            entry_price,
            order.size,
            order.stop_loss,
            order.take_profit,
            at,
        );
        book.open.insert(order.instrument.clone(), position.clone());
        info!(
            "[LEDGER] opened {} {} size={} entry={} sl={} tp={}",
            position.instrument,
            position.side,
            position.size,
            entry_price,
            position.stop_loss,
            position.take_profit
        );
        Ok(position)
    }

    /// Recomputes unrealized P&L at `price`. None when nothing is open.
    pub fn mark(&self, instrument: &InstrumentId, price: Price) -> Option<MarkOutcome> {
        let mut book = self.book.write();
        let position = book.open.get_mut(instrument)?;
        position.mark(price);
        let trigger = position.bracket_hit(price);
        if let Some(reason) = trigger {
            debug!("[LEDGER] {instrument} {reason} triggered at {price}");
        }
        Some(MarkOutcome {
            unrealized_pnl: position.unrealized_pnl,
            trigger,
            opened_at: position.opened_at,
        })
    }

    /// Closes the open position for `instrument` and books its P&L
    pub fn close(
        &self,
        instrument: &InstrumentId,
        exit_price: Price,
        at: Timestamp,
        reason: CloseReason,
    ) -> Result<Position> {
        let mut book = self.book.write();
        let mut position = book
            .open
            .remove(instrument)
            .ok_or_else(|| Error::NoOpenPosition(instrument.clone()))?;
        let pnl = position.close(exit_price, at, reason);
        book.realized_pnl += pnl;
        book.closed.push(position.clone());
        info!(
            "[LEDGER] closed {instrument} reason={reason} exit={exit_price} pnl={pnl} total_realized={}",
            book.realized_pnl
        );
        Ok(position)
    }

    pub fn get(&self, instrument: &InstrumentId) -> Option<Position> {
        self.book.read().open.get(instrument).cloned()
    }

    pub fn has_open(&self, instrument: &InstrumentId) -> bool {
        self.book.read().open.contains_key(instrument)
    }

    pub fn open_positions(&self) -> Vec<Position> {
        let mut open: Vec<_> = self.book.read().open.values().cloned().collect();
        open.sort_by(|a, b| a.instrument.cmp(&b.instrument));
        open
    }

    pub fn closed_positions(&self) -> Vec<Position> {
        self.book.read().closed.clone()
    }

    pub fn open_count(&self) -> usize {
        self.book.read().open.len()
    }

    pub fn realized_pnl(&self) -> Decimal {
        self.book.read().realized_pnl
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        let book = self.book.read();
        let mut open: Vec<_> = book.open.values().cloned().collect();
        open.sort_by(|a, b| a.instrument.cmp(&b.instrument));
        LedgerSnapshot {
            unrealized_pnl: open.iter().map(|p| p.unrealized_pnl).sum(),
            open,
            realized_pnl: book.realized_pnl,
            closed_count: book.closed.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use fxpilot_core::Side;
    use rust_decimal_macros::dec;

    fn now() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap()
    }

    fn filled(instrument: &str, side: Side, sl: Price, tp: Price, price: Price) -> Order {
        let mut order = Order::new(instrument, side, dec!(10000), sl, tp, now());
        order.transition(OrderState::Submitted, now(), None).unwrap();
        order.record_fill(price, now()).unwrap();
        order
    }

    #[test]
    fn test_open_and_mark_long() {
        let ledger = PositionLedger::new();
        let order = filled("EURUSD", Side::Buy, dec!(1.0835), dec!(1.0880), dec!(1.0850));
        ledger.open_position(&order, dec!(1.0850), now()).unwrap();

        let outcome = ledger.mark(&"EURUSD".into(), dec!(1.0860)).unwrap();
        assert_eq!(outcome.unrealized_pnl, dec!(10.0000));
        assert_eq!(outcome.trigger, None);

        let outcome = ledger.mark(&"EURUSD".into(), dec!(1.0830)).unwrap();
        assert_eq!(outcome.trigger, Some(CloseReason::StopLoss));
        // Marking never closes
        assert_eq!(ledger.open_count(), 1);
    }

    #[test]
    fn test_short_take_profit_trigger() {
        let ledger = PositionLedger::new();
        let order = filled("GBPUSD", Side::Sell, dec!(1.2700), dec!(1.2600), dec!(1.2650));
        ledger.open_position(&order, dec!(1.2650), now()).unwrap();
        let outcome = ledger.mark(&"GBPUSD".into(), dec!(1.2599)).unwrap();
        assert_eq!(outcome.trigger, Some(CloseReason::TakeProfit));
        assert!(outcome.unrealized_pnl > Decimal::ZERO);
    }

    #[test]
    fn test_close_books_realized_pnl() {
        let ledger = PositionLedger::new();
        let order = filled("EURUSD", Side::Buy, dec!(1.0835), dec!(1.0880), dec!(1.0850));
        ledger.open_position(&order, dec!(1.0850), now()).unwrap();

        let closed = ledger
            .close(&"EURUSD".into(), dec!(1.0835), now(), CloseReason::StopLoss)
            .unwrap();
        assert_eq!(closed.realized_pnl, dec!(-15.0000));
        assert_eq!(closed.close_reason, Some(CloseReason::StopLoss));

        let snap = ledger.snapshot();
        assert!(snap.open.is_empty());
        assert_eq!(snap.realized_pnl, dec!(-15.0000));
        assert_eq!(snap.closed_count, 1);

        assert!(matches!(
            ledger.close(&"EURUSD".into(), dec!(1.0835), now(), CloseReason::Manual),
            Err(Error::NoOpenPosition(_))
        ));
    }

    #[test]
    fn test_snapshot_unchanged_without_activity() {
        let ledger = PositionLedger::new();
        assert_eq!(ledger.snapshot(), LedgerSnapshot::default());

        let order = filled("EURUSD", Side::Buy, dec!(1.0835), dec!(1.0880), dec!(1.0850));
        let opened = ledger.open_position(&order, dec!(1.0850), now()).unwrap();
        let before = ledger.snapshot();
        assert_eq!(before.open, vec![opened]);
        assert_eq!(ledger.snapshot(), before);

        ledger.mark(&"EURUSD".into(), dec!(1.0860)).unwrap();
        assert_ne!(ledger.snapshot(), before);
    }

    #[test]
    fn test_one_position_per_instrument() {
        let ledger = PositionLedger::new();
        let first = filled("EURUSD", Side::Buy, dec!(1.0835), dec!(1.0880), dec!(1.0850));
        let second = filled("EURUSD", Side::Sell, dec!(1.0880), dec!(1.0820), dec!(1.0850));
        ledger.open_position(&first, dec!(1.0850), now()).unwrap();
        assert!(matches!(
            ledger.open_position(&second, dec!(1.0850), now()),
            Err(Error::InstrumentBusy(_))
        ));
    }

    #[test]
    fn test_unfilled_order_cannot_open() {
        let ledger = PositionLedger::new();
        let order = Order::new("EURUSD", Side::Buy, dec!(10000), dec!(1.08), dec!(1.09), now());
        assert!(matches!(
            ledger.open_position(&order, dec!(1.0850), now()),
            Err(Error::InvalidTransition(_))
        ));
        assert!(ledger.mark(&"EURUSD".into(), dec!(1.0850)).is_none());
    }
}
