use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Side;
use crate::values::{IdempotencyKey, InstrumentId, Price, Quantity, Timestamp};

/// Position lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionStatus {
    Open,
    Closed,
}

/// Why a position was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    StopLoss,
    TakeProfit,
    /// Held past the maximum holding period
    TimeExit,
    Manual,
    CircuitBreaker,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CloseReason::StopLoss => "stop_loss",
            CloseReason::TakeProfit => "take_profit",
            CloseReason::TimeExit => "time_exit",
            CloseReason::Manual => "manual",
            CloseReason::CircuitBreaker => "circuit_breaker",
        };
        write!(f, "{s}")
    }
}

/// A bracketed position in one instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: Uuid,
    pub instrument: InstrumentId,
    /// Key of the order that opened this position
    pub order_key: IdempotencyKey,
    pub side: Side,
    pub entry_price: Price,
    /// Always positive
    pub size: Quantity,
    pub stop_loss: Price,
    pub take_profit: Price,
    pub opened_at: Timestamp,
    pub status: PositionStatus,
    /// Last observed price
    pub mark_price: Price,
    pub unrealized_pnl: Decimal,
    pub realized_pnl: Decimal,
    pub exit_price: Option<Price>,
    pub closed_at: Option<Timestamp>,
    pub close_reason: Option<CloseReason>,
}

impl Position {
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        instrument: InstrumentId,
        order_key: IdempotencyKey,
        side: Side,
        entry_price: Price,
        size: Quantity,
        stop_loss: Price,
        take_profit: Price,
        opened_at: Timestamp,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            instrument,
            order_key,
            side,
            entry_price,
            size,
            stop_loss,
            take_profit,
            opened_at,
            status: PositionStatus::Open,
            mark_price: entry_price,
            unrealized_pnl: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            exit_price: None,
            closed_at: None,
            close_reason: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    /// P&L if the position were closed at `price`
    pub fn pnl_at(&self, price: Price) -> Decimal {
        (price - self.entry_price) * self.size * self.side.sign()
    }

    /// Mark-to-market: update mark price and unrealized P&L
    pub fn mark(&mut self, price: Price) {
        if !self.is_open() {
            return;
        }
        self.mark_price = price;
        self.unrealized_pnl = self.pnl_at(price);
    }

    /// Which bracket leg, if any, `price` has reached
    ///
    /// When both legs are touched at once the stop wins.
    pub fn bracket_hit(&self, price: Price) -> Option<CloseReason> {
        if !self.is_open() {
            return None;
        }
        let (stop_hit, target_hit) = match self.side {
            Side::Buy => (price <= self.stop_loss, price >= self.take_profit),
            Side::Sell => (price >= self.stop_loss, price <= self.take_profit),
        };
        if stop_hit {
            Some(CloseReason::StopLoss)
        } else if target_hit {
            Some(CloseReason::TakeProfit)
        } else {
            None
        }
    }

    /// Closes at `exit_price`, returning realized P&L.
    /// Closing an already closed position returns its recorded P&L unchanged.
    pub fn close(&mut self, exit_price: Price, at: Timestamp, reason: CloseReason) -> Decimal {
        if !self.is_open() {
            return self.realized_pnl;
        }
        self.realized_pnl = self.pnl_at(exit_price);
        self.unrealized_pnl = Decimal::ZERO;
        self.mark_price = exit_price;
        self.exit_price = Some(exit_price);
        self.closed_at = Some(at);
        self.close_reason = Some(reason);
        self.status = PositionStatus::Closed;
        self.realized_pnl
    }
}
