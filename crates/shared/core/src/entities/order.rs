use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{OrderState, Side};
use crate::values::{IdempotencyKey, InstrumentId, Price, Quantity, Timestamp};

/// Attempted move along an edge the lifecycle graph does not have
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid order transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: OrderState,
    pub to: OrderState,
}

/// One entry in an order's append-only transition log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderTransition {
    pub from: OrderState,
    pub to: OrderState,
    pub at: Timestamp,
    /// Submission attempt number at the time of the transition
    pub attempt: u32,
    pub note: Option<String>,
}

/// A bracket market order and its lifecycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub key: IdempotencyKey,
    pub instrument: InstrumentId,
    pub side: Side,
    pub size: Quantity,
    pub stop_loss: Price,
    pub take_profit: Price,
    pub state: OrderState,
    /// Number of submissions made so far (all with the same key)
    pub attempts: u32,
    pub fill_price: Option<Price>,
    pub filled_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    transitions: Vec<OrderTransition>,
}

impl Order {
    pub fn new(
        instrument: impl Into<InstrumentId>,
        side: Side,
        size: Quantity,
        stop_loss: Price,
        take_profit: Price,
        created_at: Timestamp,
    ) -> Self {
        Self {
            key: IdempotencyKey::generate(),
            instrument: instrument.into(),
            side,
            size,
            stop_loss,
            take_profit,
            state: OrderState::Created,
            attempts: 0,
            fill_price: None,
            filled_at: None,
            created_at,
            updated_at: created_at,
            transitions: Vec::new(),
        }
    }

    /// Moves to `next`, appending to the transition log.
    ///
    /// The state is left untouched when the edge is not allowed.
    pub fn transition(
        &mut self,
        next: OrderState,
        at: Timestamp,
        note: Option<String>,
    ) -> Result<(), InvalidTransition> {
        if !self.state.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        if next == OrderState::Submitted {
            self.attempts += 1;
        }
        self.transitions.push(OrderTransition {
            from: self.state,
            to: next,
            at,
            attempt: self.attempts,
            note,
        });
        self.state = next;
        self.updated_at = at;
        Ok(())
    }

    /// Records the broker fill and moves to Filled
    pub fn record_fill(&mut self, price: Price, at: Timestamp) -> Result<(), InvalidTransition> {
        self.transition(OrderState::Filled, at, Some(format!("fill @ {price}")))?;
        self.fill_price = Some(price);
        self.filled_at = Some(at);
        Ok(())
    }

    pub fn transitions(&self) -> &[OrderTransition] {
        &self.transitions
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Notional at the fill price, zero before a fill
    pub fn filled_notional(&self) -> Decimal {
        self.fill_price.map(|p| p * self.size).unwrap_or(Decimal::ZERO)
    }
}
