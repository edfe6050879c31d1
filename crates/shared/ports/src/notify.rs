use fxpilot_core::{CloseReason, Direction, IdempotencyKey, InstrumentId, Price, Quantity, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Outbound events for dashboards and chat notifications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NotificationEvent {
    SignalApproved {
        instrument: InstrumentId,
        direction: Direction,
        confidence: f64,
        threshold: f64,
    },
    OrderFilled {
        instrument: InstrumentId,
        key: IdempotencyKey,
        side: Side,
        size: Quantity,
        price: Price,
    },
    PositionClosed {
        instrument: InstrumentId,
        reason: CloseReason,
        realized_pnl: Decimal,
    },
    OrderSubmissionFailed {
        instrument: InstrumentId,
        key: IdempotencyKey,
        attempts: u32,
    },
    CircuitBreakerTripped {
        daily_loss: Decimal,
        limit: Decimal,
    },
    AdvisoryBudgetExhausted {
        calls_today: u32,
        cap: u32,
    },
}

impl NotificationEvent {
    /// Operator-visible alerts, as opposed to informational events
    pub fn is_alert(&self) -> bool {
        matches!(
            self,
            NotificationEvent::CircuitBreakerTripped { .. }
                | NotificationEvent::AdvisoryBudgetExhausted { .. }
                | NotificationEvent::OrderSubmissionFailed { .. }
        )
    }
}

/// Fire-and-forget outbound sink.
///
/// `notify` must not block and must swallow its own delivery failures.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: NotificationEvent);
}

/// Sink that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl NotificationSink for NullNotifier {
    fn notify(&self, _event: NotificationEvent) {}
}
