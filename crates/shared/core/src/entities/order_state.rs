use serde::{Deserialize, Serialize};

/// Order lifecycle state
///
/// ```text
/// Created ─► Submitted ─► Filled ─► Open ─► Closed
///               │  ▲
///               │  └── AwaitingRetry (timeout / pending, same key)
///               ├─► Rejected
///               ├─► TimedOut   (retries exhausted)
///               └─► Cancelled  (circuit breaker)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderState {
    /// Built locally, not yet sent
    Created,
    /// Sent to the broker, awaiting a response
    Submitted,
    /// Last attempt timed out or came back pending; waiting to resend
    AwaitingRetry,
    /// Broker confirmed execution
    Filled,
    /// Position recorded in the ledger
    Open,
    /// Position closed
    Closed,
    /// Broker refused the order
    Rejected,
    /// No confirmation after the final attempt
    TimedOut,
    /// Cancelled before a fill
    Cancelled,
}

impl OrderState {
    /// Returns true if the order can never change state again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderState::Closed | OrderState::Rejected | OrderState::TimedOut | OrderState::Cancelled
        )
    }

    /// Returns true while the order has not yet been filled
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            OrderState::Created | OrderState::Submitted | OrderState::AwaitingRetry
        )
    }

    /// Allowed edges of the lifecycle graph
    pub fn can_transition_to(&self, next: OrderState) -> bool {
        use OrderState::*;
        matches!(
            (self, next),
            (Created, Submitted)
                | (Created, Cancelled)
                | (Submitted, Filled)
                | (Submitted, Rejected)
                | (Submitted, TimedOut)
                | (Submitted, AwaitingRetry)
                | (Submitted, Cancelled)
                | (AwaitingRetry, Submitted)
                | (AwaitingRetry, Cancelled)
                | (Filled, Open)
                | (Open, Closed)
        )
    }
}

impl std::fmt::Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderState::Created => "CREATED",
            OrderState::Submitted => "SUBMITTED",
            OrderState::AwaitingRetry => "AWAITING_RETRY",
            OrderState::Filled => "FILLED",
            OrderState::Open => "OPEN",
            OrderState::Closed => "CLOSED",
            OrderState::Rejected => "REJECTED",
            OrderState::TimedOut => "TIMED_OUT",
            OrderState::Cancelled => "CANCELLED",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(OrderState::Closed.is_terminal());
        assert!(OrderState::Rejected.is_terminal());
        assert!(OrderState::TimedOut.is_terminal());
        assert!(OrderState::Cancelled.is_terminal());
        assert!(!OrderState::Open.is_terminal());
        assert!(!OrderState::AwaitingRetry.is_terminal());
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        let all = [
            OrderState::Created,
            OrderState::Submitted,
            OrderState::AwaitingRetry,
            OrderState::Filled,
            OrderState::Open,
            OrderState::Closed,
            OrderState::Rejected,
            OrderState::TimedOut,
            OrderState::Cancelled,
        ];
        for from in all.iter().filter(|s| s.is_terminal()) {
            for to in all {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn test_filled_cannot_be_cancelled() {
        assert!(!OrderState::Filled.can_transition_to(OrderState::Cancelled));
        assert!(!OrderState::Open.can_transition_to(OrderState::Cancelled));
    }
}
