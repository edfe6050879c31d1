//! Bounded exponential backoff for broker submissions.
//!
//! The loop itself lives in the executor so that every attempt, timeout and
//! wait shows up as an order state; this module only holds the schedule and
//! the cancellation-aware wait.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total submissions per order, first attempt included
    pub max_attempts: u32,
    /// Wait for a broker response before treating the attempt as timed out
    pub submit_timeout_ms: u64,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            submit_timeout_ms: 5_000,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
        }
    }
}

impl RetryPolicy {
    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }

    /// Delay after failed attempt `attempt` (1-based): doubles each time, capped
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let delay = self.initial_backoff_ms.saturating_mul(1u64 << exp);
        Duration::from_millis(delay.min(self.max_backoff_ms))
    }
}

/// Sleeps for `delay` unless cancellation is signalled first.
/// Returns true when cancelled.
pub async fn wait_or_cancel(delay: Duration, cancel: &mut watch::Receiver<bool>) -> bool {
    if *cancel.borrow() {
        return true;
    }
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    tokio::select! {
        _ = &mut sleep => false,
        // Reduced to a bool so no watch guard lives across the sleep below
        cancelled = async { cancel.wait_for(|c| *c).await.is_ok() } => {
            if cancelled {
                true
            } else {
                // Sender gone: nobody can cancel any more
                sleep.await;
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_millis(1_000));
        assert_eq!(policy.backoff(3), Duration::from_millis(2_000));
        assert_eq!(policy.backoff(6), Duration::from_millis(8_000));
        assert_eq!(policy.backoff(60), Duration::from_millis(8_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_completes_without_cancel() {
        let (_tx, mut rx) = watch::channel(false);
        let start = tokio::time::Instant::now();
        assert!(!wait_or_cancel(Duration::from_secs(2), &mut rx).await);
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    fn assert_send<T: Send>(_: T) {}

    #[test]
    fn test_wait_future_is_send() {
        let (_tx, mut rx) = watch::channel(false);
        assert_send(wait_or_cancel(Duration::from_secs(1), &mut rx));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_runs_out_when_sender_dropped() {
        let (tx, mut rx) = watch::channel(false);
        drop(tx);
        let start = tokio::time::Instant::now();
        assert!(!wait_or_cancel(Duration::from_secs(3), &mut rx).await);
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_interrupted_by_cancel() {
        let (tx, mut rx) = watch::channel(false);
        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            tx.send(true).unwrap();
            tx
        });
        let start = tokio::time::Instant::now();
        assert!(wait_or_cancel(Duration::from_secs(60), &mut rx).await);
        assert!(start.elapsed() < Duration::from_secs(60));
        drop(canceller.await.unwrap());
    }
}
