//! Tokio channel-based notification transport
//!
//! Uses a broadcast channel so any number of consumers (dashboard, chat
//! bridge, tests) see every event. No serialization overhead.

use fxpilot_ports::{NotificationEvent, NotificationSink};
use log::debug;
use tokio::sync::broadcast;

/// Notification sink publishing onto a broadcast channel
#[derive(Clone)]
pub struct ChannelNotifier {
    tx: broadcast::Sender<NotificationEvent>,
}

impl ChannelNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Create a notifier/subscriber pair with given capacity
    pub fn pair(capacity: usize) -> (Self, NotificationSubscriber) {
        let notifier = Self::new(capacity);
        let subscriber = notifier.subscribe();
        (notifier, subscriber)
    }

    pub fn subscribe(&self) -> NotificationSubscriber {
        NotificationSubscriber {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl NotificationSink for ChannelNotifier {
    fn notify(&self, event: NotificationEvent) {
        // No subscribers is not an error
        if self.tx.send(event).is_err() {
            debug!("[NOTIFY] no subscribers, event dropped");
        }
    }
}

/// Receiving end of a [`ChannelNotifier`]
pub struct NotificationSubscriber {
    rx: broadcast::Receiver<NotificationEvent>,
}

impl NotificationSubscriber {
    /// Next event; None once every notifier is gone
    pub async fn next(&mut self) -> Option<NotificationEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("[NOTIFY] subscriber lagged, {skipped} events skipped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking receive; None when nothing is queued
    pub fn try_next(&mut self) -> Option<NotificationEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    /// Everything queued right now
    pub fn drain(&mut self) -> Vec<NotificationEvent> {
        std::iter::from_fn(|| self.try_next()).collect()
    }
}
