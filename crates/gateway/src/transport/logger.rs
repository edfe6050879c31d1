//! Notification sink writing to the log

use fxpilot_ports::{NotificationEvent, NotificationSink};
use log::{error, info};

/// Logs informational events at `info` and alerts at `error`
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn notify(&self, event: NotificationEvent) {
        let body = serde_json::to_string(&event).unwrap_or_else(|_| format!("{event:?}"));
        if event.is_alert() {
            error!("[NOTIFY] ALERT {body}");
        } else {
            info!("[NOTIFY] {body}");
        }
    }
}
