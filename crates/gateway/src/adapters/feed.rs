//! Newline-delimited JSON market feed
//!
//! One `MarketEvent` per line:
//!
//! ```text
//! {"type":"bar","instrument":"EURUSD","timestamp":"2024-03-04T10:00:00Z","open":"1.0850",...}
//! {"type":"gap","instrument":"EURUSD","from":"...","to":"..."}
//! {"type":"tick","instrument":"EURUSD","price":"1.0861","at":"..."}
//! ```
//!
//! Malformed lines are logged and skipped; the feed never stops on bad input.

use fxpilot_core::MarketEvent;
use log::{debug, info, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

use crate::error::{GatewayError, Result};

/// Counters for one feed run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub lines: usize,
    pub events: usize,
    pub malformed: usize,
}

/// Parses one feed line
pub fn parse_event(line: &str, line_no: usize) -> Result<MarketEvent> {
    serde_json::from_str(line).map_err(|source| GatewayError::Parse {
        line: line_no,
        source,
    })
}

/// Reads events until EOF and forwards them in order.
///
/// Returns `ChannelClosed` if the consumer goes away first.
pub async fn read_events<R>(reader: R, tx: mpsc::Sender<MarketEvent>) -> Result<FeedStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut stats = FeedStats::default();

    while let Some(line) = lines.next_line().await? {
        stats.lines += 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match parse_event(trimmed, stats.lines) {
            Ok(event) => {
                debug!("[FEED] {} event for {}", event_kind(&event), event.instrument());
                tx.send(event).await.map_err(|_| GatewayError::ChannelClosed)?;
                stats.events += 1;
            }
            Err(e) => {
                warn!("[FEED] {e}");
                stats.malformed += 1;
            }
        }
    }

    info!(
        "[FEED] finished: {} lines, {} events, {} malformed",
        stats.lines, stats.events, stats.malformed
    );
    Ok(stats)
}

fn event_kind(event: &MarketEvent) -> &'static str {
    match event {
        MarketEvent::Bar(_) => "bar",
        MarketEvent::Gap { .. } => "gap",
        MarketEvent::Tick { .. } => "tick",
    }
}
