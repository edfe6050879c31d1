//! fxpilot Gateway
//!
//! Adapters between the decision pipeline and the outside world:
//! - **Paper broker**: idempotent in-process broker with fault injection
//! - **Market feed**: newline-delimited JSON market events
//! - **Static advisory**: fixed regime labels for dry runs
//! - **Notification transport**: broadcast channel and log sinks
//!
//! ## Architecture
//!
//! ```text
//!  NDJSON (stdin, file) ──► MarketFeed ──► mpsc<MarketEvent> ──► Pipeline
//!
//!  OrderExecutor ──► BrokerGateway ──► PaperBroker (dedupe by key)
//!
//!  NotificationSink ──► ChannelNotifier ──► broadcast ──► dashboards
//!                   └─► LogNotifier
//! ```

pub mod adapters;
pub mod error;
pub mod transport;

// Re-export commonly used types
pub use adapters::{
    advisory::StaticAdvisory,
    feed::{FeedStats, parse_event, read_events},
    paper::{FaultPlan, PaperBroker, PaperConfig},
};
pub use error::{GatewayError, Result};
pub use transport::{
    channel::{ChannelNotifier, NotificationSubscriber},
    logger::LogNotifier,
};
