//! fxpilot Ports
//!
//! Boundary traits between the decision pipeline and its external
//! collaborators: time, broker, regime advisory, and notifications.
//! Adapters live in `fxpilot-gateway` and `fxpilot-clock`.

mod advisory;
mod broker;
mod clock;
mod error;
mod notify;

pub use advisory::{AdvisoryRequest, AdvisoryResponse, AdvisorySource, InstrumentSummary, RegimeAdvice};
pub use broker::{BrokerGateway, BrokerTrade, Fill, SubmitAck, SubmitRequest};
pub use clock::Clock;
pub use error::{AdvisoryError, BrokerError, BrokerResult};
pub use notify::{NotificationEvent, NotificationSink, NullNotifier};
