use async_trait::async_trait;
use fxpilot_core::{IdempotencyKey, InstrumentId, Price, Quantity, Side, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::BrokerResult;

/// Bracket market order as sent to the broker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub key: IdempotencyKey,
    pub instrument: InstrumentId,
    pub side: Side,
    pub size: Quantity,
    pub stop_loss: Price,
    pub take_profit: Price,
}

/// Execution confirmation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub price: Price,
    pub at: Timestamp,
}

/// Broker response to a submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SubmitAck {
    Accepted(Fill),
    Rejected { reason: String },
    /// Received but not yet executed; resubmit with the same key to poll
    Pending,
}

/// Open trade as the broker sees it, for reconciliation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerTrade {
    pub key: IdempotencyKey,
    pub instrument: InstrumentId,
    pub side: Side,
    pub size: Quantity,
    pub entry_price: Price,
}

/// Port to the execution venue.
///
/// Implementations must deduplicate by idempotency key: a resubmission with
/// a key that already filled returns the original fill without new exposure.
#[async_trait]
pub trait BrokerGateway: Send + Sync {
    /// Submit (or resubmit) an order
    async fn submit(&self, request: &SubmitRequest) -> BrokerResult<SubmitAck>;

    /// Cancel an unfilled order; later submissions with this key are refused
    async fn cancel(&self, key: IdempotencyKey) -> BrokerResult<()>;

    /// Close the trade opened by `key` at market
    async fn close_trade(&self, key: IdempotencyKey) -> BrokerResult<Fill>;

    /// All trades the broker currently holds open
    async fn open_trades(&self) -> BrokerResult<Vec<BrokerTrade>>;

    /// Adapter name for logging
    fn name(&self) -> &str {
        "Broker"
    }
}
