//! Paper broker
//!
//! In-process execution venue for dry runs and tests. Fills bracket market
//! orders at the last price it was given and deduplicates by idempotency key,
//! so a resubmission after a lost response returns the original fill.
//!
//! Faults can be injected per submission to exercise the retry path:
//! hangs, lost responses (executed but never answered), pending acks, and
//! outages.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use fxpilot_core::{IdempotencyKey, InstrumentId, Price, Side};
use fxpilot_ports::{
    BrokerError, BrokerGateway, BrokerResult, BrokerTrade, Clock, Fill, SubmitAck, SubmitRequest,
};
use log::{debug, info, warn};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperConfig {
    /// Smallest accepted distance between entry and stop-loss
    pub min_stop_distance: Decimal,
    /// Simulated round-trip latency per call
    pub latency_ms: u64,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            min_stop_distance: Decimal::new(5, 4),
            latency_ms: 0,
        }
    }
}

/// Faults applied to the next submissions, counted down per call.
/// Checked in field order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultPlan {
    /// Fail with `Unavailable`
    pub unavailable: u32,
    /// Never answer, nothing executes
    pub hang: u32,
    /// Execute, then never answer
    pub lose_response: u32,
    /// Answer `Pending` without executing
    pub pending: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fault {
    Unavailable,
    Hang,
    LoseResponse,
    Pending,
}

impl FaultPlan {
    fn take(&mut self) -> Option<Fault> {
        let slots = [
            (&mut self.unavailable, Fault::Unavailable),
            (&mut self.hang, Fault::Hang),
            (&mut self.lose_response, Fault::LoseResponse),
            (&mut self.pending, Fault::Pending),
        ];
        for (remaining, fault) in slots {
            if *remaining > 0 {
                *remaining -= 1;
                return Some(fault);
            }
        }
        None
    }
}

#[derive(Debug, Clone)]
struct PaperTrade {
    request: SubmitRequest,
    fill: Fill,
    closed: Option<Fill>,
}

pub struct PaperBroker {
    config: PaperConfig,
    clock: Arc<dyn Clock>,
    prices: DashMap<InstrumentId, Price>,
    trades: Mutex<HashMap<IdempotencyKey, PaperTrade>>,
    cancelled: Mutex<HashSet<IdempotencyKey>>,
    faults: Mutex<FaultPlan>,
    submissions: AtomicU32,
    fills: AtomicU32,
}

impl PaperBroker {
    pub fn new(config: PaperConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            prices: DashMap::new(),
            trades: Mutex::new(HashMap::new()),
            cancelled: Mutex::new(HashSet::new()),
            faults: Mutex::new(FaultPlan::default()),
            submissions: AtomicU32::new(0),
            fills: AtomicU32::new(0),
        }
    }

    /// Last traded price used for fills and closes
    pub fn set_price(&self, instrument: impl Into<InstrumentId>, price: Price) {
        self.prices.insert(instrument.into(), price);
    }

    pub fn price(&self, instrument: &InstrumentId) -> Option<Price> {
        self.prices.get(instrument).map(|p| *p)
    }

    /// Replaces the pending fault plan
    pub fn inject(&self, plan: FaultPlan) {
        *self.faults.lock() = plan;
    }

    /// Submissions received, duplicates included
    pub fn submission_count(&self) -> u32 {
        self.submissions.load(Ordering::SeqCst)
    }

    /// Distinct orders executed
    pub fn fill_count(&self) -> u32 {
        self.fills.load(Ordering::SeqCst)
    }

    async fn latency(&self) {
        if self.config.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;
        }
    }

    fn validate(&self, request: &SubmitRequest, price: Price) -> Result<(), String> {
        if request.size <= Decimal::ZERO {
            return Err(format!("invalid size {}", request.size));
        }
        let (stop_ok, target_ok) = match request.side {
            Side::Buy => (request.stop_loss < price, request.take_profit > price),
            Side::Sell => (request.stop_loss > price, request.take_profit < price),
        };
        if !stop_ok || !target_ok {
            return Err(format!(
                "invalid bracket sl={} tp={} at price {price}",
                request.stop_loss, request.take_profit
            ));
        }
        let distance = (price - request.stop_loss).abs();
        if distance < self.config.min_stop_distance {
            return Err(format!(
                "invalid stop distance {distance} < {}",
                self.config.min_stop_distance
            ));
        }
        Ok(())
    }

    /// Executes or deduplicates a submission
    fn execute(&self, request: &SubmitRequest) -> SubmitAck {
        if self.cancelled.lock().contains(&request.key) {
            return SubmitAck::Rejected {
                reason: format!("order {} was cancelled", request.key),
            };
        }
        let mut trades = self.trades.lock();
        if let Some(existing) = trades.get(&request.key) {
            debug!("[PAPER] duplicate submission {}, returning original fill", request.key);
            return SubmitAck::Accepted(existing.fill);
        }

        let Some(price) = self.price(&request.instrument) else {
            return SubmitAck::Rejected {
                reason: format!("no price for {}", request.instrument),
            };
        };
        if let Err(reason) = self.validate(request, price) {
            warn!("[PAPER] rejected {} key={}: {reason}", request.instrument, request.key);
            return SubmitAck::Rejected { reason };
        }

        let fill = Fill {
            price,
            at: self.clock.now(),
        };
        trades.insert(
            request.key,
            PaperTrade {
                request: request.clone(),
                fill,
                closed: None,
            },
        );
        self.fills.fetch_add(1, Ordering::SeqCst);
        info!(
            "[PAPER] filled {} {} size={} @ {price} key={}",
            request.instrument, request.side, request.size, request.key
        );
        SubmitAck::Accepted(fill)
    }
}

#[async_trait]
impl BrokerGateway for PaperBroker {
    async fn submit(&self, request: &SubmitRequest) -> BrokerResult<SubmitAck> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        let fault = self.faults.lock().take();
        self.latency().await;

        match fault {
            Some(Fault::Unavailable) => {
                return Err(BrokerError::Unavailable("paper broker outage".into()));
            }
            Some(Fault::Hang) => {
                debug!("[PAPER] hanging submission {}", request.key);
                return std::future::pending().await;
            }
            Some(Fault::Pending) => return Ok(SubmitAck::Pending),
            Some(Fault::LoseResponse) | None => {}
        }

        let ack = self.execute(request);
        if fault == Some(Fault::LoseResponse) {
            debug!("[PAPER] dropping response for {}", request.key);
            return std::future::pending().await;
        }
        Ok(ack)
    }

    async fn cancel(&self, key: IdempotencyKey) -> BrokerResult<()> {
        self.latency().await;
        if self.trades.lock().contains_key(&key) {
            return Err(BrokerError::Transport(format!("order {key} already filled")));
        }
        self.cancelled.lock().insert(key);
        debug!("[PAPER] cancelled {key}");
        Ok(())
    }

    async fn close_trade(&self, key: IdempotencyKey) -> BrokerResult<Fill> {
        self.latency().await;
        let mut trades = self.trades.lock();
        let trade = trades
            .get_mut(&key)
            .filter(|t| t.closed.is_none())
            .ok_or(BrokerError::UnknownOrder(key))?;
        let price = self
            .prices
            .get(&trade.request.instrument)
            .map(|p| *p)
            .unwrap_or(trade.fill.price);
        let fill = Fill {
            price,
            at: self.clock.now(),
        };
        trade.closed = Some(fill);
        info!("[PAPER] closed {} @ {price} key={key}", trade.request.instrument);
        Ok(fill)
    }

    async fn open_trades(&self) -> BrokerResult<Vec<BrokerTrade>> {
        self.latency().await;
        let trades = self.trades.lock();
        let mut open: Vec<_> = trades
            .values()
            .filter(|t| t.closed.is_none())
            .map(|t| BrokerTrade {
                key: t.request.key,
                instrument: t.request.instrument.clone(),
                side: t.request.side,
                size: t.request.size,
                entry_price: t.fill.price,
            })
            .collect();
        open.sort_by(|a, b| a.instrument.cmp(&b.instrument));
        Ok(open)
    }

    fn name(&self) -> &str {
        "PaperBroker"
    }
}
