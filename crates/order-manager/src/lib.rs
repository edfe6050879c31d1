//! fxpilot Order Manager
//!
//! Turns risk-approved tickets into broker orders and tracks the resulting
//! positions:
//! - **Execution**: per-instrument order state machine with bounded,
//!   idempotent retries and circuit-breaker cancellation
//! - **Ledger**: authoritative open/closed positions and P&L
//! - **Reconciliation**: ledger versus broker open trades
//!
//! ## Architecture
//!
//! ```text
//! RiskManager ──► OrderTicket ──► ┌──────────────────────────────────────┐
//!                                 │            OrderExecutor             │
//!                                 │  slot lock per instrument            │
//!                                 │  CREATED → SUBMITTED → FILLED → OPEN │
//!                                 │     retry: AWAITING_RETRY (backoff)  │
//!                                 └──────┬──────────────────────┬────────┘
//!                                        │ submit / cancel /    │ fill
//!                                        │ close_trade          ▼
//!                                        ▼               PositionLedger
//!                                  BrokerGateway               │ mark(price)
//!                                                              ▼
//!                          price ticks ──► on_price ──► SL / TP / time exit
//!                                                              │
//!                               RiskManager::settle ◄── CLOSED ┘
//! ```

pub mod error;
pub mod execution;
pub mod ledger;
pub mod retry;

pub use error::{Error, Result};
pub use execution::{ExecutionConfig, OrderExecutor, ReconcileReport};
pub use ledger::{LedgerSnapshot, MarkOutcome, PositionLedger};
pub use retry::{RetryPolicy, wait_or_cancel};
