//! fxpilot Strategy
//!
//! Turns a stream of bars into directional signals:
//!
//! ```text
//! MarketBar ──► BarWindow (bounded, ordered, gap-aware)
//!                   │ window snapshot
//!                   ▼
//!              FeatureEngine ──► FeatureVector (deterministic)
//!                                    │
//!                                    ▼
//!                             LocalSignalModel ──► Signal {BUY|SELL|HOLD, confidence}
//!                             (hot-swappable params)
//! ```
//!
//! Everything here is synchronous and free of I/O apart from loading a
//! model artifact from disk.

pub mod error;
pub mod features;
pub mod indicators;
pub mod model;
pub mod window;

pub use error::{Error, Result};
pub use features::{FeatureConfig, FeatureEngine};
pub use model::{LocalSignalModel, ModelParams};
pub use window::BarWindow;
