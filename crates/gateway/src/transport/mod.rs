//! Outbound notification transport
//!
//! Sinks are fire-and-forget: delivery failures are swallowed so a slow or
//! absent consumer never blocks the pipeline.

pub mod channel;
pub mod logger;
