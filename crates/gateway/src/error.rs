//! Error types for the gateway crate

use thiserror::Error;

/// Market feed errors
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Feed read failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed market event on line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, GatewayError>;
