//! Pipeline configuration
//!
//! One JSON document, every section optional; missing fields take their
//! defaults.

pub mod loader;
pub mod types;

pub use loader::{ConfigError, load_config, load_config_from_str, load_default_config};
pub use types::{ModelConfig, PipelineConfig, SchedulerConfig};
