use std::path::Path;

use fxpilot_order_manager::ExecutionConfig;
use thiserror::Error;

use super::types::PipelineConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Load pipeline configuration from a JSON file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PipelineConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Load configuration from a JSON string
pub fn load_config_from_str(json: &str) -> Result<PipelineConfig, ConfigError> {
    let config: PipelineConfig = serde_json::from_str(json)?;
    config.validate()?;
    Ok(config)
}

/// Load the default embedded configuration
pub fn load_default_config() -> Result<PipelineConfig, ConfigError> {
    let default_config = include_str!("pipeline_config.json");
    load_config_from_str(default_config)
}

impl PipelineConfig {
    /// Cross-section checks serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.instruments.is_empty() {
            return Err(ConfigError::Invalid("no instruments configured".into()));
        }
        let mut seen = std::collections::HashSet::new();
        if let Some(dup) = self.instruments.iter().find(|id| !seen.insert(*id)) {
            return Err(ConfigError::Invalid(format!("instrument {dup} listed twice")));
        }
        if self.scheduler.cycle_interval_secs == 0 || self.scheduler.day_check_interval_secs == 0 {
            return Err(ConfigError::Invalid("scheduler intervals must be positive".into()));
        }
        if self.scheduler.window_capacity < self.features.min_history() {
            return Err(ConfigError::Invalid(format!(
                "window_capacity {} is shorter than the {} bars features need",
                self.scheduler.window_capacity,
                self.features.min_history()
            )));
        }
        if self.scheduler.channel_capacity == 0 {
            return Err(ConfigError::Invalid("channel_capacity must be positive".into()));
        }
        if self.risk.volatility_feature != self.features.atr_feature() {
            return Err(ConfigError::Invalid(format!(
                "risk.volatility_feature '{}' is not produced by the feature engine ('{}')",
                self.risk.volatility_feature,
                self.features.atr_feature()
            )));
        }
        self.advisory.validate().map_err(ConfigError::Invalid)?;
        if self.calendar.rollover_hour_utc > 23 {
            return Err(ConfigError::Invalid("calendar.rollover_hour_utc must be 0-23".into()));
        }
        self.regime.validate().map_err(ConfigError::Invalid)?;
        self.risk.validate().map_err(ConfigError::Invalid)?;
        if self.execution.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("execution.retry.max_attempts must be at least 1".into()));
        }
        if self.execution.max_holding_secs > ExecutionConfig::MAX_HOLDING_SECS {
            return Err(ConfigError::Invalid(format!(
                "execution.max_holding_secs must not exceed {}",
                ExecutionConfig::MAX_HOLDING_SECS
            )));
        }
        Ok(())
    }
}
