use std::path::PathBuf;
use std::time::Duration;

use fxpilot_advisory::{AdvisoryConfig, RegimeThresholds};
use fxpilot_clock::TradingCalendar;
use fxpilot_core::InstrumentId;
use fxpilot_gateway::PaperConfig;
use fxpilot_order_manager::ExecutionConfig;
use fxpilot_risk_manager::RiskConfig;
use fxpilot_strategy::FeatureConfig;
use serde::{Deserialize, Serialize};

/// Root of the configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub instruments: Vec<InstrumentId>,
    pub scheduler: SchedulerConfig,
    pub features: FeatureConfig,
    pub model: ModelConfig,
    pub regime: RegimeThresholds,
    pub advisory: AdvisoryConfig,
    pub risk: RiskConfig,
    pub execution: ExecutionConfig,
    pub calendar: TradingCalendar,
    pub paper: PaperConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            instruments: vec!["EURUSD".into(), "GBPUSD".into(), "USDJPY".into()],
            scheduler: SchedulerConfig::default(),
            features: FeatureConfig::default(),
            model: ModelConfig::default(),
            regime: RegimeThresholds::default(),
            advisory: AdvisoryConfig::default(),
            risk: RiskConfig::default(),
            execution: ExecutionConfig::default(),
            calendar: TradingCalendar::default(),
            paper: PaperConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Evaluation cycle period per instrument
    pub cycle_interval_secs: u64,
    /// How often the trading-day boundary is checked
    pub day_check_interval_secs: u64,
    /// Bars kept per instrument
    pub window_capacity: usize,
    /// Queue depth for market events and advisory triggers
    pub channel_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cycle_interval_secs: 300,
            day_check_interval_secs: 60,
            window_capacity: 500,
            channel_capacity: 1024,
        }
    }
}

impl SchedulerConfig {
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_secs)
    }

    pub fn day_check_interval(&self) -> Duration {
        Duration::from_secs(self.day_check_interval_secs)
    }
}

/// Signal model artifact
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// JSON parameters file; without one every cycle is skipped
    pub path: Option<PathBuf>,
}
