use std::time::Duration;

use fxpilot_core::RegimeLabel;
use serde::{Deserialize, Serialize};

/// Confidence thresholds per regime
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeThresholds {
    pub trending: f64,
    pub ranging: f64,
    /// Used for UNKNOWN, absent and expired regimes
    pub unknown: f64,
    /// Lowest threshold an advisory override may set
    pub override_floor: f64,
}

impl Default for RegimeThresholds {
    fn default() -> Self {
        Self {
            trending: 0.65,
            ranging: 0.75,
            unknown: 0.80,
            override_floor: 0.60,
        }
    }
}

impl RegimeThresholds {
    pub fn for_label(&self, label: RegimeLabel) -> f64 {
        match label {
            RegimeLabel::Trending => self.trending,
            RegimeLabel::Ranging => self.ranging,
            RegimeLabel::Unknown => self.unknown,
        }
    }

    /// Clamps an advisory override into `[override_floor, 1.0]`;
    /// non-finite overrides fall back to the label default
    pub fn clamp_override(&self, label: RegimeLabel, value: Option<f64>) -> f64 {
        match value {
            Some(v) if v.is_finite() => v.clamp(self.override_floor, 1.0),
            _ => self.for_label(label),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        for (name, v) in [
            ("trending", self.trending),
            ("ranging", self.ranging),
            ("unknown", self.unknown),
            ("override_floor", self.override_floor),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(format!("regime threshold {name}={v} outside [0, 1]"));
            }
        }
        Ok(())
    }
}

/// Advisory refresh settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisoryConfig {
    /// Hard ceiling on external calls per trading day
    pub daily_cap: u32,
    /// Longest a cached regime may stay valid
    pub cache_ttl_secs: u64,
    /// Scheduled refresh period
    pub refresh_interval_secs: u64,
    pub request_timeout_ms: u64,
    /// Bars summarised per instrument in a request
    pub lookback_bars: usize,
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            daily_cap: 10,
            cache_ttl_secs: 24 * 60 * 60,
            refresh_interval_secs: 24 * 60 * 60,
            request_timeout_ms: 30_000,
            lookback_bars: 48,
        }
    }
}

impl AdvisoryConfig {
    /// Upper bound for the TTL and the refresh period, one year
    pub const MAX_PERIOD_SECS: u64 = 365 * 24 * 60 * 60;

    pub fn validate(&self) -> Result<(), String> {
        if self.daily_cap == 0 {
            return Err("advisory.daily_cap must be at least 1".into());
        }
        if self.refresh_interval_secs == 0 {
            return Err("advisory.refresh_interval_secs must be positive".into());
        }
        if self.refresh_interval_secs > Self::MAX_PERIOD_SECS || self.cache_ttl_secs > Self::MAX_PERIOD_SECS {
            return Err(format!(
                "advisory.refresh_interval_secs and cache_ttl_secs must not exceed {}",
                Self::MAX_PERIOD_SECS
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err("advisory.request_timeout_ms must be positive".into());
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> chrono::Duration {
        let secs = self.cache_ttl_secs.min(Self::MAX_PERIOD_SECS);
        i64::try_from(secs).map_or(chrono::Duration::days(365), chrono::Duration::seconds)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
