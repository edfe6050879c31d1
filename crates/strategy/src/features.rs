use std::sync::Arc;

use chrono::{Datelike, Timelike};
use fxpilot_core::{FeatureVector, MarketBar};
use log::{debug, trace};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::indicators::{self, ratio};

/// Indicator periods. Feature names embed the periods, so two engines with
/// different configs never produce vectors that look interchangeable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub sma_period: usize,
    pub ema_period: usize,
    /// Bars over which the SMA slope is measured
    pub slope_lag: usize,
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub roc_periods: Vec<usize>,
    pub bb_period: usize,
    pub bb_std: f64,
    pub atr_period: usize,
    pub volume_sma_period: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            sma_period: 20,
            ema_period: 21,
            slope_lag: 5,
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            roc_periods: vec![1, 5, 10],
            bb_period: 20,
            bb_std: 2.0,
            atr_period: 14,
            volume_sma_period: 20,
        }
    }
}

impl FeatureConfig {
    /// Shortest window every configured indicator can be computed from
    pub fn min_history(&self) -> usize {
        let roc = self.roc_periods.iter().map(|p| p + 1).max().unwrap_or(1);
        [
            self.sma_period + self.slope_lag,
            self.ema_period,
            self.rsi_period + 1,
            self.macd_slow + self.macd_signal - 1,
            roc,
            self.bb_period,
            self.atr_period,
            self.volume_sma_period,
        ]
        .into_iter()
        .max()
        .unwrap_or(1)
        .max(1)
    }

    /// Name of the ATR feature, used by risk sizing
    pub fn atr_feature(&self) -> String {
        format!("atr_{}", self.atr_period)
    }

    fn feature_names(&self) -> Vec<String> {
        let mut names = vec![
            format!("price_vs_sma{}", self.sma_period),
            format!("price_vs_ema{}", self.ema_period),
            format!("sma{}_slope", self.sma_period),
            format!("rsi_{}", self.rsi_period),
            "macd".to_string(),
            "macd_signal".to_string(),
            "macd_hist".to_string(),
        ];
        names.extend(self.roc_periods.iter().map(|p| format!("roc_{p}")));
        names.extend(
            [
                "bb_width".to_string(),
                "bb_percent".to_string(),
                self.atr_feature(),
                "volatility_ratio".to_string(),
                "volume_vs_sma".to_string(),
                "candle_body".to_string(),
                "body_to_range_ratio".to_string(),
                "wick_balance".to_string(),
                "hour".to_string(),
                "day_of_week".to_string(),
                "forex_session".to_string(),
            ]
            .into_iter(),
        );
        names
    }
}

/// Deterministic bars-to-features transform.
///
/// Identical windows always yield identical vectors; nothing here reads the
/// clock or any state besides the config.
#[derive(Debug, Clone)]
pub struct FeatureEngine {
    config: FeatureConfig,
    names: Arc<[String]>,
}

impl FeatureEngine {
    pub fn new(config: FeatureConfig) -> Self {
        let names: Arc<[String]> = config.feature_names().into();
        Self { config, names }
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn min_history(&self) -> usize {
        self.config.min_history()
    }

    /// Computes features for the last bar of `bars` (oldest first).
    pub fn compute(&self, bars: &[MarketBar]) -> Result<FeatureVector> {
        let need = self.min_history();
        let Some(last) = bars.last() else {
            return Err(Error::InsufficientHistory {
                instrument: "<empty>".into(),
                have: 0,
                need,
            });
        };
        if bars.len() < need {
            debug!(
                "[FEATURES] {} insufficient history have={} need={}",
                last.instrument,
                bars.len(),
                need
            );
            return Err(Error::InsufficientHistory {
                instrument: last.instrument.clone(),
                have: bars.len(),
                need,
            });
        }
        if let Some(other) = bars.iter().find(|b| b.instrument != last.instrument) {
            return Err(Error::InstrumentMismatch {
                expected: last.instrument.clone(),
                got: other.instrument.clone(),
            });
        }

        let to_f = |d: rust_decimal::Decimal| d.to_f64().unwrap_or(0.0);
        let open: Vec<f64> = bars.iter().map(|b| to_f(b.open)).collect();
        let high: Vec<f64> = bars.iter().map(|b| to_f(b.high)).collect();
        let low: Vec<f64> = bars.iter().map(|b| to_f(b.low)).collect();
        let close: Vec<f64> = bars.iter().map(|b| to_f(b.close)).collect();
        let volume: Vec<f64> = bars.iter().map(|b| to_f(b.volume)).collect();

        let c = &self.config;
        let price = *close.last().unwrap_or(&0.0);
        let insufficient = || Error::InsufficientHistory {
            instrument: last.instrument.clone(),
            have: bars.len(),
            need,
        };

        let sma = indicators::sma(&close, c.sma_period).ok_or_else(insufficient)?;
        let ema = indicators::ema(&close, c.ema_period).ok_or_else(insufficient)?;
        let slope = indicators::sma_slope(&close, c.sma_period, c.slope_lag).ok_or_else(insufficient)?;
        let rsi = indicators::rsi(&close, c.rsi_period).ok_or_else(insufficient)?;
        let macd = indicators::macd(&close, c.macd_fast, c.macd_slow, c.macd_signal)
            .ok_or_else(insufficient)?;
        let bb = indicators::bollinger(&close, c.bb_period, c.bb_std).ok_or_else(insufficient)?;
        let atr = indicators::atr(&high, &low, &close, c.atr_period).ok_or_else(insufficient)?;
        let vol_sma = indicators::sma(&volume, c.volume_sma_period).ok_or_else(insufficient)?;

        let mut values = Vec::with_capacity(self.names.len());
        values.push(ratio(price - sma, sma) * 100.0);
        values.push(ratio(price - ema, ema) * 100.0);
        values.push(slope);
        values.push(rsi);
        values.push(macd.line);
        values.push(macd.signal);
        values.push(macd.histogram);
        for &period in &c.roc_periods {
            values.push(indicators::roc(&close, period).ok_or_else(insufficient)?);
        }
        values.push(bb.width_pct());
        values.push(bb.percent_b(price));
        values.push(atr);
        values.push(ratio(atr, price) * 100.0);
        values.push(ratio(*volume.last().unwrap_or(&0.0), vol_sma) * 100.0);

        // Price action on the last bar
        let o = *open.last().unwrap_or(&price);
        let h = *high.last().unwrap_or(&price);
        let l = *low.last().unwrap_or(&price);
        let body = price - o;
        let upper_wick = h - o.max(price);
        let lower_wick = o.min(price) - l;
        values.push(body);
        values.push(ratio(body.abs(), h - l));
        values.push(ratio(upper_wick - lower_wick, upper_wick + lower_wick));

        let ts = last.timestamp;
        values.push(ts.hour() as f64);
        values.push(ts.weekday().num_days_from_monday() as f64);
        values.push(indicators::forex_session(ts.hour()) as f64);

        for (name, v) in self.names.iter().zip(values.iter_mut()) {
            if !v.is_finite() {
                debug!("[FEATURES] {} non-finite {name}, using 0", last.instrument);
                *v = 0.0;
            }
        }

        trace!("[FEATURES] {} computed {} features at {ts}", last.instrument, values.len());
        Ok(FeatureVector::new(
            last.instrument.clone(),
            ts,
            self.names.clone(),
            values,
            last.close,
        ))
    }
}

impl Default for FeatureEngine {
    fn default() -> Self {
        Self::new(FeatureConfig::default())
    }
}
