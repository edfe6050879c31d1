//! Market store
//!
//! One `BarWindow` per configured instrument, fed by the market-data task and
//! read by evaluation cycles and advisory summaries. Each window sits behind
//! its own `DashMap` shard lock, held only for a push or a copy.

use dashmap::DashMap;
use fxpilot_advisory::MarketSummaryProvider;
use fxpilot_core::{InstrumentId, MarketBar, Price};
use fxpilot_ports::InstrumentSummary;
use fxpilot_strategy::{BarWindow, FeatureEngine};
use log::{debug, warn};
use rust_decimal::prelude::ToPrimitive;

/// Indicators forwarded to the advisory collaborator, by feature-name prefix
const SUMMARY_INDICATORS: &[&str] = &[
    "price_vs_sma",
    "rsi_",
    "atr_",
    "bb_width",
    "volatility_ratio",
    "macd_hist",
];

pub struct MarketStore {
    windows: DashMap<InstrumentId, BarWindow>,
    engine: FeatureEngine,
}

impl MarketStore {
    pub fn new(instruments: &[InstrumentId], capacity: usize, engine: FeatureEngine) -> Self {
        let windows = DashMap::new();
        for id in instruments {
            windows.insert(id.clone(), BarWindow::new(id.clone(), capacity));
        }
        Self { windows, engine }
    }

    pub fn tracks(&self, instrument: &InstrumentId) -> bool {
        self.windows.contains_key(instrument)
    }

    /// Configured instruments, sorted
    pub fn instruments(&self) -> Vec<InstrumentId> {
        let mut ids: Vec<_> = self.windows.iter().map(|w| w.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Appends a bar. Returns `Ok(false)` for instruments nobody trades.
    pub fn apply_bar(&self, bar: MarketBar) -> fxpilot_strategy::Result<bool> {
        let Some(mut window) = self.windows.get_mut(&bar.instrument) else {
            debug!("[MARKET] ignoring bar for untracked {}", bar.instrument);
            return Ok(false);
        };
        window.push(bar)?;
        Ok(true)
    }

    /// Clears history after a reported feed gap
    pub fn mark_gap(&self, instrument: &InstrumentId) -> bool {
        match self.windows.get_mut(instrument) {
            Some(mut window) => {
                warn!("[MARKET] feed gap on {instrument}, window cleared");
                window.mark_gap();
                true
            }
            None => false,
        }
    }

    /// Copy of the window, oldest first. Empty for untracked instruments.
    pub fn snapshot(&self, instrument: &InstrumentId) -> Vec<MarketBar> {
        self.windows
            .get(instrument)
            .map(|w| w.snapshot())
            .unwrap_or_default()
    }

    pub fn last_close(&self, instrument: &InstrumentId) -> Option<Price> {
        self.windows.get(instrument)?.last().map(|bar| bar.close)
    }

    pub fn len(&self, instrument: &InstrumentId) -> usize {
        self.windows.get(instrument).map(|w| w.len()).unwrap_or(0)
    }

    fn summary(&self, instrument: &InstrumentId, lookback_bars: usize) -> Option<InstrumentSummary> {
        let bars = self.snapshot(instrument);
        if bars.len() < 2 {
            return None;
        }
        let lookback = lookback_bars.clamp(1, bars.len() - 1);
        let first = bars[bars.len() - 1 - lookback].close.to_f64()?;
        let last = bars[bars.len() - 1].close.to_f64()?;
        if first == 0.0 {
            return None;
        }
        let pct_change = (last / first - 1.0) * 100.0;

        // Indicators only once the window is long enough; the change alone
        // still lets the classifier say something.
        let indicators = match self.engine.compute(&bars) {
            Ok(features) => features
                .iter()
                .filter(|(name, _)| SUMMARY_INDICATORS.iter().any(|p| name.starts_with(p)))
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
            Err(_) => Vec::new(),
        };

        Some(InstrumentSummary {
            instrument: instrument.clone(),
            pct_change,
            indicators,
        })
    }
}

impl MarketSummaryProvider for MarketStore {
    fn instruments(&self) -> Vec<InstrumentId> {
        MarketStore::instruments(self)
    }

    fn summarize(&self, instruments: &[InstrumentId], lookback_bars: usize) -> Vec<InstrumentSummary> {
        instruments
            .iter()
            .filter_map(|id| self.summary(id, lookback_bars))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn bar(instrument: &str, i: i64, close: Decimal) -> MarketBar {
        let at = Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap() + Duration::minutes(5 * i);
        MarketBar::new(instrument, at, close, close + dec!(0.0005), close - dec!(0.0005), close, dec!(100))
    }

    fn store() -> MarketStore {
        MarketStore::new(
            &["EURUSD".into(), "GBPUSD".into()],
            200,
            FeatureEngine::default(),
        )
    }

    #[test]
    fn test_untracked_bars_are_ignored() {
        let store = store();
        assert!(!store.apply_bar(bar("USDJPY", 0, dec!(150))).unwrap());
        assert!(store.apply_bar(bar("EURUSD", 0, dec!(1.08))).unwrap());
        assert_eq!(store.len(&"EURUSD".into()), 1);
        assert_eq!(store.instruments(), vec![InstrumentId::from("EURUSD"), InstrumentId::from("GBPUSD")]);
    }

    #[test]
    fn test_gap_clears_window() {
        let store = store();
        for i in 0..5 {
            store.apply_bar(bar("EURUSD", i, dec!(1.08))).unwrap();
        }
        assert!(store.mark_gap(&"EURUSD".into()));
        assert_eq!(store.len(&"EURUSD".into()), 0);
        assert_eq!(store.last_close(&"EURUSD".into()), None);
    }

    #[test]
    fn test_summary_percent_change_and_indicators() {
        let store = store();
        for i in 0..60 {
            let close = dec!(1.0800) + Decimal::new(i, 4);
            store.apply_bar(bar("EURUSD", i, close)).unwrap();
        }
        // Only one bar: no summary
        store.apply_bar(bar("GBPUSD", 0, dec!(1.27))).unwrap();

        let summaries = store.summarize(&["EURUSD".into(), "GBPUSD".into()], 10);
        assert_eq!(summaries.len(), 1);
        let eur = &summaries[0];
        let expected = (1.0859 / 1.0849 - 1.0) * 100.0;
        assert!((eur.pct_change - expected).abs() < 1e-9);
        assert!(eur.indicators.iter().any(|(name, _)| name == "atr_14"));
        assert!(eur.indicators.iter().any(|(name, _)| name == "rsi_14"));
    }

    #[test]
    fn test_short_window_summary_has_no_indicators() {
        let store = store();
        for i in 0..5 {
            store.apply_bar(bar("EURUSD", i, dec!(1.08) + Decimal::new(i, 4))).unwrap();
        }
        let summaries = store.summarize(&["EURUSD".into()], 48);
        assert_eq!(summaries.len(), 1);
        assert!(summaries[0].indicators.is_empty());
    }
}
