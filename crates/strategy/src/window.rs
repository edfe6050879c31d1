use std::collections::VecDeque;

use fxpilot_core::{InstrumentId, MarketBar};
use log::debug;

use crate::error::{Error, Result};

/// Bounded, timestamp-ordered window of bars for one instrument.
///
/// A bar with the same timestamp as the last one replaces it (the feed
/// re-emits the in-progress bar); an older bar is refused. A reported gap
/// empties the window so features are not computed across it.
#[derive(Debug, Clone)]
pub struct BarWindow {
    instrument: InstrumentId,
    capacity: usize,
    bars: VecDeque<MarketBar>,
}

impl BarWindow {
    pub fn new(instrument: impl Into<InstrumentId>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            instrument: instrument.into(),
            capacity,
            bars: VecDeque::with_capacity(capacity),
        }
    }

    pub fn instrument(&self) -> &InstrumentId {
        &self.instrument
    }

    pub fn push(&mut self, bar: MarketBar) -> Result<()> {
        if bar.instrument != self.instrument {
            return Err(Error::InstrumentMismatch {
                expected: self.instrument.clone(),
                got: bar.instrument,
            });
        }

        if let Some(last) = self.bars.back_mut() {
            if bar.timestamp == last.timestamp {
                *last = bar;
                return Ok(());
            }
            if bar.timestamp < last.timestamp {
                return Err(Error::OutOfOrderBar {
                    instrument: self.instrument.clone(),
                    last: last.timestamp,
                    got: bar.timestamp,
                });
            }
        }

        if self.bars.len() == self.capacity {
            self.bars.pop_front();
        }
        self.bars.push_back(bar);
        Ok(())
    }

    /// Discards history after a feed gap
    pub fn mark_gap(&mut self) {
        debug!(
            "[FEATURES] gap on {}, dropping {} bars",
            self.instrument,
            self.bars.len()
        );
        self.bars.clear();
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn last(&self) -> Option<&MarketBar> {
        self.bars.back()
    }

    /// Copy of the window, oldest first
    pub fn snapshot(&self) -> Vec<MarketBar> {
        self.bars.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn bar(minute: i64, close: rust_decimal::Decimal) -> MarketBar {
        let at = Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap() + Duration::minutes(minute);
        MarketBar::new("EURUSD", at, close, close, close, close, dec!(1))
    }

    #[test]
    fn test_window_is_bounded() {
        let mut w = BarWindow::new("EURUSD", 3);
        for i in 0..5 {
            w.push(bar(i * 5, dec!(1.1))).unwrap();
        }
        assert_eq!(w.len(), 3);
        assert_eq!(w.snapshot()[0].timestamp, bar(10, dec!(1.1)).timestamp);
    }

    #[test]
    fn test_same_timestamp_replaces_last() {
        let mut w = BarWindow::new("EURUSD", 10);
        w.push(bar(0, dec!(1.1))).unwrap();
        w.push(bar(5, dec!(1.2))).unwrap();
        w.push(bar(5, dec!(1.3))).unwrap();
        assert_eq!(w.len(), 2);
        assert_eq!(w.last().unwrap().close, dec!(1.3));
    }

    #[test]
    fn test_older_bar_rejected() {
        let mut w = BarWindow::new("EURUSD", 10);
        w.push(bar(5, dec!(1.1))).unwrap();
        let err = w.push(bar(0, dec!(1.1))).unwrap_err();
        assert!(matches!(err, Error::OutOfOrderBar { .. }));
        assert_eq!(w.len(), 1);
    }

    #[test]
    fn test_gap_clears_window() {
        let mut w = BarWindow::new("EURUSD", 10);
        w.push(bar(0, dec!(1.1))).unwrap();
        w.mark_gap();
        assert!(w.is_empty());
        // Older timestamps are accepted again after a gap
        w.push(bar(0, dec!(1.1))).unwrap();
        assert_eq!(w.len(), 1);
    }

    #[test]
    fn test_wrong_instrument_rejected() {
        let mut w = BarWindow::new("GBPUSD", 10);
        assert!(matches!(
            w.push(bar(0, dec!(1.1))),
            Err(Error::InstrumentMismatch { .. })
        ));
    }
}
