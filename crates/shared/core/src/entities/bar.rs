use serde::{Deserialize, Serialize};

use crate::values::{InstrumentId, Price, Quantity, Timestamp};

/// One OHLCV aggregation for a fixed interval. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketBar {
    pub instrument: InstrumentId,
    pub timestamp: Timestamp,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub volume: Quantity,
}

impl MarketBar {
    pub fn new(
        instrument: impl Into<InstrumentId>,
        timestamp: Timestamp,
        open: Price,
        high: Price,
        low: Price,
        close: Price,
        volume: Quantity,
    ) -> Self {
        Self {
            instrument: instrument.into(),
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// High minus low
    pub fn range(&self) -> Price {
        self.high - self.low
    }
}

/// Input from the market-data collaborator.
///
/// Gaps are explicit: the feed reports them instead of interpolating, so
/// the feature stage refuses to compute on a stale window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MarketEvent {
    Bar(MarketBar),
    Gap {
        instrument: InstrumentId,
        from: Timestamp,
        to: Timestamp,
    },
    Tick {
        instrument: InstrumentId,
        price: Price,
        at: Timestamp,
    },
}

impl MarketEvent {
    pub fn instrument(&self) -> &InstrumentId {
        match self {
            MarketEvent::Bar(bar) => &bar.instrument,
            MarketEvent::Gap { instrument, .. } => instrument,
            MarketEvent::Tick { instrument, .. } => instrument,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    #[test]
    fn test_market_event_json_shape() {
        let json = r#"{"type":"tick","instrument":"EURUSD","price":"1.0850","at":"2024-03-04T10:00:00Z"}"#;
        let event: MarketEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.instrument().as_str(), "EURUSD");
        match event {
            MarketEvent::Tick { price, .. } => assert_eq!(price, dec!(1.0850)),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_bar_range() {
        let at = Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap();
        let bar = MarketBar::new("EURUSD", at, dec!(1.08), dec!(1.09), dec!(1.07), dec!(1.085), dec!(100));
        assert_eq!(bar.range(), dec!(0.02));
    }
}
