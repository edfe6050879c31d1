//! Decision audit trail
//!
//! Append-only. Every evaluation cycle leaves exactly one record, whatever
//! its outcome, so a day can be replayed and explained afterwards.

use std::io::Write;

use fxpilot_core::{Direction, IdempotencyKey, InstrumentId, OrderState, RegimeLabel, Timestamp};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "disposition", rename_all = "snake_case")]
pub enum Disposition {
    /// No signal was produced (short history, no model)
    Skipped { reason: String },
    /// Filtered out by the regime gate
    Dropped { reason: String },
    /// Refused by the risk manager
    Rejected { reason: String },
    /// Approved but the order did not open
    Failed { reason: String },
    Executed { key: IdempotencyKey, state: OrderState },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub at: Timestamp,
    pub instrument: InstrumentId,
    pub direction: Option<Direction>,
    pub confidence: Option<f64>,
    pub regime: Option<RegimeLabel>,
    pub threshold: Option<f64>,
    #[serde(flatten)]
    pub disposition: Disposition,
}

impl DecisionRecord {
    pub fn skipped(at: Timestamp, instrument: InstrumentId, reason: impl Into<String>) -> Self {
        Self {
            at,
            instrument,
            direction: None,
            confidence: None,
            regime: None,
            threshold: None,
            disposition: Disposition::Skipped { reason: reason.into() },
        }
    }
}

#[derive(Debug, Default)]
pub struct DecisionLog {
    records: RwLock<Vec<DecisionRecord>>,
}

impl DecisionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, record: DecisionRecord) {
        self.records.write().push(record);
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn records(&self) -> Vec<DecisionRecord> {
        self.records.read().clone()
    }

    pub fn for_instrument(&self, instrument: &InstrumentId) -> Vec<DecisionRecord> {
        self.records
            .read()
            .iter()
            .filter(|r| &r.instrument == instrument)
            .cloned()
            .collect()
    }

    pub fn last(&self) -> Option<DecisionRecord> {
        self.records.read().last().cloned()
    }

    /// Writes the trail as newline-delimited JSON
    pub fn write_json_lines<W: Write>(&self, mut out: W) -> std::io::Result<usize> {
        let records = self.records();
        for record in &records {
            serde_json::to_writer(&mut out, record)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
        Ok(records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn at() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_records_are_appended_in_order() {
        let log = DecisionLog::new();
        log.record(DecisionRecord::skipped(at(), "EURUSD".into(), "insufficient history"));
        log.record(DecisionRecord {
            at: at(),
            instrument: "GBPUSD".into(),
            direction: Some(Direction::Buy),
            confidence: Some(0.70),
            regime: Some(RegimeLabel::Ranging),
            threshold: Some(0.75),
            disposition: Disposition::Dropped {
                reason: "below threshold".into(),
            },
        });

        assert_eq!(log.len(), 2);
        assert_eq!(log.for_instrument(&"GBPUSD".into()).len(), 1);
        assert!(matches!(log.last().unwrap().disposition, Disposition::Dropped { .. }));
    }

    #[test]
    fn test_json_lines_export() {
        let log = DecisionLog::new();
        log.record(DecisionRecord::skipped(at(), "EURUSD".into(), "no model"));
        let mut buf = Vec::new();
        assert_eq!(log.write_json_lines(&mut buf).unwrap(), 1);

        let line = String::from_utf8(buf).unwrap();
        let value: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(value["disposition"], "skipped");
        assert_eq!(value["reason"], "no model");
        assert_eq!(value["instrument"], "EURUSD");
    }
}
