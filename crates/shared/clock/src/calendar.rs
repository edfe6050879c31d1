use chrono::{Duration, NaiveDate, Timelike};
use fxpilot_core::Timestamp;
use serde::{Deserialize, Serialize};

/// Trading-day boundaries.
///
/// A trading day starts at `rollover_hour_utc` and runs for 24 hours; it is
/// labelled by the UTC date on which it starts. With the default rollover of
/// 00:00 UTC the trading day is the UTC calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingCalendar {
    pub rollover_hour_utc: u32,
}

impl Default for TradingCalendar {
    fn default() -> Self {
        Self { rollover_hour_utc: 0 }
    }
}

impl TradingCalendar {
    /// Hours above 23 are wrapped
    pub fn new(rollover_hour_utc: u32) -> Self {
        Self {
            rollover_hour_utc: rollover_hour_utc % 24,
        }
    }

    /// Trading day that `ts` belongs to
    pub fn trading_day(&self, ts: Timestamp) -> NaiveDate {
        let hour = self.rollover_hour_utc % 24;
        if ts.hour() >= hour {
            ts.date_naive()
        } else {
            (ts - Duration::days(1)).date_naive()
        }
    }

    /// True when `a` and `b` fall on the same trading day
    pub fn same_day(&self, a: Timestamp, b: Timestamp) -> bool {
        self.trading_day(a) == self.trading_day(b)
    }

    /// Start instant of the trading day after the one containing `ts`
    pub fn next_rollover(&self, ts: Timestamp) -> Timestamp {
        let day = self.trading_day(ts);
        let start = day
            .and_hms_opt(self.rollover_hour_utc % 24, 0, 0)
            .map(|naive| naive.and_utc())
            .unwrap_or(ts);
        start + Duration::days(1)
    }
}
