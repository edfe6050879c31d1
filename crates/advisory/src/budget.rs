use chrono::NaiveDate;
use fxpilot_clock::TradingCalendar;
use fxpilot_core::Timestamp;
use log::{debug, info};
use parking_lot::Mutex;

#[derive(Debug)]
struct BudgetWindow {
    day: Option<NaiveDate>,
    window_start: Option<Timestamp>,
    calls: u32,
    alerted: bool,
}

/// Hard per-trading-day ceiling on external advisory calls.
///
/// The counter resets lazily on the first call of a new trading day.
#[derive(Debug)]
pub struct AdvisoryBudget {
    cap: u32,
    calendar: TradingCalendar,
    window: Mutex<BudgetWindow>,
}

impl AdvisoryBudget {
    pub fn new(cap: u32, calendar: TradingCalendar) -> Self {
        Self {
            cap,
            calendar,
            window: Mutex::new(BudgetWindow {
                day: None,
                window_start: None,
                calls: 0,
                alerted: false,
            }),
        }
    }

    pub fn cap(&self) -> u32 {
        self.cap
    }

    fn roll(&self, window: &mut BudgetWindow, now: Timestamp) {
        let day = self.calendar.trading_day(now);
        if window.day != Some(day) {
            if window.day.is_some() {
                info!(
                    "[ADVISORY] budget window reset for {day} (used {}/{})",
                    window.calls, self.cap
                );
            }
            window.day = Some(day);
            window.window_start = Some(now);
            window.calls = 0;
            window.alerted = false;
        }
    }

    /// Takes one call from today's budget. Returns false once the cap is hit.
    pub fn try_consume(&self, now: Timestamp) -> bool {
        let mut window = self.window.lock();
        self.roll(&mut window, now);
        if window.calls >= self.cap {
            debug!("[ADVISORY] budget refused ({}/{})", window.calls, self.cap);
            return false;
        }
        window.calls += 1;
        debug!("[ADVISORY] budget granted ({}/{})", window.calls, self.cap);
        true
    }

    /// True exactly once per window after the budget has been exhausted,
    /// so the operator alert is not repeated on every refused call.
    pub fn claim_exhaustion_alert(&self, now: Timestamp) -> bool {
        let mut window = self.window.lock();
        self.roll(&mut window, now);
        if window.calls < self.cap || window.alerted {
            return false;
        }
        window.alerted = true;
        true
    }

    pub fn calls_today(&self, now: Timestamp) -> u32 {
        let mut window = self.window.lock();
        self.roll(&mut window, now);
        window.calls
    }

    pub fn remaining(&self, now: Timestamp) -> u32 {
        self.cap.saturating_sub(self.calls_today(now))
    }

    /// When the current window started (first use of the trading day)
    pub fn window_start(&self) -> Option<Timestamp> {
        self.window.lock().window_start
    }
}
