//! Advisory refresh path against scripted sources.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use fxpilot_advisory::{
    AdvisoryBudget, AdvisoryCache, AdvisoryConfig, AdvisoryRefresher, Error, MarketSummaryProvider,
    RefreshTrigger, RegimeFilter, RegimeLookup, RegimeThresholds, spawn_refresh_timer,
};
use fxpilot_clock::{ManualClock, TradingCalendar};
use fxpilot_core::{InstrumentId, RegimeLabel};
use fxpilot_ports::{
    AdvisoryError, AdvisoryRequest, AdvisoryResponse, AdvisorySource, Clock, InstrumentSummary,
    NotificationEvent, NotificationSink, RegimeAdvice,
};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

struct Summaries(Vec<InstrumentId>);

impl MarketSummaryProvider for Summaries {
    fn instruments(&self) -> Vec<InstrumentId> {
        self.0.clone()
    }

    fn summarize(&self, instruments: &[InstrumentId], _lookback: usize) -> Vec<InstrumentSummary> {
        instruments
            .iter()
            .map(|i| InstrumentSummary {
                instrument: i.clone(),
                pct_change: 0.4,
                indicators: vec![("rsi_14".into(), 61.0)],
            })
            .collect()
    }
}

#[derive(Clone, Copy)]
enum Behaviour {
    Label(RegimeLabel),
    Hang,
    Fail,
}

struct ScriptedSource {
    behaviour: Mutex<Behaviour>,
    calls: AtomicU32,
}

impl ScriptedSource {
    fn new(behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            behaviour: Mutex::new(behaviour),
            calls: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl AdvisorySource for ScriptedSource {
    async fn classify(&self, request: &AdvisoryRequest) -> Result<AdvisoryResponse, AdvisoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let behaviour = *self.behaviour.lock();
        let label = match behaviour {
            Behaviour::Label(label) => label,
            Behaviour::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                RegimeLabel::Unknown
            }
            Behaviour::Fail => return Err(AdvisoryError::Unavailable("503".into())),
        };
        Ok(AdvisoryResponse {
            regimes: request
                .instruments
                .iter()
                .map(|s| RegimeAdvice {
                    instrument: s.instrument.clone(),
                    label,
                    threshold_override: None,
                })
                .collect(),
            valid_until: None,
        })
    }
}

#[derive(Default)]
struct Recorder(Mutex<Vec<NotificationEvent>>);

impl NotificationSink for Recorder {
    fn notify(&self, event: NotificationEvent) {
        self.0.lock().push(event);
    }
}

struct Fixture {
    refresher: Arc<AdvisoryRefresher>,
    cache: Arc<AdvisoryCache>,
    clock: Arc<ManualClock>,
    notes: Arc<Recorder>,
}

fn fixture(source: Arc<ScriptedSource>, cap: u32) -> Fixture {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 4, 7, 0, 0).unwrap());
    let config = AdvisoryConfig {
        daily_cap: cap,
        request_timeout_ms: 5_000,
        ..Default::default()
    };
    let cache = Arc::new(AdvisoryCache::new(RegimeThresholds::default(), config.cache_ttl()));
    let budget = Arc::new(AdvisoryBudget::new(cap, TradingCalendar::default()));
    let notes = Arc::new(Recorder::default());
    let refresher = Arc::new(AdvisoryRefresher::new(
        source,
        Arc::new(Summaries(vec!["EURUSD".into(), "GBPUSD".into()])),
        cache.clone(),
        budget,
        clock.clone(),
        notes.clone(),
        config,
    ));
    Fixture {
        refresher,
        cache,
        clock,
        notes,
    }
}

#[tokio::test]
async fn test_scheduled_refresh_updates_all_instruments() {
    init_logger();
    let f = fixture(ScriptedSource::new(Behaviour::Label(RegimeLabel::Trending)), 10);
    let written = f.refresher.refresh(&RefreshTrigger::Scheduled).await.unwrap();
    assert_eq!(written, 2);
    assert!(matches!(
        f.cache.lookup(&"GBPUSD".into(), f.clock.now()),
        RegimeLookup::Fresh(_)
    ));
}

#[tokio::test]
async fn test_news_refresh_only_touches_named_instrument() {
    init_logger();
    let f = fixture(ScriptedSource::new(Behaviour::Label(RegimeLabel::Ranging)), 10);
    let trigger = RefreshTrigger::News {
        instruments: vec!["EURUSD".into()],
    };
    assert_eq!(f.refresher.refresh(&trigger).await.unwrap(), 1);
    assert_eq!(f.cache.lookup(&"GBPUSD".into(), f.clock.now()), RegimeLookup::Absent);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_leaves_cache_stale_and_filter_degrades() {
    init_logger();
    let source = ScriptedSource::new(Behaviour::Label(RegimeLabel::Trending));
    let f = fixture(source.clone(), 10);
    f.refresher.refresh(&RefreshTrigger::Scheduled).await.unwrap();

    *source.behaviour.lock() = Behaviour::Hang;
    f.clock.advance(chrono::Duration::hours(24));
    let err = f.refresher.refresh(&RefreshTrigger::Scheduled).await.unwrap_err();
    assert_eq!(err, Error::Timeout(Duration::from_millis(5_000)));

    let filter = RegimeFilter::new(f.cache.clone(), RegimeThresholds::default(), f.clock.clone());
    let (label, threshold) = filter.effective(&"EURUSD".into(), f.clock.now());
    assert_eq!(label, RegimeLabel::Unknown);
    assert_eq!(threshold, 0.80);
}

#[tokio::test]
async fn test_source_failure_is_contained() {
    init_logger();
    let f = fixture(ScriptedSource::new(Behaviour::Fail), 10);
    let err = f.refresher.refresh(&RefreshTrigger::Scheduled).await.unwrap_err();
    assert!(matches!(err, Error::Source(_)));
    assert!(f.cache.is_empty());
}

#[tokio::test]
async fn test_budget_exhaustion_alerts_once() {
    init_logger();
    let source = ScriptedSource::new(Behaviour::Label(RegimeLabel::Trending));
    let f = fixture(source.clone(), 2);
    for _ in 0..2 {
        f.refresher.refresh(&RefreshTrigger::Scheduled).await.unwrap();
    }
    for _ in 0..3 {
        assert!(matches!(
            f.refresher.refresh(&RefreshTrigger::Scheduled).await,
            Err(Error::BudgetExhausted { calls: 2, cap: 2 })
        ));
    }
    assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    let alerts = f
        .notes
        .0
        .lock()
        .iter()
        .filter(|e| matches!(e, NotificationEvent::AdvisoryBudgetExhausted { .. }))
        .count();
    assert_eq!(alerts, 1);
}

#[tokio::test(start_paused = true)]
async fn test_timer_and_event_producers_share_one_gate() {
    init_logger();
    let source = ScriptedSource::new(Behaviour::Label(RegimeLabel::Trending));
    let f = fixture(source.clone(), 3);
    let (tx, rx) = mpsc::channel(16);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let loop_handle = tokio::spawn(f.refresher.clone().run(rx, shutdown_rx.clone()));
    let timer = spawn_refresh_timer(tx.clone(), Duration::from_secs(60), shutdown_rx);

    for _ in 0..4 {
        tx.send(RefreshTrigger::News {
            instruments: vec!["EURUSD".into()],
        })
        .await
        .unwrap();
    }
    tokio::time::sleep(Duration::from_secs(150)).await;

    shutdown_tx.send(true).unwrap();
    timer.await.unwrap();
    loop_handle.await.unwrap();

    // 3 timer ticks + 4 news triggers compete for a cap of 3
    assert_eq!(source.calls.load(Ordering::SeqCst), 3);
}
