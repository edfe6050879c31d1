//! End-to-end cycles through the wired pipeline

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use fxpilot_advisory::{DropReason, RefreshTrigger};
use fxpilot_clock::ManualClock;
use fxpilot_core::{Direction, InstrumentId, MarketBar, MarketEvent, RegimeLabel, Timestamp};
use fxpilot_gateway::{ChannelNotifier, NotificationSubscriber, PaperBroker, PaperConfig, StaticAdvisory};
use fxpilot_ports::{
    AdvisoryError, AdvisoryRequest, AdvisoryResponse, AdvisorySource, Clock, NotificationEvent,
};
use fxpilot_risk_manager::{BreakerEvent, RiskRejection};
use fxpilot_runner::{
    Collaborators, CycleError, CycleOutcome, Disposition, PipelineConfig, Runtime, build,
};
use fxpilot_strategy::ModelParams;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const PAIRS: [&str; 4] = ["EURUSD", "GBPUSD", "AUDUSD", "NZDUSD"];
const BARS: i64 = 60;

fn start() -> Timestamp {
    Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap()
}

/// Last bar close for every pair
fn last_close() -> Decimal {
    dec!(1.0800) + Decimal::new(BARS - 1, 4)
}

/// Steady uptrend with a constant 10-pip range, so ATR is 0.0010
fn bar(instrument: &str, i: i64) -> MarketBar {
    let at = start() - Duration::minutes(5 * (BARS - i));
    let close = dec!(1.0800) + Decimal::new(i, 4);
    MarketBar::new(
        instrument,
        at,
        close - dec!(0.0001),
        close + dec!(0.0005),
        close - dec!(0.0005),
        close,
        dec!(1000),
    )
}

/// Ignores its inputs and always answers `direction` with `confidence`
fn fixed_model(direction: Direction, confidence: f64) -> ModelParams {
    let rest = ((1.0 - confidence) / 2.0).ln();
    let win = confidence.ln();
    let biases = match direction {
        Direction::Sell => vec![win, rest, rest],
        Direction::Hold => vec![rest, win, rest],
        Direction::Buy => vec![rest, rest, win],
    };
    ModelParams {
        version: format!("fixed-{direction}-{confidence}"),
        features: vec!["roc_10".into()],
        means: vec![0.0],
        scales: vec![1.0],
        weights: vec![vec![0.0]; 3],
        biases,
    }
}

struct Hanging;

#[async_trait]
impl AdvisorySource for Hanging {
    async fn classify(&self, _request: &AdvisoryRequest) -> Result<AdvisoryResponse, AdvisoryError> {
        std::future::pending().await
    }
}

struct Scenario {
    runtime: Runtime,
    broker: Arc<PaperBroker>,
    clock: Arc<ManualClock>,
    events: NotificationSubscriber,
}

fn scenario_with(advisory: Arc<dyn AdvisorySource>) -> Scenario {
    init_logger();
    let clock = ManualClock::new(start());
    let broker = Arc::new(PaperBroker::new(PaperConfig::default(), clock.clone()));
    let (notifier, events) = ChannelNotifier::pair(256);

    let config = PipelineConfig {
        instruments: PAIRS.iter().map(|p| InstrumentId::from(*p)).collect(),
        ..PipelineConfig::default()
    };
    let runtime = build(
        config,
        Collaborators {
            clock: clock.clone(),
            broker: broker.clone(),
            advisory,
            notifier: Arc::new(notifier),
        },
    )
    .unwrap();

    for pair in PAIRS {
        for i in 0..BARS {
            runtime.market.apply_bar(bar(pair, i)).unwrap();
        }
        broker.set_price(pair, last_close());
    }

    Scenario {
        runtime,
        broker,
        clock,
        events,
    }
}

async fn scenario(regime: RegimeLabel, direction: Direction, confidence: f64) -> Scenario {
    let s = scenario_with(Arc::new(StaticAdvisory::new(regime)));
    s.runtime
        .model
        .load(fixed_model(direction, confidence))
        .unwrap();
    s.runtime
        .refresher
        .refresh(&RefreshTrigger::Scheduled)
        .await
        .unwrap();
    s
}

async fn open(s: &Scenario, pair: &str) {
    let outcome = s.runtime.pipeline.run_cycle(&pair.into()).await.unwrap();
    assert!(matches!(outcome, CycleOutcome::Executed(_)), "{pair}: {outcome:?}");
}

#[tokio::test]
async fn test_trending_signal_opens_sized_position() {
    let mut s = scenario(RegimeLabel::Trending, Direction::Buy, 0.72).await;

    let outcome = s.runtime.pipeline.run_cycle(&"EURUSD".into()).await.unwrap();
    let order = match outcome {
        CycleOutcome::Executed(order) => order,
        other => panic!("expected an order, got {other:?}"),
    };
    assert_eq!(order.size, dec!(66000));
    assert_eq!(order.stop_loss, dec!(1.08440));
    assert_eq!(order.take_profit, dec!(1.08890));
    assert_eq!(order.fill_price, Some(last_close()));

    let position = s.runtime.ledger.get(&"EURUSD".into()).unwrap();
    assert_eq!(position.size, dec!(66000));
    assert_eq!(s.broker.fill_count(), 1);

    let events = s.events.drain();
    assert!(events.iter().any(|e| matches!(
        e,
        NotificationEvent::SignalApproved { threshold, .. } if *threshold == 0.65
    )));
    assert!(events.iter().any(|e| matches!(e, NotificationEvent::OrderFilled { .. })));

    let record = s.runtime.decisions.last().unwrap();
    assert_eq!(record.regime, Some(RegimeLabel::Trending));
    assert!(matches!(record.disposition, Disposition::Executed { .. }));
}

#[tokio::test]
async fn test_ranging_regime_drops_same_signal() {
    let s = scenario(RegimeLabel::Ranging, Direction::Buy, 0.72).await;

    let outcome = s.runtime.pipeline.run_cycle(&"EURUSD".into()).await.unwrap();
    match outcome {
        CycleOutcome::Dropped {
            regime,
            threshold,
            reason,
            ..
        } => {
            assert_eq!(regime, RegimeLabel::Ranging);
            assert_eq!(threshold, 0.75);
            assert_eq!(reason, DropReason::BelowThreshold);
        }
        other => panic!("expected a drop, got {other:?}"),
    }
    assert_eq!(s.broker.submission_count(), 0);
    assert_eq!(s.runtime.risk.snapshot().pending_orders, 0);
    assert!(matches!(
        s.runtime.decisions.last().unwrap().disposition,
        Disposition::Dropped { .. }
    ));
}

#[tokio::test]
async fn test_hold_is_never_traded() {
    let s = scenario(RegimeLabel::Trending, Direction::Hold, 0.95).await;
    let outcome = s.runtime.pipeline.run_cycle(&"EURUSD".into()).await.unwrap();
    assert!(matches!(
        outcome,
        CycleOutcome::Dropped {
            reason: DropReason::Hold,
            ..
        }
    ));
}

#[tokio::test]
async fn test_fourth_position_is_refused() {
    let s = scenario(RegimeLabel::Trending, Direction::Buy, 0.72).await;
    for pair in &PAIRS[..3] {
        open(&s, pair).await;
    }

    let err = s.runtime.pipeline.run_cycle(&"NZDUSD".into()).await.unwrap_err();
    assert!(matches!(
        err,
        CycleError::Risk(RiskRejection::PositionLimitExceeded { open: 3, max: 3 })
    ));
    assert!(err.is_expected());
    assert_eq!(s.runtime.ledger.open_count(), 3);
}

#[tokio::test]
async fn test_second_signal_on_open_instrument_is_duplicate() {
    let s = scenario(RegimeLabel::Trending, Direction::Buy, 0.72).await;
    open(&s, "EURUSD").await;
    let err = s.runtime.pipeline.run_cycle(&"EURUSD".into()).await.unwrap_err();
    assert!(matches!(err, CycleError::Risk(RiskRejection::DuplicateExposure(_))));
}

#[tokio::test]
async fn test_daily_loss_trips_breaker_until_reset() {
    let mut s = scenario(RegimeLabel::Trending, Direction::Buy, 0.72).await;
    for pair in &PAIRS[..3] {
        open(&s, pair).await;
    }

    // Gap through the stop: 50 pips on 66k is a 330 loss, over 3% of 10k
    let at = s.clock.now() + Duration::minutes(5);
    let closed = s
        .runtime
        .pipeline
        .ingest(MarketEvent::Tick {
            instrument: "EURUSD".into(),
            price: last_close() - dec!(0.0050),
            at,
        })
        .await
        .unwrap()
        .expect("stop-loss should close the position");
    assert_eq!(closed.realized_pnl, dec!(-330));

    let risk = s.runtime.risk.snapshot();
    assert!(risk.breaker_tripped());
    assert_eq!(risk.daily_loss, dec!(330));
    assert!(s.events.drain().iter().any(|e| matches!(
        e,
        NotificationEvent::CircuitBreakerTripped { .. }
    )));

    let err = s.runtime.pipeline.run_cycle(&"EURUSD".into()).await.unwrap_err();
    assert!(matches!(
        err,
        CycleError::Risk(RiskRejection::CircuitBreakerTripped { .. })
    ));

    // Same day: the day check is a no-op
    assert!(!s.runtime.scheduler.check_day_boundary());
    assert!(s.runtime.risk.is_halted());

    s.clock.advance(Duration::hours(15));
    assert!(s.runtime.scheduler.check_day_boundary());
    assert!(!s.runtime.risk.is_halted());
    let log = s.runtime.risk.snapshot().breaker_log;
    assert!(matches!(log.last(), Some(BreakerEvent::Reset { .. })));

    // Trading resumes; the surviving positions still count towards the limit
    open(&s, "EURUSD").await;
    assert_eq!(s.runtime.ledger.open_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_advisory_timeout_falls_back_to_unknown() {
    let s = scenario_with(Arc::new(Hanging));
    s.runtime.model.load(fixed_model(Direction::Buy, 0.78)).unwrap();

    let err = s
        .runtime
        .refresher
        .refresh(&RefreshTrigger::Scheduled)
        .await
        .unwrap_err();
    assert!(matches!(err, fxpilot_advisory::Error::Timeout(_)));
    assert!(s.runtime.cache.is_empty());

    let outcome = s.runtime.pipeline.run_cycle(&"EURUSD".into()).await.unwrap();
    match outcome {
        CycleOutcome::Dropped { regime, threshold, .. } => {
            assert_eq!(regime, RegimeLabel::Unknown);
            assert_eq!(threshold, 0.80);
        }
        other => panic!("expected a drop, got {other:?}"),
    }

    // Strong enough for the strictest threshold
    s.runtime.model.load(fixed_model(Direction::Buy, 0.85)).unwrap();
    open(&s, "EURUSD").await;
}

#[tokio::test]
async fn test_missing_model_skips_cycle() {
    let s = scenario_with(Arc::new(StaticAdvisory::new(RegimeLabel::Trending)));
    let err = s.runtime.pipeline.run_cycle(&"EURUSD".into()).await.unwrap_err();
    assert!(matches!(
        err,
        CycleError::Strategy(fxpilot_strategy::Error::ModelUnavailable)
    ));
    assert!(err.is_expected());
    let record = s.runtime.decisions.last().unwrap();
    assert!(matches!(record.disposition, Disposition::Skipped { .. }));
    assert_eq!(record.direction, Some(Direction::Hold));
    assert_eq!(s.broker.submission_count(), 0);
}

#[tokio::test]
async fn test_gap_forces_insufficient_history() {
    let s = scenario(RegimeLabel::Trending, Direction::Buy, 0.72).await;
    s.runtime
        .pipeline
        .ingest(MarketEvent::Gap {
            instrument: "EURUSD".into(),
            from: start() - Duration::hours(1),
            to: start(),
        })
        .await
        .unwrap();

    let err = s.runtime.pipeline.run_cycle(&"EURUSD".into()).await.unwrap_err();
    assert!(matches!(
        err,
        CycleError::Strategy(fxpilot_strategy::Error::InsufficientHistory { .. })
    ));
    // Other instruments are unaffected
    open(&s, "GBPUSD").await;
}

#[tokio::test]
async fn test_unknown_instrument_is_reported() {
    let s = scenario(RegimeLabel::Trending, Direction::Buy, 0.72).await;
    let err = s.runtime.pipeline.run_cycle(&"XAUUSD".into()).await.unwrap_err();
    assert!(matches!(err, CycleError::UnknownInstrument(_)));
    assert!(!err.is_expected());
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_trigger_is_skipped() {
    let s = scenario(RegimeLabel::Trending, Direction::Buy, 0.72).await;
    let scheduler = Arc::clone(&s.runtime.scheduler);

    let first = scheduler.trigger(&"EURUSD".into()).expect("first trigger runs");
    assert!(scheduler.is_running(&"EURUSD".into()));
    assert!(scheduler.trigger(&"EURUSD".into()).is_none());
    // A different instrument is independent
    let other = scheduler.trigger(&"GBPUSD".into()).expect("other instrument runs");

    assert!(matches!(first.await.unwrap(), Ok(CycleOutcome::Executed(_))));
    assert!(matches!(other.await.unwrap(), Ok(CycleOutcome::Executed(_))));
    assert!(!scheduler.is_running(&"EURUSD".into()));

    let stats = scheduler.stats();
    assert_eq!(stats.started, 2);
    assert_eq!(stats.overlapped, 1);
    assert_eq!(stats.executed, 2);
}

#[tokio::test(start_paused = true)]
async fn test_started_runtime_trades_and_shuts_down() {
    let s = scenario(RegimeLabel::Trending, Direction::Buy, 0.72).await;
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let tasks = s.runtime.start(shutdown_rx);

    // First ticks fire immediately
    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
    assert!(s.runtime.scheduler.wait_idle(std::time::Duration::from_secs(5)).await);
    assert_eq!(s.runtime.ledger.open_count(), 3);
    assert_eq!(s.runtime.decisions.len(), 4);

    shutdown_tx.send(true).unwrap();
    for task in tasks {
        task.await.unwrap();
    }
    let stats = s.runtime.scheduler.stats();
    assert_eq!(stats.executed, 3);
    assert_eq!(stats.refused, 1);
}
