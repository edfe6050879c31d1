//! Property and concurrency checks for the risk gate.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use fxpilot_clock::TradingCalendar;
use fxpilot_core::{Direction, FeatureVector, Signal, Timestamp};
use fxpilot_risk_manager::{RiskConfig, RiskManager, RiskRejection};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn now() -> Timestamp {
    Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap()
}

fn signal(instrument: &str) -> Signal {
    let names: Arc<[String]> = vec!["atr_14".to_string()].into();
    let fv = FeatureVector::new(instrument.into(), now(), names, vec![0.0010], dec!(1.08500));
    Signal::new(Direction::Buy, 0.9, Arc::new(fv))
}

fn manager(max_open: usize) -> Arc<RiskManager> {
    let config = RiskConfig {
        max_open_positions: max_open,
        ..Default::default()
    };
    Arc::new(RiskManager::new(config, TradingCalendar::default(), now()))
}

proptest! {
    /// The breaker is set exactly from the first settlement whose cumulative
    /// net loss reaches 3% of day-start equity, and stays set afterwards.
    #[test]
    fn test_breaker_set_exactly_when_loss_first_reaches_limit(
        pnls in proptest::collection::vec(-150i64..120, 1..30)
    ) {
        let rm = manager(1);
        let limit = dec!(300);
        let mut cumulative = Decimal::ZERO;
        let mut expected_tripped = false;

        for (i, pnl) in pnls.iter().enumerate() {
            let instrument = format!("PAIR{i}");
            if !expected_tripped {
                let ticket = rm.evaluate(&signal(&instrument)).expect("slot free before trip");
                ticket.reservation.commit();
            }
            let pnl = Decimal::from(*pnl);
            cumulative += pnl;
            let outcome = rm.settle(&instrument.as_str().into(), pnl, now());

            let should_trip_now = !expected_tripped && -cumulative >= limit;
            prop_assert_eq!(outcome.tripped, should_trip_now);
            expected_tripped |= should_trip_now;
            prop_assert_eq!(rm.is_halted(), expected_tripped);

            if expected_tripped {
                let rejected = matches!(
                    rm.evaluate(&signal("NEXT")),
                    Err(RiskRejection::CircuitBreakerTripped { .. })
                );
                prop_assert!(rejected);
            }
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_signals_never_exceed_limit() {
    let rm = manager(3);
    let mut handles = Vec::new();
    for i in 0..64 {
        let rm = rm.clone();
        handles.push(tokio::spawn(async move {
            // 16 instruments, 4 racing signals each
            let instrument = format!("PAIR{}", i % 16);
            rm.evaluate(&signal(&instrument)).map(|ticket| {
                ticket.reservation.commit();
                instrument
            })
        }));
    }

    let mut approved = Vec::new();
    for handle in handles {
        if let Ok(instrument) = handle.await.unwrap() {
            approved.push(instrument);
        }
    }

    assert_eq!(approved.len(), 3);
    approved.sort();
    approved.dedup();
    assert_eq!(approved.len(), 3, "an instrument was approved twice");
    assert_eq!(rm.snapshot().open_positions, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_same_instrument_race_single_winner() {
    let rm = manager(3);
    let mut handles = Vec::new();
    for _ in 0..32 {
        let rm = rm.clone();
        handles.push(tokio::spawn(async move { rm.evaluate(&signal("EURUSD")) }));
    }
    let mut tickets = Vec::new();
    let mut duplicates = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(ticket) => tickets.push(ticket),
            Err(RiskRejection::DuplicateExposure(_)) => duplicates += 1,
            Err(other) => panic!("unexpected {other:?}"),
        }
    }
    assert_eq!(tickets.len(), 1);
    assert_eq!(duplicates, 31);
}
