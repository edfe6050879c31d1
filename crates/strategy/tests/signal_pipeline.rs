//! Window -> features -> model, end to end.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use fxpilot_core::{Direction, MarketBar};
use fxpilot_strategy::{BarWindow, Error, FeatureEngine, LocalSignalModel, ModelParams};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn trending_bar(i: i64) -> MarketBar {
    let start = Utc.with_ymd_and_hms(2024, 3, 5, 8, 0, 0).unwrap();
    let close = dec!(1.0800) + Decimal::from(i) * dec!(0.0004);
    MarketBar::new(
        "EURUSD",
        start + Duration::minutes(5 * i),
        close - dec!(0.0002),
        close + dec!(0.0003),
        close - dec!(0.0004),
        close,
        dec!(1500),
    )
}

fn momentum_model() -> ModelParams {
    ModelParams {
        version: "momentum-test".into(),
        features: vec!["roc_10".into(), "price_vs_sma20".into()],
        means: vec![0.0, 0.0],
        scales: vec![0.1, 0.1],
        weights: vec![vec![-1.0, -1.0], vec![0.0, 0.0], vec![1.0, 1.0]],
        biases: vec![0.0, 0.2, 0.0],
    }
}

#[test]
fn test_uptrend_produces_buy() {
    init_logger();
    let engine = FeatureEngine::default();
    let mut window = BarWindow::new("EURUSD", 100);
    for i in 0..80 {
        window.push(trending_bar(i)).unwrap();
    }

    let fv = Arc::new(engine.compute(&window.snapshot()).unwrap());
    let model = LocalSignalModel::with_params(momentum_model()).unwrap();
    let signal = model.predict(fv.clone()).unwrap();

    assert_eq!(signal.direction(), Direction::Buy);
    assert!(signal.confidence() > 0.5);
    assert_eq!(signal.features().as_ref(), fv.as_ref());
}

#[test]
fn test_gap_forces_insufficient_history_until_refilled() {
    init_logger();
    let engine = FeatureEngine::default();
    let mut window = BarWindow::new("EURUSD", 100);
    for i in 0..60 {
        window.push(trending_bar(i)).unwrap();
    }
    assert!(engine.compute(&window.snapshot()).is_ok());

    window.mark_gap();
    for i in 100..110 {
        window.push(trending_bar(i)).unwrap();
    }
    assert!(matches!(
        engine.compute(&window.snapshot()),
        Err(Error::InsufficientHistory { have: 10, .. })
    ));

    for i in 110..100 + engine.min_history() as i64 {
        window.push(trending_bar(i)).unwrap();
    }
    assert!(engine.compute(&window.snapshot()).is_ok());
}
