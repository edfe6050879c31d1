use fxpilot_core::{Price, Quantity, Side, Signal};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::RiskRejection;
use crate::parameters::RiskConfig;

/// Size and bracket levels for one approved signal
#[derive(Debug, Clone, PartialEq)]
pub struct SizedOrder {
    pub side: Side,
    pub size: Quantity,
    /// Price the levels were computed from (last close)
    pub reference_price: Price,
    pub stop_loss: Price,
    pub take_profit: Price,
    pub stop_distance: Price,
    /// Equity at risk if the stop is hit
    pub risk_amount: Decimal,
}

/// Fixed-fractional sizing over a volatility-derived stop:
///
/// ```text
/// stop_distance = volatility * stop_atr_multiple
/// size          = floor_to_step(equity * risk_per_trade / stop_distance)
/// stop_loss     = entry -/+ stop_distance
/// take_profit   = entry +/- volatility * take_profit_atr_multiple
/// ```
#[derive(Debug, Clone)]
pub struct PositionSizer {
    config: RiskConfig,
}

impl PositionSizer {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn size(&self, signal: &Signal, equity: Decimal) -> Result<SizedOrder, RiskRejection> {
        let side = signal
            .direction()
            .side()
            .ok_or_else(|| RiskRejection::InvalidSizing("HOLD has no side".into()))?;

        let features = signal.features();
        let raw = features.get(&self.config.volatility_feature).ok_or_else(|| {
            RiskRejection::InvalidSizing(format!("missing {}", self.config.volatility_feature))
        })?;
        let volatility = Decimal::from_f64(raw)
            .map(|v| v.round_dp(10))
            .filter(|v| *v > Decimal::ZERO)
            .ok_or_else(|| RiskRejection::InvalidSizing(format!("bad volatility {raw}")))?;

        let reference_price = features.reference_price();
        if reference_price <= Decimal::ZERO {
            return Err(RiskRejection::InvalidSizing("no reference price".into()));
        }

        let stop_distance = volatility * self.config.stop_atr_multiple;
        let target_distance = volatility * self.config.take_profit_atr_multiple;
        let risk_budget = equity * self.config.risk_per_trade;

        let step = self.config.size_step;
        let units = (risk_budget / stop_distance / step).floor();
        let size = units * step;
        if size <= Decimal::ZERO {
            return Err(RiskRejection::InvalidSizing(format!(
                "risk {risk_budget} over stop {stop_distance} is below one step of {step}"
            )));
        }

        let round = |p: Decimal| {
            p.round_dp_with_strategy(self.config.price_decimals, RoundingStrategy::MidpointAwayFromZero)
        };
        let sign = side.sign();
        let stop_loss = round(reference_price - sign * stop_distance);
        let take_profit = round(reference_price + sign * target_distance);
        if stop_loss <= Decimal::ZERO || take_profit <= Decimal::ZERO {
            return Err(RiskRejection::InvalidSizing("bracket crosses zero".into()));
        }

        Ok(SizedOrder {
            side,
            size,
            reference_price,
            stop_loss,
            take_profit,
            stop_distance,
            risk_amount: size * stop_distance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fxpilot_core::{Direction, FeatureVector};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn signal(direction: Direction, atr: f64) -> Signal {
        let names: Arc<[String]> = vec!["atr_14".to_string()].into();
        let fv = FeatureVector::new("EURUSD".into(), Utc::now(), names, vec![atr], dec!(1.08500));
        Signal::new(direction, 0.72, Arc::new(fv))
    }

    #[test]
    fn test_one_percent_risk_over_atr_stop() {
        let sizer = PositionSizer::new(RiskConfig::default());
        let order = sizer.size(&signal(Direction::Buy, 0.0010), dec!(10000)).unwrap();

        // 100 / 0.0015 = 66_666 -> 66_000 in 1000 steps
        assert_eq!(order.size, dec!(66000));
        assert_eq!(order.stop_distance, dec!(0.0015));
        assert_eq!(order.stop_loss, dec!(1.08350));
        assert_eq!(order.take_profit, dec!(1.08800));
        assert!(order.risk_amount <= dec!(100));
    }

    #[test]
    fn test_sell_brackets_are_mirrored() {
        let sizer = PositionSizer::new(RiskConfig::default());
        let order = sizer.size(&signal(Direction::Sell, 0.0010), dec!(10000)).unwrap();
        assert_eq!(order.side, Side::Sell);
        assert_eq!(order.stop_loss, dec!(1.08650));
        assert_eq!(order.take_profit, dec!(1.08200));
    }

    #[test]
    fn test_unsizable_signals() {
        let sizer = PositionSizer::new(RiskConfig::default());
        assert!(sizer.size(&signal(Direction::Hold, 0.001), dec!(10000)).is_err());
        assert!(sizer.size(&signal(Direction::Buy, 0.0), dec!(10000)).is_err());
        assert!(sizer.size(&signal(Direction::Buy, f64::NAN), dec!(10000)).is_err());
        // Huge volatility: risk budget buys less than one step
        assert!(matches!(
            sizer.size(&signal(Direction::Buy, 0.5), dec!(10000)),
            Err(RiskRejection::InvalidSizing(_))
        ));
    }
}
