//! Risk parameters

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Account and portfolio risk limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Starting account equity (account currency)
    pub account_equity: Decimal,
    /// Fraction of equity risked per trade
    pub risk_per_trade: Decimal,
    pub max_open_positions: usize,
    /// Fraction of day-start equity that trips the circuit breaker
    pub daily_loss_limit: Decimal,
    /// Stop distance as a multiple of the volatility feature
    pub stop_atr_multiple: Decimal,
    /// Take-profit distance as a multiple of the volatility feature
    pub take_profit_atr_multiple: Decimal,
    /// Sizes are floored to a multiple of this (1000 = micro lot)
    pub size_step: Decimal,
    pub price_decimals: u32,
    /// Feature used as the volatility measure
    pub volatility_feature: String,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            account_equity: dec!(10000),
            risk_per_trade: dec!(0.01),
            max_open_positions: 3,
            daily_loss_limit: dec!(0.03),
            stop_atr_multiple: dec!(1.5),
            take_profit_atr_multiple: dec!(3.0),
            size_step: dec!(1000),
            price_decimals: 5,
            volatility_feature: "atr_14".to_string(),
        }
    }
}

impl RiskConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.account_equity <= Decimal::ZERO {
            return Err("account_equity must be positive".into());
        }
        if self.risk_per_trade <= Decimal::ZERO || self.risk_per_trade >= Decimal::ONE {
            return Err("risk_per_trade must be in (0, 1)".into());
        }
        if self.daily_loss_limit <= Decimal::ZERO || self.daily_loss_limit >= Decimal::ONE {
            return Err("daily_loss_limit must be in (0, 1)".into());
        }
        if self.max_open_positions == 0 {
            return Err("max_open_positions must be at least 1".into());
        }
        if self.stop_atr_multiple <= Decimal::ZERO || self.take_profit_atr_multiple <= Decimal::ZERO {
            return Err("ATR multiples must be positive".into());
        }
        if self.size_step <= Decimal::ZERO {
            return Err("size_step must be positive".into());
        }
        if self.volatility_feature.is_empty() {
            return Err("volatility_feature must be set".into());
        }
        Ok(())
    }
}
