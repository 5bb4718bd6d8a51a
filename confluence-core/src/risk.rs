use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct TrailingConfig {
    pub activation_pct: Decimal,
    pub trail_pct: Decimal,
}

/// Derived, non-persisted output of `RiskManager::calculate_position_size`.
/// `size_qty == 0` means *reject*.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RiskDecision {
    pub size_qty: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    pub leverage: Decimal,
    pub risk_amount: Decimal,
    pub risk_pct: Decimal,
    pub trailing: Option<TrailingConfig>,
    pub reject_reason: Option<&'static str>,
}

impl RiskDecision {
    pub fn reject(reason: &'static str) -> Self {
        Self {
            size_qty: Decimal::ZERO,
            stop_loss: Decimal::ZERO,
            take_profit: Decimal::ZERO,
            leverage: Decimal::ONE,
            risk_amount: Decimal::ZERO,
            risk_pct: Decimal::ZERO,
            trailing: None,
            reject_reason: Some(reason),
        }
    }

    pub fn is_rejected(&self) -> bool {
        self.size_qty <= Decimal::ZERO
    }
}
