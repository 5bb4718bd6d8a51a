//! Position sizing and daily-limit gating (C7), ported verbatim from the
//! 11-step algorithm in `original_source/trading/risk_manager.py`.

use confluence_core::{Config, RiskDecision, TradingMode, TrailingConfig};
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::warn;

/// Stateless calculator: every call is a pure function of its inputs, so
/// there is nothing to construct beyond the config it reads limits from.
pub struct RiskManager<'a> {
    config: &'a Config,
}

impl<'a> RiskManager<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// `calculate_position_size` per §4.6. `daily_pnl` is the caller's
    /// current-day realized PnL, owned by `ExecutionEngine`'s
    /// `ExecutionGuards::daily_loss`.
    pub fn calculate_position_size(
        &self,
        current_price: Decimal,
        atr: Decimal,
        balance: Decimal,
        stop_loss_pct: Decimal,
        confidence: Decimal,
        daily_pnl: Decimal,
    ) -> RiskDecision {
        if current_price <= Decimal::ZERO || atr <= Decimal::ZERO || balance <= Decimal::ZERO {
            warn!("rejecting position size: invalid inputs");
            return RiskDecision::reject("invalid inputs");
        }

        if !self.check_daily_limits(balance, daily_pnl) {
            return RiskDecision::reject("daily limits exceeded");
        }

        let risk = &self.config.risk;
        let base_risk = balance * Decimal::try_from(risk.max_risk_per_trade).unwrap_or_default();
        let adjusted_risk = base_risk * confidence;

        let risk_per_share = current_price * stop_loss_pct;
        if risk_per_share <= Decimal::ZERO {
            return RiskDecision::reject("invalid stop loss");
        }

        let size0 = adjusted_risk / risk_per_share;

        let vol_factor = (Decimal::new(5, 1) / (atr / current_price)).min(Decimal::ONE);
        let size1 = size0 * vol_factor;

        let max_position_value = balance * Decimal::new(5, 1);
        let size2 = size1.min(max_position_value / current_price);

        let size_qty = size2.round_dp_with_strategy(4, RoundingStrategy::ToNegativeInfinity);
        if size_qty <= Decimal::ZERO {
            return RiskDecision::reject("position size too small");
        }

        let stop_loss = current_price * (Decimal::ONE - stop_loss_pct);
        let take_profit = current_price * (Decimal::ONE + stop_loss_pct * Decimal::from(2));

        let leverage = if self.config.trading.futures && self.config.trading.mode == TradingMode::Live {
            Decimal::try_from(risk.max_leverage)
                .unwrap_or(Decimal::ONE)
                .min(Decimal::from(3))
        } else {
            Decimal::ONE
        };

        let risk_amount = size_qty * (current_price - stop_loss);
        let risk_pct = risk_amount / balance;

        RiskDecision {
            size_qty,
            stop_loss,
            take_profit,
            leverage,
            risk_amount,
            risk_pct,
            trailing: Some(TrailingConfig {
                activation_pct: Decimal::new(1, 2),
                trail_pct: Decimal::new(5, 3),
            }),
            reject_reason: None,
        }
    }

    /// Reject if `daily_pnl < -balance*max_daily_loss_pct` or
    /// `daily_pnl < -balance*max_drawdown_pct`.
    fn check_daily_limits(&self, balance: Decimal, daily_pnl: Decimal) -> bool {
        let risk = &self.config.risk;
        let max_daily_loss =
            balance * Decimal::try_from(risk.max_daily_loss_pct).unwrap_or_default();
        if daily_pnl < -max_daily_loss {
            warn!(%daily_pnl, %max_daily_loss, "daily loss limit exceeded");
            return false;
        }
        let max_drawdown =
            balance * Decimal::try_from(risk.max_drawdown_pct).unwrap_or_default();
        if daily_pnl < -max_drawdown {
            warn!(%daily_pnl, %max_drawdown, "drawdown limit exceeded");
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confluence_core::{ExecutorConfig, HistoricalConfig, RiskConfig, Symbol, Timeframe, TradingConfig};
    use rust_decimal_macros::dec;

    fn sample_config() -> Config {
        Config {
            symbols: vec![Symbol::from("BTCUSDT")],
            timeframes: vec![Timeframe::H1],
            historical: HistoricalConfig {
                years: 2,
                min_coverage_days: 730,
                auto_download: true,
                timeframes: vec![Timeframe::H1],
            },
            trading: TradingConfig::default(),
            risk: RiskConfig::default(),
            executor: ExecutorConfig::default(),
            metrics_port: None,
        }
    }

    #[test]
    fn sizes_a_position_within_risk_budget() {
        let config = sample_config();
        let manager = RiskManager::new(&config);
        let decision = manager.calculate_position_size(
            dec!(50000),
            dec!(500),
            dec!(10000),
            dec!(0.02),
            dec!(1.0),
            dec!(0),
        );
        assert!(!decision.is_rejected());
        assert!(decision.size_qty > Decimal::ZERO);
        assert_eq!(decision.leverage, Decimal::ONE);
        assert!(decision.stop_loss < dec!(50000));
        assert!(decision.take_profit > dec!(50000));
    }

    #[test]
    fn rejects_non_positive_inputs() {
        let config = sample_config();
        let manager = RiskManager::new(&config);
        let decision = manager.calculate_position_size(
            dec!(0),
            dec!(500),
            dec!(10000),
            dec!(0.02),
            dec!(1.0),
            dec!(0),
        );
        assert!(decision.is_rejected());
    }

    #[test]
    fn rejects_when_daily_loss_limit_breached() {
        let config = sample_config();
        let manager = RiskManager::new(&config);
        let decision = manager.calculate_position_size(
            dec!(50000),
            dec!(500),
            dec!(10000),
            dec!(0.02),
            dec!(1.0),
            dec!(-600),
        );
        assert!(decision.is_rejected());
    }

    #[test]
    fn live_futures_mode_uses_capped_leverage() {
        let mut config = sample_config();
        config.trading.mode = confluence_core::TradingMode::Live;
        config.trading.futures = true;
        config.risk.max_leverage = 5.0;
        let manager = RiskManager::new(&config);
        let decision = manager.calculate_position_size(
            dec!(50000),
            dec!(500),
            dec!(10000),
            dec!(0.02),
            dec!(1.0),
            dec!(0),
        );
        assert_eq!(decision.leverage, dec!(3));
    }

    #[test]
    fn high_volatility_throttles_position_size() {
        let config = sample_config();
        let manager = RiskManager::new(&config);
        let calm = manager.calculate_position_size(
            dec!(50000),
            dec!(100),
            dec!(10000),
            dec!(0.02),
            dec!(1.0),
            dec!(0),
        );
        let volatile = manager.calculate_position_size(
            dec!(50000),
            dec!(5000),
            dec!(10000),
            dec!(0.02),
            dec!(1.0),
            dec!(0),
        );
        assert!(volatile.size_qty < calm.size_qty);
    }
}
