use crate::{error::CoreError, symbol::Symbol, timeframe::Timeframe};
use serde::{Deserialize, Serialize};

/// The frozen config object the core consumes at startup (spec §6).
/// `deny_unknown_fields` at every level enforces "unknown keys are
/// rejected at load" literally.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub symbols: Vec<Symbol>,
    pub timeframes: Vec<Timeframe>,
    pub historical: HistoricalConfig,
    pub trading: TradingConfig,
    pub risk: RiskConfig,
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HistoricalConfig {
    pub years: u32,
    pub min_coverage_days: u32,
    pub auto_download: bool,
    pub timeframes: Vec<Timeframe>,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TradingMode {
    Paper,
    Live,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TradingConfig {
    pub mode: TradingMode,
    pub futures: bool,
    pub commission_rate: f64,
    pub initial_balance: f64,
    pub min_confidence: f64,
    pub max_trades_per_bar: u32,
    pub circuit_breaker_loss: f64,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            mode: TradingMode::Paper,
            futures: false,
            commission_rate: 0.001,
            initial_balance: 10_000.0,
            min_confidence: 0.6,
            max_trades_per_bar: 1,
            circuit_breaker_loss: 0.05,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RiskConfig {
    pub max_risk_per_trade: f64,
    pub max_daily_loss_pct: f64,
    pub max_drawdown_pct: f64,
    pub max_leverage: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_risk_per_trade: 0.02,
            max_daily_loss_pct: 0.05,
            max_drawdown_pct: 0.10,
            max_leverage: 3.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutorConfig {
    pub max_workers: usize,
    pub delay_ms: u64,
    pub cycle_timeout_s: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            delay_ms: 100,
            cycle_timeout_s: 30,
        }
    }
}

impl Config {
    /// Parse and validate a TOML-formatted config string. The on-disk file
    /// layout beyond this point (watching for changes, hot reload, ...) is
    /// the excluded chat/TUI concern — this is just the typed boundary.
    pub fn from_toml_str(raw: &str) -> Result<Self, CoreError> {
        let config: Config =
            toml::from_str(raw).map_err(|e| CoreError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.symbols.is_empty() {
            return Err(CoreError::InvalidConfig("symbols must not be empty".into()));
        }
        if self.timeframes.is_empty() {
            return Err(CoreError::InvalidConfig(
                "timeframes must not be empty".into(),
            ));
        }
        if self.executor.max_workers == 0 {
            return Err(CoreError::InvalidConfig(
                "executor.max_workers must be >= 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.trading.min_confidence) {
            return Err(CoreError::InvalidConfig(
                "trading.min_confidence must be in [0, 1]".into(),
            ));
        }
        if self.risk.max_risk_per_trade <= 0.0 {
            return Err(CoreError::InvalidConfig(
                "risk.max_risk_per_trade must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_toml() -> &'static str {
        r#"
        symbols = ["BTCUSDT", "ETHUSDT"]
        timeframes = ["1h"]

        [historical]
        years = 2
        min_coverage_days = 730
        auto_download = true
        timeframes = ["1h"]

        [trading]
        mode = "paper"
        futures = true
        commission_rate = 0.001
        initial_balance = 10000
        min_confidence = 0.6
        max_trades_per_bar = 1
        circuit_breaker_loss = 0.05

        [risk]
        max_risk_per_trade = 0.02
        max_daily_loss_pct = 0.05
        max_drawdown_pct = 0.1
        max_leverage = 3.0

        [executor]
        max_workers = 4
        delay_ms = 100
        cycle_timeout_s = 30
        "#
    }

    #[test]
    fn parses_a_well_formed_config() {
        let config = Config::from_toml_str(sample_toml()).unwrap();
        assert_eq!(config.symbols.len(), 2);
        assert_eq!(config.trading.mode, TradingMode::Paper);
    }

    #[test]
    fn rejects_unknown_keys() {
        let raw = sample_toml().replace("[executor]", "unknown_key = 1\n[executor]");
        assert!(Config::from_toml_str(&raw).is_err());
    }

    #[test]
    fn rejects_empty_symbols() {
        let raw = sample_toml().replace(r#"["BTCUSDT", "ETHUSDT"]"#, "[]");
        assert!(Config::from_toml_str(&raw).is_err());
    }
}
