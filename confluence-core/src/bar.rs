use crate::{error::CoreError, symbol::Symbol, timeframe::Timeframe};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single immutable OHLCV candlestick.
///
/// Construction is the only place the invariants in spec §3 are checked:
/// `high >= max(open, close)`, `low <= min(open, close)`, `volume >= 0`.
/// Once built, a bar can be freely cloned and compared without
/// re-validating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct OHLCVBar {
    pub timestamp_ms: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl OHLCVBar {
    pub fn new(
        timestamp_ms: i64,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Result<Self, CoreError> {
        if high < open.max(close) {
            return Err(CoreError::Other(format!(
                "bar at {timestamp_ms}: high {high} below max(open, close)"
            )));
        }
        if low > open.min(close) {
            return Err(CoreError::Other(format!(
                "bar at {timestamp_ms}: low {low} above min(open, close)"
            )));
        }
        if volume < Decimal::ZERO {
            return Err(CoreError::Other(format!(
                "bar at {timestamp_ms}: negative volume {volume}"
            )));
        }
        Ok(Self {
            timestamp_ms,
            open,
            high,
            low,
            close,
            volume,
        })
    }
}

/// Key identifying a single persisted bar: `(symbol, timeframe, timestamp_ms)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BarKey {
    pub symbol: Symbol,
    pub timeframe: Timeframe,
    pub timestamp_ms: i64,
}
