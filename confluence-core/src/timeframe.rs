use derive_more::Display;
use serde::{Deserialize, Serialize};

/// A fixed-duration OHLCV bar interval.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display,
)]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    #[display("1m")]
    M1,
    #[display("5m")]
    M5,
    #[display("15m")]
    M15,
    #[display("1h")]
    H1,
    #[display("4h")]
    H4,
    #[display("1d")]
    D1,
}

impl Timeframe {
    /// Canonical interval for this timeframe, in milliseconds.
    pub const fn interval_ms(self) -> i64 {
        match self {
            Timeframe::M1 => 60_000,
            Timeframe::M5 => 5 * 60_000,
            Timeframe::M15 => 15 * 60_000,
            Timeframe::H1 => 60 * 60_000,
            Timeframe::H4 => 4 * 60 * 60_000,
            Timeframe::D1 => 24 * 60 * 60_000,
        }
    }

    /// Stable, filesystem/table-name-safe token, e.g. `"1h"`.
    pub const fn as_token(self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
        }
    }

    pub const ALL: [Timeframe; 6] = [
        Timeframe::M1,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::H1,
        Timeframe::H4,
        Timeframe::D1,
    ];
}

impl std::str::FromStr for Timeframe {
    type Err = crate::error::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(Timeframe::M1),
            "5m" => Ok(Timeframe::M5),
            "15m" => Ok(Timeframe::M15),
            "1h" => Ok(Timeframe::H1),
            "4h" => Ok(Timeframe::H4),
            "1d" => Ok(Timeframe::D1),
            other => Err(crate::error::CoreError::InvalidTimeframe(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_ms_matches_canonical_durations() {
        assert_eq!(Timeframe::M1.interval_ms(), 60_000);
        assert_eq!(Timeframe::H1.interval_ms(), 3_600_000);
        assert_eq!(Timeframe::D1.interval_ms(), 86_400_000);
    }

    #[test]
    fn round_trips_through_token() {
        for tf in Timeframe::ALL {
            assert_eq!(tf.as_token().parse::<Timeframe>().unwrap(), tf);
        }
    }
}
