use thiserror::Error;

/// Validation and data-integrity errors shared across every Confluence
/// crate. Mirrors the shape of `barter-integration::error::SocketError`:
/// one flat enum per concern, each variant carrying enough context to log
/// without a backtrace.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    #[error("invalid OHLCV bar for {symbol} {timeframe}: {reason}")]
    InvalidBar {
        symbol: String,
        timeframe: String,
        reason: String,
    },

    #[error("unknown timeframe token: {0}")]
    InvalidTimeframe(String),

    #[error("config rejected: {0}")]
    InvalidConfig(String),

    #[error("{0}")]
    Other(String),
}
