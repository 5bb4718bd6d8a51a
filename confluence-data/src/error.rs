use thiserror::Error;

/// The §6 exchange error taxonomy, grounded on
/// `barter-execution::error::{ClientError, ApiError}`: one flat enum with
/// enough context to log, no panics across the `ExchangeClient` boundary.
#[derive(Debug, Clone, Error)]
pub enum ExchangeError {
    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("invalid order: {0}")]
    InvalidOrder(String),

    #[error("rate limited")]
    RateLimit,

    #[error("network error: {0}")]
    Network(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("unknown exchange error: {0}")]
    Unknown(String),
}

impl ExchangeError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExchangeError::RateLimit | ExchangeError::Network(_))
    }
}

/// Errors surfaced by `TimeSeriesStore`, `HistoricalDataManager` and
/// `SymbolSynchronizer`. Per spec §4.1, read paths never error — only
/// writes and synchronization can fail.
#[derive(Debug, Clone, Error)]
pub enum DataError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error("empty symbol intersection for timeframe {0}")]
    EmptyIntersection(String),
}

impl From<rusqlite::Error> for DataError {
    fn from(value: rusqlite::Error) -> Self {
        DataError::Storage(value.to_string())
    }
}
