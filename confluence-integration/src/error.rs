use thiserror::Error;

/// Low-level transport errors, mirroring
/// `barter-integration::error::SocketError`'s flat, loggable shape.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP response (status={0}) error: {1}")]
    HttpResponse(reqwest::StatusCode, String),

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("rate limited")]
    RateLimit,

    #[error("deserialising response: {0}")]
    Deserialise(#[from] serde_json::Error),
}

impl TransportError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportError::Timeout(_) | TransportError::RateLimit | TransportError::Http(_)
        )
    }
}
