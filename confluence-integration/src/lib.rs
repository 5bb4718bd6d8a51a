//! Channel, rate-limiting and HTTP retry primitives shared across the
//! Confluence trading platform.

pub mod channel;
pub mod error;
pub mod rate_limit;
pub mod retry;

pub use channel::{Channel, DroppableTx, UnboundedRx, UnboundedTx};
pub use error::TransportError;
pub use rate_limit::{Priority, RateLimiter};
pub use retry::retry_with_backoff;
