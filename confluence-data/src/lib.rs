//! Exchange transport boundary, time-series persistence, coverage
//! backfill and multi-symbol synchronization for the Confluence trading
//! platform.

pub mod error;
pub mod exchange;
pub mod historical;
pub mod store;
pub mod sync;

pub use error::{DataError, ExchangeError};
pub use exchange::{
    mock::MockExchangeClient, CreateOrderRequest, ExchangeBalance, ExchangeClient, OrderAck,
    OrderSide, OrderType, TimeInForce,
};
pub use historical::HistoricalDataManager;
pub use store::{InsertStats, TimeSeriesStore};
pub use sync::{SymbolSynchronizer, SyncOutcome};
