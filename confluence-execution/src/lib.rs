//! Order lifecycle management (C8) and signal-routing guard chain (C9)
//! for the Confluence trading platform.

pub mod engine;
pub mod order_manager;

pub use engine::{ExecutionEngine, Signal};
pub use order_manager::{OrderManager, SharedOrderManager};
