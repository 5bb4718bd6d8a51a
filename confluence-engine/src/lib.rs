//! Cycle result caching (C5), bounded-concurrency cycle execution (C6) and
//! metrics aggregation (C10) for the Confluence trading platform.

pub mod cache;
pub mod executor;
pub mod metrics_aggregator;

pub use cache::CycleResultCache;
pub use executor::{CycleEvaluator, ParallelCycleExecutor};
pub use metrics_aggregator::MetricsAggregator;
