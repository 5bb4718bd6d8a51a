use crate::{symbol::Symbol, timeframe::Timeframe};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// One unit of strategy evaluation over a timeline slice.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CycleTask {
    pub cycle_id: SmolStr,
    pub symbol: Symbol,
    pub timeframe: Timeframe,
    pub window_start_ts: i64,
    pub window_end_ts: i64,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize, Serialize)]
pub enum CycleStatus {
    Success,
    Failed,
}

/// Immutable result of evaluating one [`CycleTask`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CycleResult {
    pub cycle_id: SmolStr,
    pub symbol: Symbol,
    pub timeframe: Timeframe,
    pub execution_time_ms: u64,
    pub pnl: Decimal,
    pub trades_count: u32,
    /// Fraction of winning trades, in `[0, 1]`.
    pub win_rate: f64,
    pub strategy_id: SmolStr,
    pub status: CycleStatus,
    pub error_msg: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl CycleResult {
    pub fn failed(task: &CycleTask, strategy_id: impl Into<SmolStr>, error_msg: impl Into<String>) -> Self {
        Self {
            cycle_id: task.cycle_id.clone(),
            symbol: task.symbol.clone(),
            timeframe: task.timeframe,
            execution_time_ms: 0,
            pnl: Decimal::ZERO,
            trades_count: 0,
            win_rate: 0.0,
            strategy_id: strategy_id.into(),
            status: CycleStatus::Failed,
            error_msg: Some(error_msg.into()),
            timestamp: Utc::now(),
        }
    }

    /// Cache key per spec §4.4: `hash(symbol, timeframe, window_end_ts, strategy_id)`.
    pub fn cache_key(symbol: &Symbol, timeframe: Timeframe, window_end_ts: i64, strategy_id: &str) -> u64 {
        use std::hash::{DefaultHasher, Hash, Hasher};
        let mut hasher = DefaultHasher::new();
        symbol.hash(&mut hasher);
        timeframe.hash(&mut hasher);
        window_end_ts.hash(&mut hasher);
        strategy_id.hash(&mut hasher);
        hasher.finish()
    }
}

/// Status of a single `(symbol, timeframe)` backfill attempt.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub enum PairDownloadOutcome {
    Complete,
    Partial,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PairDownloadStatus {
    pub symbol: Symbol,
    pub timeframe: Timeframe,
    pub status: PairDownloadOutcome,
    pub fetched: u64,
    pub errors: Vec<String>,
}

/// Returned by `HistoricalDataManager::ensure_coverage`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DownloadReport {
    pub per_pair: Vec<PairDownloadStatus>,
    pub total_fetched: u64,
    pub total_duplicates: u64,
    pub total_errors: u64,
    pub elapsed_ms: u64,
}

/// Returned by `ParallelCycleExecutor::execute`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ExecutionSummary {
    pub cycles_total: u64,
    pub successful: u64,
    pub failed: u64,
    pub total_pnl: Decimal,
    pub total_trades: u64,
    pub elapsed_ms: u64,
    pub avg_cpu_pct: f64,
    pub peak_rss_mb: f64,
}
