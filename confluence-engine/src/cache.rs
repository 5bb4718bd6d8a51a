use confluence_core::{CycleResult, Symbol, Timeframe};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

const TTL: Duration = Duration::from_secs(3600);

/// Bounded, advisory cache for `CycleResult` per §4.4. A miss never causes a
/// failure upstream — `ParallelCycleExecutor` falls back to the evaluator.
pub struct CycleResultCache {
    entries: RwLock<HashMap<u64, (CycleResult, Instant)>>,
}

impl CycleResultCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn key(symbol: &Symbol, timeframe: Timeframe, window_end_ts: i64, strategy_id: &str) -> u64 {
        CycleResult::cache_key(symbol, timeframe, window_end_ts, strategy_id)
    }

    /// Returns a cached result if present and not past its TTL. A stale hit
    /// is treated as a miss but is left for the next `put` to overwrite
    /// rather than evicted eagerly here.
    pub fn get(&self, key: u64) -> Option<CycleResult> {
        let entries = self.entries.read();
        let (result, inserted_at) = entries.get(&key)?;
        if inserted_at.elapsed() > TTL {
            return None;
        }
        Some(result.clone())
    }

    /// Idempotent: a repeated `put` for the same key just refreshes the
    /// timestamp and value.
    pub fn put(&self, key: u64, result: CycleResult) {
        self.entries.write().insert(key, (result, Instant::now()));
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop entries past their TTL. Never called from the hot path; callers
    /// may run this periodically to bound memory.
    pub fn evict_expired(&self) {
        let mut entries = self.entries.write();
        entries.retain(|_, (_, inserted_at)| inserted_at.elapsed() <= TTL);
    }
}

impl Default for CycleResultCache {
    fn default() -> Self {
        Self::new()
    }
}
