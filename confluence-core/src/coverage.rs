use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Coverage classification for a single `(symbol, timeframe)` pair.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize, Serialize)]
pub enum CoverageStatus {
    NoData,
    Insufficient,
    Complete,
    Error,
}

/// Result of `TimeSeriesStore::coverage`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CoverageReport {
    pub records: u64,
    pub first_ts: Option<i64>,
    pub last_ts: Option<i64>,
    pub gaps: Vec<Range<i64>>,
    pub duplicates: u64,
    pub status: CoverageStatus,
}

impl CoverageReport {
    pub fn empty() -> Self {
        Self {
            records: 0,
            first_ts: None,
            last_ts: None,
            gaps: Vec::new(),
            duplicates: 0,
            status: CoverageStatus::NoData,
        }
    }

    /// Expected record count per spec §4.1: `(last_ts - first_ts) / interval + 1`.
    pub fn expected_records(&self, interval_ms: i64) -> Option<u64> {
        let (first, last) = (self.first_ts?, self.last_ts?);
        Some((((last - first) / interval_ms) + 1) as u64)
    }
}
