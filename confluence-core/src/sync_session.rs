use crate::{symbol::Symbol, timeframe::Timeframe};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Durable record of one `SymbolSynchronizer` run, addressable by
/// `session_id` per the §6 persisted-state layout. Distinct from the
/// in-memory `MasterTimeline` it was built from.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SyncSession {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub symbols: Vec<Symbol>,
    pub timeframes: Vec<Timeframe>,
    pub quality_by_timeframe: IndexMap<Timeframe, f64>,
}

impl SyncSession {
    pub fn new(symbols: Vec<Symbol>, timeframes: Vec<Timeframe>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            created_at: Utc::now(),
            symbols,
            timeframes,
            quality_by_timeframe: IndexMap::new(),
        }
    }
}
