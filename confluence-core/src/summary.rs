use crate::symbol::Symbol;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
pub struct Totals {
    pub cycles: u64,
    pub success: u64,
    pub fail: u64,
    pub pnl: Decimal,
    pub trades: u64,
}

/// Snapshot produced by `MetricsAggregator::summary`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SummaryReport {
    pub totals: Totals,
    pub top_strategies: Vec<(SmolStr, Decimal)>,
    pub best_by_symbol: Vec<(Symbol, Decimal)>,
    pub worst_by_symbol: Vec<(Symbol, Decimal)>,
    pub win_rate: f64,
    pub recommendations: Vec<String>,
}
