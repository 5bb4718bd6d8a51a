use crate::{symbol::Symbol, trade::Side};
use chrono::NaiveDate;
use indexmap::IndexMap;
use rust_decimal::Decimal;

/// Process-wide execution guard state, owned exclusively by `ExecutionEngine`
/// (C9). Every other component observes it only through snapshots.
#[derive(Debug, Clone)]
pub struct ExecutionGuards {
    pub last_signal_per_symbol: IndexMap<Symbol, (Side, i64)>,
    pub trades_this_bar: IndexMap<Symbol, u32>,
    pub current_bar: Option<i64>,
    pub daily_loss: Decimal,
    pub last_reset_date: NaiveDate,
    pub circuit_breaker_active: bool,
}

impl ExecutionGuards {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            last_signal_per_symbol: IndexMap::new(),
            trades_this_bar: IndexMap::new(),
            current_bar: None,
            daily_loss: Decimal::ZERO,
            last_reset_date: today,
            circuit_breaker_active: false,
        }
    }

    /// Reset daily counters on a calendar-day rollover. Returns `true` if a
    /// reset occurred.
    pub fn roll_day_if_needed(&mut self, today: NaiveDate) -> bool {
        if today != self.last_reset_date {
            self.daily_loss = Decimal::ZERO;
            self.circuit_breaker_active = false;
            self.last_reset_date = today;
            true
        } else {
            false
        }
    }

    /// Advance the current bar, clearing per-bar trade counts. Per spec
    /// §4.8, this is a no-op when `bar_ts` matches the current bar.
    pub fn advance_bar_if_needed(&mut self, bar_ts: i64) {
        if self.current_bar != Some(bar_ts) {
            self.trades_this_bar.clear();
            self.current_bar = Some(bar_ts);
        }
    }

    pub fn trades_this_bar_for(&self, symbol: &Symbol) -> u32 {
        self.trades_this_bar.get(symbol).copied().unwrap_or(0)
    }

    pub fn record_fill(&mut self, symbol: Symbol, side: Side, bar_ts: i64) {
        *self.trades_this_bar.entry(symbol.clone()).or_insert(0) += 1;
        self.last_signal_per_symbol.insert(symbol, (side, bar_ts));
    }
}
