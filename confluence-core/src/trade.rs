use crate::symbol::Symbol;
use chrono::{DateTime, Utc};
use derive_more::Display;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize, Serialize, Display)]
pub enum Side {
    #[display("BUY")]
    Buy,
    #[display("SELL")]
    Sell,
}

impl Side {
    /// `+1` for `BUY`, `-1` for `SELL` — used in the PnL closed-form formula.
    pub fn direction(self) -> Decimal {
        match self {
            Side::Buy => Decimal::ONE,
            Side::Sell => -Decimal::ONE,
        }
    }

    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize, Serialize)]
pub enum ExitReason {
    Tp,
    Sl,
    Manual,
    CircuitBreaker,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize, Serialize)]
pub enum TradeStatus {
    Open,
    Filled,
    Closed,
    Cancelled,
}

/// Lifecycle: created `Open` by `OrderManager::execute_order`, transitions
/// `Filled -> Closed` on SL/TP or manual close. Invariant:
/// `entry_time <= exit_time` once `exit_time` is set.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TradeRecord {
    pub trade_id: Uuid,
    pub symbol: Symbol,
    pub side: Side,
    pub size_qty: Decimal,
    pub entry_price: Decimal,
    pub exit_price: Option<Decimal>,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    pub leverage: Decimal,
    pub pnl: Decimal,
    pub fees: Decimal,
    pub entry_time: DateTime<Utc>,
    pub exit_time: Option<DateTime<Utc>>,
    pub exit_reason: Option<ExitReason>,
    pub status: TradeStatus,
    pub confidence: f64,
    /// Venue order id backing a live-mode fill, `None` in paper mode or
    /// before a live order acknowledgement arrives. Lets `EmergencyStop`
    /// route a cancellation back through `ExchangeClient::cancel_order`.
    pub exchange_order_id: Option<String>,
}

impl TradeRecord {
    /// Realised PnL per spec §4.7 step 2: `(exit - entry) * size * dir`.
    pub fn realized_pnl(&self, exit_price: Decimal) -> Decimal {
        (exit_price - self.entry_price) * self.size_qty * self.side.direction()
    }

    pub fn is_open(&self) -> bool {
        matches!(self.status, TradeStatus::Open | TradeStatus::Filled)
    }
}
