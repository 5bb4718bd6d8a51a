use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Process-owned monetary state, one per trading mode.
///
/// In paper mode `balance >= 0` is enforced by `OrderManager`. In live mode
/// this mirrors the exchange's free balance and is eventually consistent —
/// `OrderManager` refreshes it from `ExchangeClient::fetch_balance` rather
/// than computing it locally.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Balance {
    pub total: Decimal,
    pub free: Decimal,
}

impl Balance {
    pub fn new(total: Decimal, free: Decimal) -> Self {
        Self { total, free }
    }

    pub fn used(&self) -> Decimal {
        self.total - self.free
    }

    pub fn credit(&mut self, amount: Decimal) {
        self.total += amount;
        self.free += amount;
    }

    pub fn debit(&mut self, amount: Decimal) {
        self.total -= amount;
        self.free -= amount;
    }
}
