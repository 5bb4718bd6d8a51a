use confluence_core::{ExitReason, Side, Symbol, TradeRecord, TradeStatus, TradingMode};
use confluence_data::{
    CreateOrderRequest, ExchangeClient, ExchangeError, OrderSide, OrderType, TimeInForce,
};
use indexmap::IndexMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

fn to_order_side(side: Side) -> OrderSide {
    match side {
        Side::Buy => OrderSide::Buy,
        Side::Sell => OrderSide::Sell,
    }
}

struct State {
    balance_total: Decimal,
    balance_free: Decimal,
    open_trades: IndexMap<Uuid, TradeRecord>,
}

/// Shared entry/exit lifecycle across paper and live trading, per §4.7.
/// All mutations to `open_trades`/balance go through the single
/// `parking_lot::Mutex` below — the "single-writer discipline" the spec
/// calls for, modeled on `jackbot-execution`'s account-state guarding.
pub struct OrderManager<C: ExchangeClient> {
    client: C,
    mode: TradingMode,
    commission_rate: Decimal,
    state: Mutex<State>,
}

impl<C: ExchangeClient> OrderManager<C> {
    pub fn new(client: C, mode: TradingMode, commission_rate: Decimal, initial_balance: Decimal) -> Self {
        Self {
            client,
            mode,
            commission_rate,
            state: Mutex::new(State {
                balance_total: initial_balance,
                balance_free: initial_balance,
                open_trades: IndexMap::new(),
            }),
        }
    }

    pub fn balance(&self) -> (Decimal, Decimal) {
        let state = self.state.lock();
        (state.balance_total, state.balance_free)
    }

    pub fn open_trades(&self) -> Vec<TradeRecord> {
        self.state.lock().open_trades.values().cloned().collect()
    }

    /// `execute_order` per §4.7. Returns `None` on any rejection; never
    /// propagates an `ExchangeError` past this boundary.
    pub async fn execute_order(
        &self,
        symbol: &Symbol,
        side: Side,
        size_qty: Decimal,
        stop_loss: Decimal,
        take_profit: Decimal,
        leverage: Decimal,
        current_price: Decimal,
        confidence: f64,
    ) -> Option<TradeRecord> {
        if size_qty <= Decimal::ZERO {
            return None;
        }

        let trade_id = Uuid::new_v4();
        let mut trade = TradeRecord {
            trade_id,
            symbol: symbol.clone(),
            side,
            size_qty,
            entry_price: current_price,
            exit_price: None,
            stop_loss,
            take_profit,
            leverage,
            pnl: Decimal::ZERO,
            fees: Decimal::ZERO,
            entry_time: chrono::Utc::now(),
            exit_time: None,
            exit_reason: None,
            status: TradeStatus::Open,
            confidence,
            exchange_order_id: None,
        };

        match self.mode {
            TradingMode::Paper => {
                let fees = size_qty * current_price * self.commission_rate;
                trade.fees = fees;
                trade.status = TradeStatus::Filled;
                let mut state = self.state.lock();
                let notional = size_qty * current_price + fees;
                state.balance_free -= notional;
                state.open_trades.insert(trade_id, trade.clone());
            }
            TradingMode::Live => {
                let request = CreateOrderRequest {
                    symbol: symbol.clone(),
                    side: to_order_side(side),
                    kind: OrderType::Limit,
                    qty: size_qty,
                    price: Some(current_price),
                    client_order_id: format!("bot_{trade_id}"),
                    time_in_force: TimeInForce::Gtc,
                };
                match self.client.create_order(request).await {
                    Ok(ack) => {
                        trade.fees = ack.fees.unwrap_or(Decimal::ZERO);
                        trade.status = TradeStatus::Filled;
                        trade.exchange_order_id = Some(ack.exchange_order_id);
                        let mut state = self.state.lock();
                        state.open_trades.insert(trade_id, trade.clone());
                    }
                    Err(err @ (ExchangeError::InsufficientFunds(_)
                    | ExchangeError::InvalidOrder(_)
                    | ExchangeError::Network(_))) => {
                        warn!(%symbol, %err, "order rejected");
                        return None;
                    }
                    Err(err) => {
                        warn!(%symbol, %err, "order rejected with unexpected exchange error");
                        return None;
                    }
                }
            }
        }

        info!(%symbol, ?side, %size_qty, trade_id = %trade_id, "trade opened");
        Some(trade)
    }

    /// `close_trade` per §4.7. Returns `None` if `trade_id` is not open.
    pub fn close_trade(
        &self,
        trade_id: Uuid,
        exit_price: Decimal,
        reason: ExitReason,
    ) -> Option<TradeRecord> {
        let mut state = self.state.lock();
        let mut trade = state.open_trades.shift_remove(&trade_id)?;

        let gross_pnl = trade.realized_pnl(exit_price);
        let exit_fees = trade.size_qty * exit_price * self.commission_rate;
        let total_fees = trade.fees + exit_fees;

        trade.exit_price = Some(exit_price);
        trade.exit_time = Some(chrono::Utc::now());
        trade.exit_reason = Some(reason);
        trade.pnl = gross_pnl - total_fees;
        trade.fees = total_fees;
        trade.status = TradeStatus::Closed;

        let proceeds = trade.size_qty * trade.entry_price + trade.pnl;
        state.balance_free += proceeds;
        state.balance_total += trade.pnl;

        info!(trade_id = %trade_id, pnl = %trade.pnl, ?reason, "trade closed");
        Some(trade.clone())
    }

    /// Cancels the live exchange order backing `trade_id`, per §4.10's
    /// `EmergencyStop` "cancel live orders via C1" clause. A no-op in
    /// paper mode, for an unknown `trade_id`, or for a trade that never
    /// received an exchange order id.
    pub async fn cancel_order(&self, trade_id: Uuid) -> Result<(), ExchangeError> {
        if self.mode != TradingMode::Live {
            return Ok(());
        }
        let (symbol, exchange_order_id) = {
            let state = self.state.lock();
            match state.open_trades.get(&trade_id) {
                Some(trade) => (trade.symbol.clone(), trade.exchange_order_id.clone()),
                None => return Ok(()),
            }
        };
        let Some(exchange_order_id) = exchange_order_id else {
            return Ok(());
        };
        self.client.cancel_order(&exchange_order_id, &symbol).await?;
        info!(trade_id = %trade_id, %exchange_order_id, "live order cancelled");
        Ok(())
    }

    /// Evaluate SL/TP thresholds for every open trade on `symbol` at
    /// `current_price`. A trade closes at most once per call, at the
    /// breached threshold price (`stop_loss`/`take_profit`), not at
    /// `current_price` — per §4.7 and `original_source/trading/
    /// order_manager.py:245-262`, a tick that gaps through a threshold
    /// still fills at the threshold, not at the tick price.
    pub fn check_stop_loss_take_profit(
        &self,
        symbol: &Symbol,
        current_price: Decimal,
    ) -> Vec<TradeRecord> {
        let breach_reason = |trade: &TradeRecord| -> Option<ExitReason> {
            match trade.side {
                Side::Buy if current_price <= trade.stop_loss => Some(ExitReason::Sl),
                Side::Buy if current_price >= trade.take_profit => Some(ExitReason::Tp),
                Side::Sell if current_price >= trade.stop_loss => Some(ExitReason::Sl),
                Side::Sell if current_price <= trade.take_profit => Some(ExitReason::Tp),
                _ => None,
            }
        };

        let candidates: Vec<Uuid> = {
            let state = self.state.lock();
            state
                .open_trades
                .values()
                .filter(|trade| &trade.symbol == symbol && breach_reason(trade).is_some())
                .map(|trade| trade.trade_id)
                .collect()
        };

        let mut closed = Vec::with_capacity(candidates.len());
        for trade_id in candidates {
            let breach = {
                let state = self.state.lock();
                state.open_trades.get(&trade_id).and_then(|trade| {
                    breach_reason(trade).map(|reason| {
                        let threshold_price = match reason {
                            ExitReason::Sl => trade.stop_loss,
                            ExitReason::Tp => trade.take_profit,
                            ExitReason::Manual | ExitReason::CircuitBreaker => current_price,
                        };
                        (reason, threshold_price)
                    })
                })
            };
            if let Some((reason, threshold_price)) = breach {
                if let Some(trade) = self.close_trade(trade_id, threshold_price, reason) {
                    closed.push(trade);
                }
            }
        }
        closed
    }
}

/// A shared handle, used by `ExecutionEngine` and callers that also need
/// to drive order evaluation from another task.
pub type SharedOrderManager<C> = Arc<OrderManager<C>>;
