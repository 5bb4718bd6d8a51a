pub mod mock;

use crate::error::ExchangeError;
use confluence_core::{OHLCVBar, Symbol, Timeframe};
use futures::Stream;
use rust_decimal::Decimal;
use std::future::Future;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum OrderSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum OrderType {
    Limit,
    Market,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum TimeInForce {
    Gtc,
}

/// Request to open an order, modeled on
/// `barter-execution::order::request::OrderRequestOpen`.
#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    pub symbol: Symbol,
    pub side: OrderSide,
    pub kind: OrderType,
    pub qty: Decimal,
    pub price: Option<Decimal>,
    /// MUST be honoured for idempotency (spec §6).
    pub client_order_id: String,
    pub time_in_force: TimeInForce,
}

#[derive(Debug, Clone)]
pub struct OrderAck {
    pub exchange_order_id: String,
    pub fees: Option<Decimal>,
}

#[derive(Debug, Clone, Copy)]
pub struct ExchangeBalance {
    pub free: Decimal,
    pub used: Decimal,
    pub total: Decimal,
}

/// Abstraction over the perpetual-futures venue, covering every surface
/// spec §6 names: OHLCV fetch, order placement/cancellation, balance, and
/// a live candle subscription. Modeled directly on
/// `barter-execution::client::ExecutionClient`'s `impl Future<..> + Send`
/// method style so a real venue integration slots in without touching any
/// caller.
pub trait ExchangeClient: Clone + Send + Sync {
    type CandleStream: Stream<Item = OHLCVBar> + Send;

    /// Fetch up to `limit` bars starting at `since_ms` (inclusive), in
    /// ascending timestamp order.
    fn fetch_ohlcv(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        since_ms: i64,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<OHLCVBar>, ExchangeError>> + Send;

    fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> impl Future<Output = Result<OrderAck, ExchangeError>> + Send;

    fn cancel_order(
        &self,
        exchange_order_id: &str,
        symbol: &Symbol,
    ) -> impl Future<Output = Result<(), ExchangeError>> + Send;

    fn fetch_balance(
        &self,
    ) -> impl Future<Output = Result<ExchangeBalance, ExchangeError>> + Send;

    fn stream_candles(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
    ) -> impl Future<Output = Result<Self::CandleStream, ExchangeError>> + Send;
}
