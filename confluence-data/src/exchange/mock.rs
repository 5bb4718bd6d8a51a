use super::{CreateOrderRequest, ExchangeBalance, ExchangeClient, OrderAck};
use crate::error::ExchangeError;
use confluence_core::{OHLCVBar, Symbol, Timeframe};
use futures::stream::BoxStream;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};

/// In-memory [`ExchangeClient`] used for tests and paper trading. Generates
/// deterministic synthetic OHLCV bars from a per-symbol seed and
/// acknowledges every order immediately — there is no real venue wired
/// into this repo, per spec §1's "Exchange SDK transport details" scope
/// cut. Grounded on the shape of `barter-execution::client::mock`, reduced
/// to plain `Arc<Mutex<_>>` state since this mock has no account-event
/// stream to replay.
#[derive(Clone)]
pub struct MockExchangeClient {
    inner: Arc<Mutex<MockState>>,
}

struct MockState {
    balance: ExchangeBalance,
    next_order_id: u64,
    candle_tx: tokio::sync::broadcast::Sender<OHLCVBar>,
}

impl MockExchangeClient {
    pub fn new(initial_balance: Decimal) -> Self {
        let (candle_tx, _) = tokio::sync::broadcast::channel(1024);
        Self {
            inner: Arc::new(Mutex::new(MockState {
                balance: ExchangeBalance {
                    free: initial_balance,
                    used: Decimal::ZERO,
                    total: initial_balance,
                },
                next_order_id: 1,
                candle_tx,
            })),
        }
    }

    /// Push a live candle to every open `stream_candles` subscription —
    /// used by tests to drive the execution pipeline end to end.
    pub fn publish_candle(&self, bar: OHLCVBar) {
        let inner = self.inner.lock();
        let _ = inner.candle_tx.send(bar);
    }

    /// Deterministic synthetic bar generator: a gentle walk keyed off
    /// `symbol` and `timestamp_ms`, good enough to exercise alignment and
    /// coverage logic without a network dependency.
    fn synthetic_bar(symbol: &Symbol, timeframe: Timeframe, timestamp_ms: i64) -> OHLCVBar {
        let seed = symbol
            .as_str()
            .bytes()
            .fold(0i64, |acc, b| acc.wrapping_add(b as i64));
        let step = timestamp_ms / timeframe.interval_ms().max(1);
        let base = 100 + (seed % 50) + (step % 20);
        let open = Decimal::from(base);
        let close = Decimal::from(base + 1);
        let high = Decimal::from(base + 2);
        let low = Decimal::from(base - 1);
        let volume = Decimal::from(10 + (step % 5));
        OHLCVBar::new(timestamp_ms, open, high, low, close, volume)
            .expect("synthetic bar always satisfies OHLCV invariants")
    }
}

impl ExchangeClient for MockExchangeClient {
    type CandleStream = BoxStream<'static, OHLCVBar>;

    async fn fetch_ohlcv(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        since_ms: i64,
        limit: usize,
    ) -> Result<Vec<OHLCVBar>, ExchangeError> {
        let interval = timeframe.interval_ms();
        Ok((0..limit as i64)
            .map(|i| Self::synthetic_bar(symbol, timeframe, since_ms + i * interval))
            .collect())
    }

    async fn create_order(&self, request: CreateOrderRequest) -> Result<OrderAck, ExchangeError> {
        if request.qty <= Decimal::ZERO {
            return Err(ExchangeError::InvalidOrder("qty must be positive".into()));
        }
        let mut inner = self.inner.lock();
        let notional = request.qty * request.price.unwrap_or(Decimal::ONE);
        if notional > inner.balance.free {
            return Err(ExchangeError::InsufficientFunds(format!(
                "requested notional {notional} exceeds available balance {}",
                inner.balance.free
            )));
        }
        let id = inner.next_order_id;
        inner.next_order_id += 1;
        Ok(OrderAck {
            exchange_order_id: format!("mock-{id}-{}", request.client_order_id),
            fees: Some(Decimal::ZERO),
        })
    }

    async fn cancel_order(
        &self,
        _exchange_order_id: &str,
        _symbol: &Symbol,
    ) -> Result<(), ExchangeError> {
        Ok(())
    }

    async fn fetch_balance(&self) -> Result<ExchangeBalance, ExchangeError> {
        Ok(self.inner.lock().balance)
    }

    async fn stream_candles(
        &self,
        _symbol: &Symbol,
        _timeframe: Timeframe,
    ) -> Result<Self::CandleStream, ExchangeError> {
        let rx = self.inner.lock().candle_tx.subscribe();
        let stream = BroadcastStream::new(rx).filter_map(|item| item.ok());
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn fetch_ohlcv_is_ascending_and_deterministic() {
        let client = MockExchangeClient::new(dec!(10000));
        let symbol = Symbol::from("BTCUSDT");
        let a = client
            .fetch_ohlcv(&symbol, Timeframe::H1, 0, 5)
            .await
            .unwrap();
        let b = client
            .fetch_ohlcv(&symbol, Timeframe::H1, 0, 5)
            .await
            .unwrap();
        assert_eq!(a, b);
        assert!(a.windows(2).all(|w| w[0].timestamp_ms < w[1].timestamp_ms));
    }

    #[tokio::test]
    async fn create_order_rejects_non_positive_qty() {
        let client = MockExchangeClient::new(dec!(10000));
        let request = CreateOrderRequest {
            symbol: Symbol::from("BTCUSDT"),
            side: super::super::OrderSide::Buy,
            kind: super::super::OrderType::Market,
            qty: dec!(0),
            price: Some(dec!(50000)),
            client_order_id: "bot_1".into(),
            time_in_force: super::super::TimeInForce::Gtc,
        };
        assert!(client.create_order(request).await.is_err());
    }

    #[tokio::test]
    async fn create_order_honours_client_order_id() {
        let client = MockExchangeClient::new(dec!(10000));
        let request = CreateOrderRequest {
            symbol: Symbol::from("BTCUSDT"),
            side: super::super::OrderSide::Buy,
            kind: super::super::OrderType::Limit,
            qty: dec!(0.01),
            price: Some(dec!(50000)),
            client_order_id: "bot_abc".into(),
            time_in_force: super::super::TimeInForce::Gtc,
        };
        let ack = client.create_order(request).await.unwrap();
        assert!(ack.exchange_order_id.contains("bot_abc"));
    }
}
