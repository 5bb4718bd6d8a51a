use crate::{error::DataError, exchange::ExchangeClient, store::TimeSeriesStore};
use chrono::Utc;
use confluence_core::{CoverageStatus, DownloadReport, PairDownloadOutcome, PairDownloadStatus, Symbol, Timeframe};
use confluence_integration::{retry_with_backoff, Priority, RateLimiter};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// Exchange pagination limit (spec §4.2: "typically 1000 bars per call").
const BATCH_LIMIT: usize = 1000;
/// Retry budget per chunk — shares the global "max 5 attempts" policy
/// from §5, so there is one retry budget, not two competing ones.
const RETRY_ATTEMPTS: u32 = 5;
/// Below the §5 floor of "≥200ms gaps when a rate-limit error is
/// observed" only in the trivial sense that it IS that floor; exponential
/// backoff only ever grows the gap from here.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(250);
/// Concurrent backfill requests to the exchange, capped per §5.
const MAX_CONCURRENT_BACKFILLS: usize = 4;
/// Base interval for the shared chunk-dispatch rate limiter — widened
/// adaptively (capped at 16x) whenever a chunk reports `RateLimit`, giving
/// the "≥200ms gaps when a rate-limit error is observed" floor from §5.
const RATE_LIMIT_INTERVAL: Duration = Duration::from_millis(200);

/// Guarantees `coverage_days >= min_coverage_days` for each configured
/// `(symbol, timeframe)` pair, backfilling missing ranges from an
/// [`ExchangeClient`] through a [`TimeSeriesStore`].
pub struct HistoricalDataManager<C: ExchangeClient> {
    client: C,
    store: TimeSeriesStore,
    limiter: Arc<RateLimiter>,
}

impl<C: ExchangeClient> HistoricalDataManager<C> {
    pub fn new(client: C, store: TimeSeriesStore) -> Self {
        Self {
            client,
            store,
            limiter: Arc::new(RateLimiter::new(MAX_CONCURRENT_BACKFILLS, RATE_LIMIT_INTERVAL)),
        }
    }

    /// Backfills every configured `(symbol, timeframe)` pair, bounded to
    /// `MAX_CONCURRENT_BACKFILLS` concurrent exchange requests per §5 —
    /// each pair runs on its own task, gated by a shared semaphore, rather
    /// than the strictly-sequential walk a naive nested loop would give.
    pub async fn ensure_coverage(
        &self,
        symbols: &[Symbol],
        timeframes: &[Timeframe],
        min_coverage_days: u32,
    ) -> Result<DownloadReport, DataError>
    where
        C: Clone + 'static,
    {
        let start = Instant::now();
        let now_ms = Utc::now().timestamp_millis();
        let min_coverage_ms = min_coverage_days as i64 * 24 * 60 * 60 * 1000;
        let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_BACKFILLS));

        let mut handles = Vec::with_capacity(symbols.len() * timeframes.len());
        for symbol in symbols {
            for &timeframe in timeframes {
                let client = self.client.clone();
                let store = self.store.clone();
                let symbol = symbol.clone();
                let semaphore = semaphore.clone();
                let limiter = self.limiter.clone();
                handles.push(tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");
                    let manager = HistoricalDataManager { client, store, limiter };
                    manager
                        .ensure_pair_coverage(&symbol, timeframe, now_ms, min_coverage_ms)
                        .await
                }));
            }
        }

        let mut per_pair = Vec::with_capacity(handles.len());
        let mut total_fetched = 0u64;
        let mut total_duplicates = 0u64;
        let mut total_errors = 0u64;
        for handle in handles {
            let (status, duplicates) = handle.await.expect("backfill task panicked");
            total_fetched += status.fetched;
            total_duplicates += duplicates;
            total_errors += status.errors.len() as u64;
            per_pair.push(status);
        }

        Ok(DownloadReport {
            per_pair,
            total_fetched,
            total_duplicates,
            total_errors,
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn ensure_pair_coverage(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        now_ms: i64,
        min_coverage_ms: i64,
    ) -> (PairDownloadStatus, u64) {
        let coverage = match self.store.coverage(symbol, timeframe) {
            Ok(report) => report,
            Err(e) => {
                return (
                    PairDownloadStatus {
                        symbol: symbol.clone(),
                        timeframe,
                        status: PairDownloadOutcome::Failed,
                        fetched: 0,
                        errors: vec![e.to_string()],
                    },
                    0,
                )
            }
        };

        let ranges: Vec<(i64, i64)> = match coverage.status {
            CoverageStatus::Complete if coverage.first_ts.is_some() => {
                let first_ts = coverage.first_ts.unwrap();
                if now_ms - first_ts >= min_coverage_ms {
                    Vec::new()
                } else {
                    vec![(now_ms - min_coverage_ms, first_ts)]
                }
            }
            CoverageStatus::NoData => vec![(now_ms - min_coverage_ms, now_ms)],
            _ => {
                let first_ts = coverage.first_ts.unwrap_or(now_ms);
                let last_ts = coverage.last_ts.unwrap_or(now_ms);
                vec![(now_ms - min_coverage_ms, first_ts), (last_ts, now_ms)]
            }
        };

        let mut fetched = 0u64;
        let mut duplicates = 0u64;
        let mut errors = Vec::new();
        let interval_ms = timeframe.interval_ms();

        for (range_start, range_end) in ranges {
            let mut since = range_start;
            while since < range_end {
                self.limiter.acquire(Priority::Normal).await;
                let result = retry_with_backoff(
                    RETRY_ATTEMPTS,
                    RETRY_BASE_DELAY,
                    |err: &crate::error::ExchangeError| err.is_retryable(),
                    || self.client.fetch_ohlcv(symbol, timeframe, since, BATCH_LIMIT),
                )
                .await;

                if matches!(result, Err(crate::error::ExchangeError::RateLimit)) {
                    self.limiter.report_violation().await;
                }

                match result {
                    Ok(bars) if bars.is_empty() => break,
                    Ok(bars) => {
                        let last = bars.last().map(|b| b.timestamp_ms).unwrap_or(since);
                        match self.store.append(symbol, timeframe, &bars) {
                            Ok(stats) => {
                                fetched += stats.inserted;
                                duplicates += stats.duplicates_ignored;
                            }
                            Err(e) => errors.push(e.to_string()),
                        }
                        since = last + interval_ms;
                    }
                    Err(e) => {
                        warn!(%symbol, ?timeframe, "permanent failure fetching chunk: {e}");
                        errors.push(e.to_string());
                        break;
                    }
                }
            }
        }

        let status = if errors.is_empty() {
            PairDownloadOutcome::Complete
        } else if fetched > 0 {
            PairDownloadOutcome::Partial
        } else {
            PairDownloadOutcome::Failed
        };

        info!(%symbol, ?timeframe, fetched, errors = errors.len(), "backfill pass complete");

        (
            PairDownloadStatus {
                symbol: symbol.clone(),
                timeframe,
                status,
                fetched,
                errors,
            },
            duplicates,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::mock::MockExchangeClient;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn backfills_no_data_symbol_from_scratch() {
        let client = MockExchangeClient::new(dec!(10000));
        let store = TimeSeriesStore::open_in_memory().unwrap();
        let manager = HistoricalDataManager::new(client, store);
        let symbol = Symbol::from("BTCUSDT");

        let report = manager
            .ensure_coverage(&[symbol.clone()], &[Timeframe::H1], 1)
            .await
            .unwrap();

        assert_eq!(report.per_pair.len(), 1);
        assert_eq!(report.per_pair[0].status, PairDownloadOutcome::Complete);
        assert!(report.total_fetched > 0);
    }

    #[tokio::test]
    async fn skips_symbols_already_fully_covered() {
        let client = MockExchangeClient::new(dec!(10000));
        let store = TimeSeriesStore::open_in_memory().unwrap();
        let symbol = Symbol::from("BTCUSDT");

        let now = Utc::now().timestamp_millis();
        let interval = Timeframe::H1.interval_ms();
        let bars = client
            .fetch_ohlcv(&symbol, Timeframe::H1, now - interval * 48, 48)
            .await
            .unwrap();
        store.append(&symbol, Timeframe::H1, &bars).unwrap();

        let manager = HistoricalDataManager::new(client, store);
        let report = manager
            .ensure_coverage(&[symbol], &[Timeframe::H1], 1)
            .await
            .unwrap();
        assert_eq!(report.per_pair[0].status, PairDownloadOutcome::Complete);
    }
}
