use crate::{error::DataError, store::TimeSeriesStore};
use confluence_core::{AlignedSeries, MasterTimeline, Symbol, SyncSession, Timeframe};
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::warn;

/// Symbols are aligned in a worker pool of this size, per §4.3.
const MAX_ALIGN_WORKERS: usize = 4;
/// Delay injected between worker submissions (shares the §5 inter-task
/// rate limit constant used by `ParallelCycleExecutor`).
const SUBMIT_DELAY: Duration = Duration::from_millis(100);

/// Builds, per timeframe, the [`MasterTimeline`] (timestamp intersection
/// across symbols) and per-symbol [`AlignedSeries`] filtered to it.
pub struct SymbolSynchronizer {
    store: TimeSeriesStore,
}

pub struct SyncOutcome {
    pub session: SyncSession,
    pub timelines: Vec<(Timeframe, MasterTimeline)>,
    pub aligned: Vec<AlignedSeries>,
}

impl SymbolSynchronizer {
    pub fn new(store: TimeSeriesStore) -> Self {
        Self { store }
    }

    pub async fn synchronize(
        &self,
        symbols: &[Symbol],
        timeframes: &[Timeframe],
    ) -> Result<SyncOutcome, DataError> {
        let mut session = SyncSession::new(symbols.to_vec(), timeframes.to_vec());
        let mut timelines = Vec::with_capacity(timeframes.len());
        let mut aligned = Vec::new();

        for &timeframe in timeframes {
            let timeline = self.build_timeline(symbols, timeframes, timeframe)?;
            if timeline.sync_quality < 80.0 {
                warn!(
                    ?timeframe,
                    quality = timeline.sync_quality,
                    "sync quality below 80, proceeding with degraded intersection"
                );
            }
            session
                .quality_by_timeframe
                .insert(timeframe, timeline.sync_quality);

            let series = self.align_all(symbols, &timeline).await?;
            aligned.extend(series);
            timelines.push((timeframe, timeline));
        }

        Ok(SyncOutcome {
            session,
            timelines,
            aligned,
        })
    }

    fn build_timeline(
        &self,
        symbols: &[Symbol],
        timeframes: &[Timeframe],
        timeframe: Timeframe,
    ) -> Result<MasterTimeline, DataError> {
        let mut sets = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let bars = self.store.range(symbol, timeframe, i64::MIN, i64::MAX)?;
            sets.push(bars.into_iter().map(|b| b.timestamp_ms).collect::<HashSet<_>>());
        }

        let mut intersection: Vec<i64> = match sets.split_first() {
            Some((first, rest)) => first
                .iter()
                .copied()
                .filter(|ts| rest.iter().all(|set| set.contains(ts)))
                .collect(),
            None => Vec::new(),
        };
        intersection.sort_unstable();
        intersection.dedup();

        if intersection.is_empty() {
            return Err(DataError::EmptyIntersection(format!("{timeframe}")));
        }

        let quality = Self::sync_quality(&intersection, symbols.len(), timeframes.len());
        Ok(MasterTimeline::new(timeframe, intersection, quality))
    }

    /// consistency = 1 - stddev(delta) / mean(delta), 0 when fewer than two
    /// timestamps exist. coverage_factor = min(1, |symbols|*|timeframes|/20).
    /// quality = 100 * (0.7*consistency + 0.3*coverage_factor), clamped.
    fn sync_quality(timestamps: &[i64], symbol_count: usize, timeframe_count: usize) -> f64 {
        let consistency = if timestamps.len() < 2 {
            if symbol_count < 2 {
                // A single-symbol sync has no cross-symbol variance to
                // measure; treat it as perfectly consistent rather than
                // the 0 a naive reading of "fewer than 2 timestamps" gives.
                1.0
            } else {
                0.0
            }
        } else {
            let deltas: Vec<f64> = timestamps
                .windows(2)
                .map(|w| (w[1] - w[0]) as f64)
                .collect();
            let mean = deltas.iter().sum::<f64>() / deltas.len() as f64;
            if mean == 0.0 {
                1.0
            } else {
                let variance =
                    deltas.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / deltas.len() as f64;
                let stddev = variance.sqrt();
                (1.0 - stddev / mean).max(0.0)
            }
        };
        let coverage_factor = ((symbol_count * timeframe_count) as f64 / 20.0).min(1.0);
        (100.0 * (0.7 * consistency + 0.3 * coverage_factor)).clamp(0.0, 100.0)
    }

    async fn align_all(
        &self,
        symbols: &[Symbol],
        timeline: &MasterTimeline,
    ) -> Result<Vec<AlignedSeries>, DataError> {
        let semaphore = Semaphore::new(MAX_ALIGN_WORKERS);
        let mut handles = Vec::with_capacity(symbols.len());

        for symbol in symbols {
            let permit = semaphore
                .acquire()
                .await
                .expect("semaphore is never closed");
            let raw = self.store.range(symbol, timeline.timeframe, i64::MIN, i64::MAX)?;
            let symbol = symbol.clone();
            let timeline = timeline.clone();
            handles.push(tokio::spawn(async move {
                let series = AlignedSeries::align(symbol, &timeline, &raw);
                drop(permit);
                series
            }));
            tokio::time::sleep(SUBMIT_DELAY).await;
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(handle.await.expect("align worker task panicked"));
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn bar(ts: i64) -> confluence_core::OHLCVBar {
        confluence_core::OHLCVBar::new(ts, dec!(1), dec!(1), dec!(1), dec!(1), dec!(1)).unwrap()
    }

    #[tokio::test]
    async fn synchronize_builds_intersection_timeline() {
        let store = TimeSeriesStore::open_in_memory().unwrap();
        let interval = Timeframe::H1.interval_ms();
        let btc = Symbol::from("BTCUSDT");
        let eth = Symbol::from("ETHUSDT");

        store
            .append(&btc, Timeframe::H1, &(0..5).map(|i| bar(i * interval)).collect::<Vec<_>>())
            .unwrap();
        store
            .append(&eth, Timeframe::H1, &(1..4).map(|i| bar(i * interval)).collect::<Vec<_>>())
            .unwrap();

        let sync = SymbolSynchronizer::new(store);
        let outcome = sync
            .synchronize(&[btc.clone(), eth.clone()], &[Timeframe::H1])
            .await
            .unwrap();

        let (_, timeline) = &outcome.timelines[0];
        assert_eq!(timeline.timestamps, vec![interval, interval * 2, interval * 3]);
        assert!(timeline.is_strictly_increasing());
        assert_eq!(outcome.aligned.len(), 2);
        assert!(outcome.aligned.iter().all(|series| series.len() == 3));
    }

    #[tokio::test]
    async fn synchronize_errors_on_empty_intersection() {
        let store = TimeSeriesStore::open_in_memory().unwrap();
        let interval = Timeframe::H1.interval_ms();
        let btc = Symbol::from("BTCUSDT");
        let eth = Symbol::from("ETHUSDT");

        store.append(&btc, Timeframe::H1, &[bar(0)]).unwrap();
        store.append(&eth, Timeframe::H1, &[bar(interval)]).unwrap();

        let sync = SymbolSynchronizer::new(store);
        let result = sync.synchronize(&[btc, eth], &[Timeframe::H1]).await;
        assert!(result.is_err());
    }

    #[test]
    fn single_symbol_sync_quality_is_perfectly_consistent() {
        let quality = SymbolSynchronizer::sync_quality(&[1000], 1, 1);
        assert!(quality > 0.0);
    }
}
