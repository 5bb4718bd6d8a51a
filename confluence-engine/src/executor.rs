use crate::cache::CycleResultCache;
use confluence_core::{
    CycleResult, CycleStatus, CycleTask, ExecutionSummary, ExecutorConfig, MasterTimeline, Symbol,
    Timeframe,
};
use rust_decimal::Decimal;
use smol_str::SmolStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{info, warn};

/// Evaluates one [`CycleTask`] into a [`CycleResult`]. Implementations may
/// block; the executor runs each call on a blocking thread and bounds it by
/// `cycle_timeout_s`.
pub trait CycleEvaluator: Send + Sync + 'static {
    fn evaluate(&self, task: &CycleTask) -> CycleResult;
}

impl<F> CycleEvaluator for F
where
    F: Fn(&CycleTask) -> CycleResult + Send + Sync + 'static,
{
    fn evaluate(&self, task: &CycleTask) -> CycleResult {
        self(task)
    }
}

/// Samples process CPU and resident memory once a second while a run is
/// active, modeled on `cooprefr-bettersys`'s cached-`System` sysinfo pattern.
struct ResourceSampler {
    cpu_samples: std::sync::Mutex<Vec<f64>>,
    peak_rss_mb: AtomicU64, // bit-cast f64
}

impl ResourceSampler {
    fn new() -> Self {
        Self {
            cpu_samples: std::sync::Mutex::new(Vec::new()),
            peak_rss_mb: AtomicU64::new(0),
        }
    }

    fn record(&self, cpu_pct: f64, rss_mb: f64) {
        self.cpu_samples.lock().unwrap().push(cpu_pct);
        let mut peak = f64::from_bits(self.peak_rss_mb.load(Ordering::Relaxed));
        if rss_mb > peak {
            peak = rss_mb;
            self.peak_rss_mb.store(peak.to_bits(), Ordering::Relaxed);
        }
    }

    fn avg_cpu_pct(&self) -> f64 {
        let samples = self.cpu_samples.lock().unwrap();
        if samples.is_empty() {
            return 0.0;
        }
        samples.iter().sum::<f64>() / samples.len() as f64
    }

    fn peak_rss_mb(&self) -> f64 {
        f64::from_bits(self.peak_rss_mb.load(Ordering::Relaxed))
    }
}

async fn sample_resources_until(cancel: Arc<AtomicBool>, sampler: Arc<ResourceSampler>) {
    let pid = Pid::from_u32(std::process::id());
    let mut system = System::new();
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    while !cancel.load(Ordering::Relaxed) {
        interval.tick().await;
        system.refresh_all();
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            ProcessRefreshKind::new().with_cpu().with_memory(),
        );
        if let Some(process) = system.process(pid) {
            let cpu_pct = process.cpu_usage() as f64;
            let rss_mb = process.memory() as f64 / (1024.0 * 1024.0);
            sampler.record(cpu_pct, rss_mb);
        }
    }
}

/// Bounded-concurrency cycle runner per §4.5. One executor drives one
/// strategy over a Cartesian `symbol x timeframe` task set; `strategy_id`
/// is fixed at construction since a [`CycleTask`] carries no strategy
/// identity of its own.
pub struct ParallelCycleExecutor {
    config: ExecutorConfig,
    strategy_id: SmolStr,
    cache: Arc<CycleResultCache>,
    current_progress: AtomicU64,
    total_tasks: AtomicU64,
}

impl ParallelCycleExecutor {
    pub fn new(config: ExecutorConfig, strategy_id: impl Into<SmolStr>, cache: Arc<CycleResultCache>) -> Self {
        Self {
            config,
            strategy_id: strategy_id.into(),
            cache,
            current_progress: AtomicU64::new(0),
            total_tasks: AtomicU64::new(0),
        }
    }

    pub fn progress(&self) -> (u64, u64) {
        (
            self.current_progress.load(Ordering::Relaxed),
            self.total_tasks.load(Ordering::Relaxed),
        )
    }

    fn build_tasks(&self, timeline: &MasterTimeline, symbols: &[Symbol], timeframes: &[Timeframe]) -> Vec<CycleTask> {
        let mut tasks = Vec::with_capacity(symbols.len() * timeframes.len());
        for symbol in symbols {
            for &timeframe in timeframes {
                tasks.push(CycleTask {
                    cycle_id: SmolStr::new(format!("{symbol}-{timeframe}-{}", timeline.end)),
                    symbol: symbol.clone(),
                    timeframe,
                    window_start_ts: timeline.start,
                    window_end_ts: timeline.end,
                });
            }
        }
        tasks
    }

    /// Runs every `(symbol, timeframe)` task against `timeline` through
    /// `evaluator`, bounded by `config.max_workers` concurrent workers.
    /// `cancel` may be flipped from another task to stop dispatching new
    /// work; in-flight workers still drain before returning.
    pub async fn execute<E: CycleEvaluator>(
        &self,
        timeline: &MasterTimeline,
        symbols: &[Symbol],
        timeframes: &[Timeframe],
        evaluator: Arc<E>,
        cancel: Arc<AtomicBool>,
    ) -> ExecutionSummary {
        let started = Instant::now();
        let tasks = self.build_tasks(timeline, symbols, timeframes);
        let total = tasks.len() as u64;
        self.total_tasks.store(total, Ordering::Relaxed);
        self.current_progress.store(0, Ordering::Relaxed);

        let sampler = Arc::new(ResourceSampler::new());
        let sampler_cancel = Arc::new(AtomicBool::new(false));
        let sampler_task = tokio::spawn(sample_resources_until(sampler_cancel.clone(), sampler.clone()));

        let semaphore = Arc::new(Semaphore::new(self.config.max_workers.max(1)));
        let successful = Arc::new(AtomicU64::new(0));
        let failed = Arc::new(AtomicU64::new(0));
        let total_trades = Arc::new(AtomicU64::new(0));
        let total_pnl = Arc::new(std::sync::Mutex::new(Decimal::ZERO));
        let mut handles = Vec::with_capacity(tasks.len());
        let cycle_timeout = Duration::from_secs(self.config.cycle_timeout_s);
        let mut logged_milestone = [false; 4];

        for task in tasks {
            if cancel.load(Ordering::Relaxed) {
                break;
            }

            if let Some(cached) = self
                .cache
                .get(CycleResultCache::key(&task.symbol, task.timeframe, task.window_end_ts, &self.strategy_id))
            {
                self.apply_result(&cached, &successful, &failed, &total_trades, &total_pnl);
                self.bump_progress(total, &mut logged_milestone);
                continue;
            }

            let permit = semaphore.clone().acquire_owned().await.expect("semaphore not closed");
            let evaluator = evaluator.clone();
            let cache = self.cache.clone();
            let strategy_id = self.strategy_id.clone();
            let successful = successful.clone();
            let failed = failed.clone();
            let total_trades = total_trades.clone();
            let total_pnl = total_pnl.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                let task_for_blocking = task.clone();
                let run = tokio::task::spawn_blocking(move || evaluator.evaluate(&task_for_blocking));
                let outcome = timeout(cycle_timeout, run).await;

                let result = match outcome {
                    Ok(Ok(result)) => result,
                    Ok(Err(_panicked)) => {
                        warn!(cycle_id = %task.cycle_id, "cycle evaluator panicked");
                        CycleResult::failed(&task, strategy_id.clone(), "evaluator panicked")
                    }
                    Err(_elapsed) => {
                        warn!(cycle_id = %task.cycle_id, "cycle evaluator timed out");
                        CycleResult::failed(&task, strategy_id.clone(), "evaluator timed out")
                    }
                };

                if result.status == CycleStatus::Success {
                    let key = CycleResultCache::key(&result.symbol, result.timeframe, task.window_end_ts, &strategy_id);
                    cache.put(key, result.clone());
                    successful.fetch_add(1, Ordering::Relaxed);
                } else {
                    failed.fetch_add(1, Ordering::Relaxed);
                }
                total_trades.fetch_add(result.trades_count as u64, Ordering::Relaxed);
                *total_pnl.lock().unwrap() += result.pnl;
            });
            handles.push(handle);

            tokio::time::sleep(Duration::from_millis(self.config.delay_ms)).await;
            self.bump_progress(total, &mut logged_milestone);
        }

        for handle in handles {
            if let Err(err) = handle.await {
                warn!(%err, "cycle worker task join failed");
            }
        }

        sampler_cancel.store(true, Ordering::Relaxed);
        sampler_task.abort();

        let summary = ExecutionSummary {
            cycles_total: total,
            successful: successful.load(Ordering::Relaxed),
            failed: failed.load(Ordering::Relaxed),
            total_pnl: *total_pnl.lock().unwrap(),
            total_trades: total_trades.load(Ordering::Relaxed),
            elapsed_ms: started.elapsed().as_millis() as u64,
            avg_cpu_pct: sampler.avg_cpu_pct(),
            peak_rss_mb: sampler.peak_rss_mb(),
        };
        info!(?summary, "cycle execution run complete");
        summary
    }

    fn apply_result(
        &self,
        result: &CycleResult,
        successful: &AtomicU64,
        failed: &AtomicU64,
        total_trades: &AtomicU64,
        total_pnl: &std::sync::Mutex<Decimal>,
    ) {
        if result.status == CycleStatus::Success {
            successful.fetch_add(1, Ordering::Relaxed);
        } else {
            failed.fetch_add(1, Ordering::Relaxed);
        }
        total_trades.fetch_add(result.trades_count as u64, Ordering::Relaxed);
        *total_pnl.lock().unwrap() += result.pnl;
    }

    fn bump_progress(&self, total: u64, logged_milestone: &mut [bool; 4]) {
        let done = self.current_progress.fetch_add(1, Ordering::Relaxed) + 1;
        if total == 0 {
            return;
        }
        let pct = done * 100 / total;
        for (idx, threshold) in [25u64, 50, 75, 100].into_iter().enumerate() {
            if pct >= threshold && !logged_milestone[idx] {
                logged_milestone[idx] = true;
                info!(pct = threshold, done, total, "cycle execution progress");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confluence_core::{CycleStatus, Timeframe};
    use rust_decimal_macros::dec;

    fn config() -> ExecutorConfig {
        ExecutorConfig {
            max_workers: 2,
            delay_ms: 0,
            cycle_timeout_s: 5,
        }
    }

    fn timeline() -> MasterTimeline {
        MasterTimeline::new(Timeframe::H1, vec![1_000, 2_000, 3_000], 95.0)
    }

    struct FixedEvaluator;
    impl CycleEvaluator for FixedEvaluator {
        fn evaluate(&self, task: &CycleTask) -> CycleResult {
            CycleResult {
                cycle_id: task.cycle_id.clone(),
                symbol: task.symbol.clone(),
                timeframe: task.timeframe,
                execution_time_ms: 1,
                pnl: dec!(10),
                trades_count: 1,
                win_rate: 1.0,
                strategy_id: "s1".into(),
                status: CycleStatus::Success,
                error_msg: None,
                timestamp: chrono::Utc::now(),
            }
        }
    }

    #[tokio::test]
    async fn executes_every_symbol_timeframe_pair() {
        let executor = ParallelCycleExecutor::new(config(), "s1", Arc::new(CycleResultCache::new()));
        let symbols = vec![Symbol::from("BTCUSDT"), Symbol::from("ETHUSDT")];
        let timeframes = vec![Timeframe::H1];
        let summary = executor
            .execute(
                &timeline(),
                &symbols,
                &timeframes,
                Arc::new(FixedEvaluator),
                Arc::new(AtomicBool::new(false)),
            )
            .await;
        assert_eq!(summary.cycles_total, 2);
        assert_eq!(summary.successful, 2);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.total_pnl, dec!(20));
        assert_eq!(summary.total_trades, 2);
    }

    #[tokio::test]
    async fn a_second_run_hits_the_cache() {
        let cache = Arc::new(CycleResultCache::new());
        let executor = ParallelCycleExecutor::new(config(), "s1", cache.clone());
        let symbols = vec![Symbol::from("BTCUSDT")];
        let timeframes = vec![Timeframe::H1];
        executor
            .execute(
                &timeline(),
                &symbols,
                &timeframes,
                Arc::new(FixedEvaluator),
                Arc::new(AtomicBool::new(false)),
            )
            .await;
        assert_eq!(cache.len(), 1);

        let second = executor
            .execute(
                &timeline(),
                &symbols,
                &timeframes,
                Arc::new(FixedEvaluator),
                Arc::new(AtomicBool::new(false)),
            )
            .await;
        assert_eq!(second.successful, 1);
    }

    #[tokio::test]
    async fn cancelling_before_dispatch_stops_new_tasks() {
        let executor = ParallelCycleExecutor::new(config(), "s1", Arc::new(CycleResultCache::new()));
        let symbols = vec![Symbol::from("BTCUSDT"), Symbol::from("ETHUSDT")];
        let timeframes = vec![Timeframe::H1];
        let cancel = Arc::new(AtomicBool::new(true));
        let summary = executor
            .execute(&timeline(), &symbols, &timeframes, Arc::new(FixedEvaluator), cancel)
            .await;
        assert_eq!(summary.successful, 0);
        assert_eq!(summary.failed, 0);
    }
}
