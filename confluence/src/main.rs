use confluence::{Command, ControlOrchestrator, Outcome};
use confluence_core::{Config, CycleResult, CycleTask};
use confluence_data::{HistoricalDataManager, MockExchangeClient, SymbolSynchronizer, TimeSeriesStore};
use confluence_engine::{CycleEvaluator, CycleResultCache};
use confluence_execution::{ExecutionEngine, OrderManager};
use metrics_exporter_prometheus::PrometheusBuilder;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Placeholder strategy scorer: the ML architecture and signal-discovery
/// algorithm are a pluggable concern this platform does not define. Returns
/// a failed `CycleResult` so a real evaluator is visibly required before
/// `train_hist` produces anything meaningful.
struct UnimplementedEvaluator;

impl CycleEvaluator for UnimplementedEvaluator {
    fn evaluate(&self, task: &CycleTask) -> CycleResult {
        CycleResult::failed(task, "primary", "no strategy evaluator configured")
    }
}

const DEFAULT_CONFIG_PATH: &str = "confluence.toml";
const DEFAULT_DB_PATH: &str = "confluence.sqlite3";

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();
}

fn load_config() -> Config {
    let path = std::env::var("CONFLUENCE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    match std::fs::read_to_string(&path) {
        Ok(raw) => Config::from_toml_str(&raw).unwrap_or_else(|err| {
            error!(%err, %path, "invalid config, refusing to start");
            std::process::exit(1);
        }),
        Err(err) => {
            error!(%err, %path, "could not read config file, refusing to start");
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    let config = load_config();

    if let Some(port) = config.metrics_port {
        let builder = PrometheusBuilder::new().with_http_listener(([0, 0, 0, 0], port));
        if let Err(err) = builder.install() {
            error!(%err, "failed to install prometheus exporter");
        } else {
            info!(port, "metrics scrape endpoint listening");
        }
    }

    let store = TimeSeriesStore::open(DEFAULT_DB_PATH).unwrap_or_else(|err| {
        error!(%err, "failed to open time series store");
        std::process::exit(1);
    });

    // No real exchange adapter ships with this platform; the ExchangeClient
    // trait is the external-interface boundary (§6) and `MockExchangeClient`
    // exercises it end-to-end until a concrete exchange binding is wired in.
    let client = MockExchangeClient::new(Decimal::try_from(config.trading.initial_balance).unwrap_or(Decimal::ZERO));

    let historical = HistoricalDataManager::new(client.clone(), store.clone());
    let synchronizer = SymbolSynchronizer::new(store);
    let order_manager = OrderManager::new(
        client,
        config.trading.mode,
        Decimal::try_from(config.trading.commission_rate).unwrap_or_default(),
        Decimal::try_from(config.trading.initial_balance).unwrap_or_default(),
    );
    let engine = Arc::new(ExecutionEngine::new(config.clone(), order_manager));
    let cache = Arc::new(CycleResultCache::new());

    let (orchestrator, mut progress_rx) =
        ControlOrchestrator::new(config.clone(), historical, synchronizer, engine, cache);
    let orchestrator = Arc::new(orchestrator);

    tokio::spawn(async move {
        while let Some(message) = progress_rx.recv().await {
            info!(%message, "progress");
        }
    });

    let evaluator = Arc::new(UnimplementedEvaluator);

    if config.historical.auto_download {
        let response = orchestrator
            .dispatch(
                Command::DownloadData {
                    symbols: config.symbols.clone(),
                    timeframes: config.historical.timeframes.clone(),
                },
                evaluator.clone(),
            )
            .await;
        log_response(&response.command, &response.outcome);
    }

    let response = orchestrator
        .dispatch(
            Command::SyncSymbols {
                symbols: config.symbols.clone(),
                timeframes: config.timeframes.clone(),
            },
            evaluator.clone(),
        )
        .await;
    log_response(&response.command, &response.outcome);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    let response = orchestrator.dispatch(Command::EmergencyStop, evaluator).await;
    log_response(&response.command, &response.outcome);
}

fn log_response(command: &str, outcome: &Outcome) {
    match outcome {
        Outcome::Success => info!(command, "command completed"),
        Outcome::Busy => info!(command, "command rejected: busy"),
        Outcome::Error(msg) => error!(command, %msg, "command failed"),
    }
}
