//! Shared data model, error taxonomy and configuration for the Confluence
//! trading platform — the typed value objects every other crate builds on.

pub mod balance;
pub mod bar;
pub mod config;
pub mod coverage;
pub mod cycle;
pub mod error;
pub mod guards;
pub mod risk;
pub mod summary;
pub mod symbol;
pub mod sync_session;
pub mod timeframe;
pub mod timeline;
pub mod trade;

pub use balance::Balance;
pub use bar::{BarKey, OHLCVBar};
pub use config::Config;
pub use coverage::{CoverageReport, CoverageStatus};
pub use cycle::{
    CycleResult, CycleStatus, CycleTask, DownloadReport, ExecutionSummary, PairDownloadOutcome,
    PairDownloadStatus,
};
pub use error::CoreError;
pub use guards::ExecutionGuards;
pub use risk::{RiskDecision, TrailingConfig};
pub use summary::{SummaryReport, Totals};
pub use symbol::Symbol;
pub use sync_session::SyncSession;
pub use timeframe::Timeframe;
pub use timeline::{AlignedSeries, MasterTimeline};
pub use trade::{ExitReason, Side, TradeRecord, TradeStatus};
