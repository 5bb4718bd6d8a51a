//! Wiring for the Confluence autonomous trading platform: the control
//! surface (C11) that ties historical data, synchronization, parallel
//! cycle execution and the order pipeline into one cooperative process.

pub mod orchestrator;

pub use orchestrator::{
    Command, CommandResponse, ControlOrchestrator, Outcome, RunState, StatusReport, StrategySignal,
};
