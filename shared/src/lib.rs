//! Shared types for the test-execution telemetry engine
//!
//! Contains the telemetry data model, the query model, report payloads and
//! the pure filtering/truncation policy. Nothing in this crate performs I/O
//! apart from installing the tracing subscriber.

pub mod errors;
pub mod filtering;
pub mod logging;
pub mod query;
pub mod report;
pub mod types;

pub use errors::*;
pub use query::{LevelSelection, QueryData, QueryKind, TelemetryQuery};
pub use report::{
    FullTelemetry, FullTelemetryReport, RunSummary, ScenarioReport, SummaryCounts, SummaryReport,
    TraceCorrelation,
};
pub use types::*;
