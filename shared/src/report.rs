//! Payloads returned by the orchestration use cases

use serde::{Deserialize, Serialize};

use crate::types::{CorrelationId, ExecutionStatus, NetworkFailure, ResolvedError, RunId};

/// Everything observed during a one-shot execution
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullTelemetryReport {
    pub status: ExecutionStatus,
    pub exit_code: i32,
    pub execution_time_ms: u64,
    pub telemetry: FullTelemetry,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullTelemetry {
    pub browser_console_errors: Vec<String>,
    pub network_failures: Vec<NetworkFailure>,
    pub page_errors: Vec<String>,
    pub backend_container_logs: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryCounts {
    pub network_failures: usize,
    pub console_errors: usize,
    pub page_errors: usize,
    pub backend_warn_error_lines: usize,
}

/// Filtered, truncated view of a run sized for a constrained response budget
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub status: ExecutionStatus,
    pub exit_code: i32,
    pub execution_time_ms: u64,
    pub counts: SummaryCounts,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accessibility_tree: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resolved_errors: Vec<ResolvedError>,
    pub network_failures: Vec<NetworkFailure>,
    pub console_errors: Vec<String>,
    pub page_errors: Vec<String>,
    pub backend_logs: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryReport {
    pub run_id: RunId,
    pub summary: RunSummary,
}

/// Result of a deterministic scenario run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub passed: bool,
    pub run_id: RunId,
    pub trace_id: CorrelationId,
    pub exit_code: i32,
    pub execution_time_ms: u64,
}

/// Fused cross-layer timeline for one correlation id
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceCorrelation {
    pub run_id: RunId,
    pub trace_id: CorrelationId,
    pub console_errors: Vec<String>,
    pub backend_logs: Vec<String>,
    pub network_failures: Vec<NetworkFailure>,
}
