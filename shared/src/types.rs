//! Core telemetry types and identifiers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of one recorded execution attempt
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RunId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Token propagated through browser requests and echoed into backend logs
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Generate a short request-scoped id of the form `req_<8 hex>`
    pub fn generate() -> Self {
        let hex = Uuid::new_v4().simple().to_string();
        Self(format!("req_{}", &hex[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CorrelationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for CorrelationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Terminal outcome of a run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExecutionStatus {
    Ok,
    Failed,
    Timeout,
    Killed,
}

impl ExecutionStatus {
    /// Derive the status of a finished process. A timeout wins over a kill.
    pub fn from_outcome(outcome: &ProcessOutcome) -> Self {
        if outcome.timed_out {
            ExecutionStatus::Timeout
        } else if outcome.killed {
            ExecutionStatus::Killed
        } else if outcome.exit_code == 0 {
            ExecutionStatus::Ok
        } else {
            ExecutionStatus::Failed
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ExecutionStatus::Ok)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStatus::Ok => write!(f, "OK"),
            ExecutionStatus::Failed => write!(f, "FAILED"),
            ExecutionStatus::Timeout => write!(f, "TIMEOUT"),
            ExecutionStatus::Killed => write!(f, "KILLED"),
        }
    }
}

/// Exit code reported for a process terminated with SIGKILL
pub const SIGKILL_EXIT_CODE: i32 = 137;

/// Result of running the external test command
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessOutcome {
    pub exit_code: i32,
    pub duration_ms: u64,
    #[serde(default)]
    pub killed: bool,
    #[serde(default)]
    pub timed_out: bool,
}

impl ProcessOutcome {
    pub fn exited(exit_code: i32, duration_ms: u64) -> Self {
        Self {
            exit_code,
            duration_ms,
            killed: false,
            timed_out: false,
        }
    }

    /// Outcome for a process tree that was forcibly terminated on timeout
    pub fn timed_out(duration_ms: u64) -> Self {
        Self {
            exit_code: SIGKILL_EXIT_CODE,
            duration_ms,
            killed: true,
            timed_out: true,
        }
    }
}

/// One HTTP exchange that returned >= 400 or never completed.
///
/// A present `status` is always >= 400; an absent one means the request failed
/// before a response arrived (network error, abort, or still pending).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkFailure {
    pub url: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_body: Option<String>,
}

/// Browser-observed facts for one run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub console_errors: Vec<String>,
    pub network_failures: Vec<NetworkFailure>,
    pub page_errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accessibility_tree: Option<String>,
}

/// Full telemetry of one run as kept by the run store
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: RunId,
    pub status: ExecutionStatus,
    pub exit_code: i32,
    pub execution_time_ms: u64,
    pub browser_console_errors: Vec<String>,
    pub network_failures: Vec<NetworkFailure>,
    pub page_errors: Vec<String>,
    pub backend_container_logs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accessibility_tree: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<CorrelationId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_path: Option<String>,
}

impl RunRecord {
    /// Assemble a record from the pieces collected during one capture window
    pub fn assemble(
        run_id: RunId,
        outcome: &ProcessOutcome,
        snapshot: TelemetrySnapshot,
        backend_logs: Vec<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            run_id,
            status: ExecutionStatus::from_outcome(outcome),
            exit_code: outcome.exit_code,
            execution_time_ms: outcome.duration_ms,
            browser_console_errors: snapshot.console_errors,
            network_failures: snapshot.network_failures,
            page_errors: snapshot.page_errors,
            backend_container_logs: backend_logs,
            accessibility_tree: snapshot.accessibility_tree,
            started_at,
            trace_id: None,
            trace_path: None,
        }
    }

    pub fn with_trace(mut self, trace_id: Option<CorrelationId>, trace_path: Option<String>) -> Self {
        self.trace_id = trace_id;
        self.trace_path = trace_path;
        self
    }
}

/// Original-source position of a console/page error
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedError {
    pub original: String,
    pub source: String,
    pub line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

/// Position in an original source file
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePosition {
    pub source: String,
    pub line: u32,
    pub column: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_clean_exit() {
        let outcome = ProcessOutcome::exited(0, 12);
        assert_eq!(ExecutionStatus::from_outcome(&outcome), ExecutionStatus::Ok);
    }

    #[test]
    fn test_status_from_failing_exit() {
        let outcome = ProcessOutcome::exited(3, 12);
        assert_eq!(ExecutionStatus::from_outcome(&outcome), ExecutionStatus::Failed);
    }

    #[test]
    fn test_timeout_takes_precedence_over_killed() {
        let outcome = ProcessOutcome::timed_out(500);
        assert!(outcome.killed && outcome.timed_out);
        assert_eq!(ExecutionStatus::from_outcome(&outcome), ExecutionStatus::Timeout);
        assert_eq!(outcome.exit_code, SIGKILL_EXIT_CODE);
    }

    #[test]
    fn test_killed_without_timeout() {
        let outcome = ProcessOutcome {
            exit_code: 0,
            duration_ms: 5,
            killed: true,
            timed_out: false,
        };
        assert_eq!(ExecutionStatus::from_outcome(&outcome), ExecutionStatus::Killed);
    }

    #[test]
    fn test_status_serializes_uppercase() {
        let json = serde_json::to_string(&ExecutionStatus::Timeout).unwrap();
        assert_eq!(json, "\"TIMEOUT\"");
        assert_eq!(ExecutionStatus::Ok.to_string(), "OK");
    }

    #[test]
    fn test_correlation_id_format() {
        let id = CorrelationId::generate();
        let suffix = id.as_str().strip_prefix("req_").expect("req_ prefix");
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_network_failure_omits_absent_fields() {
        let failure = NetworkFailure {
            url: "https://api/x".to_string(),
            method: "GET".to_string(),
            status: None,
            response_body: None,
        };
        let json = serde_json::to_value(&failure).unwrap();
        assert!(json.get("status").is_none());
        assert!(json.get("response_body").is_none());
    }
}
