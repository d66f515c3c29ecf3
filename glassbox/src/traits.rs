//! Port traits with mockall annotations for testing
//!
//! Every collaborator the engine talks to sits behind one of these traits.
//! The concrete adapters live in `services`; tests substitute the generated
//! `Mock*` types.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{CorrelationId, ProcessOutcome, QueryData, RunId, RunRecord, SourcePosition, TelemetryQuery};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::GlassboxResult;

/// Event observed on a browser page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BrowserEvent {
    /// A response arrived with status >= 400
    Response {
        url: String,
        method: String,
        status: u16,
        #[serde(default)]
        body: Option<String>,
    },
    /// A request failed before any response arrived
    RequestFailed {
        url: String,
        method: String,
        #[serde(default)]
        error: Option<String>,
    },
    Console { kind: String, text: String },
    PageError { message: String },
}

/// One node of the accessibility snapshot of a page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessibilityNode {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub children: Vec<AccessibilityNode>,
}

impl AccessibilityNode {
    /// Render as indented text, one `[role "name" [value=v]]` line per node
    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        self.render_into(0, &mut lines);
        lines.join("\n")
    }

    fn render_into(&self, depth: usize, lines: &mut Vec<String>) {
        let mut line = format!("{}[{}", "  ".repeat(depth), self.role.as_deref().unwrap_or("unknown"));
        if let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) {
            line.push_str(&format!(" \"{name}\""));
        }
        if let Some(value) = &self.value {
            line.push_str(&format!(" [value={value}]"));
        }
        line.push(']');
        lines.push(line);
        for child in &self.children {
            child.render_into(depth + 1, lines);
        }
    }
}

/// Extensions wired into an engine instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub savepoints: bool,
    pub source_maps: bool,
}

/// Runs the external test command
///
/// The command runs in the ambient environment of the engine process. A
/// forced termination always takes down the whole process tree, since the
/// shell spawns children of its own.
#[mockall::automock]
#[async_trait::async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `command` through the shell until it exits, the timeout elapses or
    /// `cancel` fires.
    ///
    /// # Parameters
    /// - `command`: Shell command line, passed to `sh -c`
    /// - `timeout`: Wall-clock limit; `None` or zero disables the timer
    /// - `cancel`: Kills the process tree when cancelled
    ///
    /// # Returns
    /// The outcome of a command that ran, including failing runs (non-zero
    /// exit code) and forced terminations (exit code 137 with `killed`, plus
    /// `timed_out` when the timer fired). `ProcessSpawn` when the command
    /// could not be started at all.
    async fn run(
        &self,
        command: &str,
        timeout: Option<Duration>,
        cancel: CancellationToken,
    ) -> GlassboxResult<ProcessOutcome>;
}

/// Launches isolated browser sessions
#[mockall::automock]
#[async_trait::async_trait]
pub trait BrowserEngine: Send + Sync {
    async fn launch(&self) -> GlassboxResult<Box<dyn BrowserSession>>;
}

/// One isolated browser session
///
/// Sessions share no state with each other. The owner must call `close`
/// exactly once on every path, including errors and timeouts.
#[mockall::automock]
#[async_trait::async_trait]
pub trait BrowserSession: Send {
    /// Take the event stream of the session
    ///
    /// # Returns
    /// Receiver of page events in the order they were observed. The stream
    /// can only be taken once; a second call is an error.
    fn subscribe(&mut self) -> GlassboxResult<mpsc::UnboundedReceiver<BrowserEvent>>;

    /// Tag every outgoing request with the correlation id header
    ///
    /// # Parameters
    /// - `correlation_id`: Value of the `X-Agent-Trace-Id` header
    async fn set_correlation_header(&mut self, correlation_id: &CorrelationId) -> GlassboxResult<()>;

    /// Start recording a replayable trace with screenshots and DOM snapshots
    async fn start_tracing(&mut self) -> GlassboxResult<()>;

    /// Stop recording and write the trace archive
    ///
    /// # Parameters
    /// - `path`: Destination of the trace zip; its directory must exist
    async fn stop_tracing(&mut self, path: &Path) -> GlassboxResult<()>;

    /// Snapshot the accessibility tree of the current page
    ///
    /// # Returns
    /// The root node, or `None` when the page exposes no tree
    async fn accessibility_tree(&mut self) -> GlassboxResult<Option<AccessibilityNode>>;

    /// Release the browser behind the session
    async fn close(&mut self) -> GlassboxResult<()>;
}

/// Container runtime operations
#[mockall::automock]
#[async_trait::async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn stop(&self, container: &str) -> GlassboxResult<()>;

    async fn start(&self, container: &str) -> GlassboxResult<()>;

    async fn remove(&self, container: &str) -> GlassboxResult<()>;

    /// Commit the container filesystem to `image` (`repo:tag`)
    async fn commit(&self, container: &str, image: &str) -> GlassboxResult<()>;

    /// Create a container named `container` from `image`
    async fn create(&self, container: &str, image: &str) -> GlassboxResult<()>;

    /// Raw stdout and stderr emitted since `since`, bounded to `tail` lines
    async fn logs(&self, container: &str, since: DateTime<Utc>, tail: usize) -> GlassboxResult<String>;

    async fn image_tags(&self, repository: &str) -> GlassboxResult<Vec<String>>;
}

/// Backend log retrieval
#[mockall::automock]
#[async_trait::async_trait]
pub trait ContainerLogs: Send + Sync {
    /// Lines emitted since `since` by each container, each non-empty block
    /// preceded by a `[name]` header. A failing container contributes a
    /// single `[name] Error: ...` line.
    async fn logs_since(
        &self,
        names: Vec<String>,
        since: DateTime<Utc>,
        correlation_id: Option<String>,
    ) -> Vec<String>;
}

/// Named container checkpoints
#[mockall::automock]
#[async_trait::async_trait]
pub trait SavepointManager: Send + Sync {
    async fn create_savepoint(&self, name: &str) -> GlassboxResult<()>;

    async fn restore_savepoint(&self, name: &str) -> GlassboxResult<()>;

    async fn list_savepoints(&self) -> GlassboxResult<Vec<String>>;
}

/// Maps compiled positions back to original sources
#[mockall::automock]
#[async_trait::async_trait]
pub trait SourceMapResolver: Send + Sync {
    /// `line` is 1-based, `column` 0-based. Absent maps resolve to `None`.
    async fn resolve(&self, artifact: &str, line: u32, column: u32) -> Option<SourcePosition>;
}

/// Reads recorded trace archives
#[mockall::automock]
#[async_trait::async_trait]
pub trait TraceReader: Send + Sync {
    /// DOM snapshot nearest `offset_ms`; `None` when the archive is missing
    /// or unreadable.
    async fn dom_snapshot_at(&self, trace_path: &Path, offset_ms: u64) -> Option<String>;
}

/// Bounded store of full run telemetry
///
/// Safe for concurrent use: one run may be queried while another is being
/// stored. When full, inserting a new id evicts the oldest id by first
/// insertion.
#[mockall::automock]
pub trait RunStore: Send + Sync {
    /// Store the full telemetry of a run
    ///
    /// # Parameters
    /// - `run_id`: Key of the run; an existing key is overwritten in place
    ///   and keeps its position in the eviction order
    /// - `record`: Unfiltered telemetry of the run
    fn put(&self, run_id: RunId, record: RunRecord);

    /// Fetch a stored run
    ///
    /// # Returns
    /// A copy of the record, or `None` if the id was never stored or has
    /// been evicted
    fn get(&self, run_id: &RunId) -> Option<RunRecord>;

    /// Project a stored run
    ///
    /// # Parameters
    /// - `run_id`: Run to read
    /// - `query`: Projection kind and its filters
    ///
    /// # Returns
    /// The projection, untruncated. `RunNotFound` naming the id when the run
    /// is not stored.
    fn query(&self, run_id: &RunId, query: &TelemetryQuery) -> GlassboxResult<QueryData>;
}
