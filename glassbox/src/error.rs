//! Engine error types

use shared::{RunId, SharedError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GlassboxError {
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Failed to spawn command `{command}`: {message}")]
    ProcessSpawn { command: String, message: String },

    #[error("Failed to launch browser session: {message}")]
    BrowserLaunch { message: String },

    #[error("Browser session error: {message}")]
    Browser { message: String },

    #[error("Telemetry capture timed out after {after_ms}ms")]
    CaptureTimeout { after_ms: u64 },

    #[error("Container operation `{operation}` failed for {container}: {message}")]
    Container {
        operation: String,
        container: String,
        message: String,
    },

    #[error("Savepoint `{name}` failed: {message}")]
    Savepoint { name: String, message: String },

    #[error("Savepoint manager not configured (set a savepoint container to enable savepoints)")]
    SavepointNotConfigured,

    #[error("Run {run_id} not found; it may have expired from the store, re-run to capture it again")]
    RunNotFound { run_id: RunId },

    #[error("Run {run_id} has no recorded trace; run a deterministic scenario to record one")]
    TraceNotRecorded { run_id: RunId },

    #[error("DOM snapshot unavailable for {path}")]
    SnapshotUnavailable { path: String },

    #[error("Shared component error: {0}")]
    Shared(#[from] SharedError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GlassboxError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        GlassboxError::InvalidInput {
            message: message.into(),
        }
    }

    pub fn browser(message: impl Into<String>) -> Self {
        GlassboxError::Browser {
            message: message.into(),
        }
    }
}

pub type GlassboxResult<T> = Result<T, GlassboxError>;
