//! Test-execution telemetry engine
//!
//! Runs an end-to-end test command while a browser session records console,
//! network and page errors, pulls backend container logs for the same
//! window, and keeps the full telemetry of recent runs for later, bounded
//! queries. Savepoints and source-map resolution are optional extensions.

pub mod config;
pub mod core;
pub mod error;
pub mod glassbox;
pub mod services;
pub mod traits;

// Re-export commonly used types
pub use config::{ConfigArgs, GlassboxConfig};
pub use core::InMemoryRunStore;
pub use error::{GlassboxError, GlassboxResult};
pub use glassbox::{
    ExecuteRequest, Extensions, Glassbox, GlassboxBuilder, Ports, ScenarioRequest, SummaryRequest,
};
pub use traits::*;
