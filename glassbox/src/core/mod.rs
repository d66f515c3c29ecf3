//! Core engine logic
//!
//! Pure, deterministic pieces with no I/O dependencies.

pub mod run_store;
pub mod source_position;
pub mod telemetry;

pub use run_store::InMemoryRunStore;
pub use source_position::{artifact_relative_path, find_artifact_position, ArtifactPosition};
pub use telemetry::TelemetryAccumulator;
