//! Service implementations
//!
//! Production adapters for the port traits. These perform the actual I/O:
//! child processes, the browser sidecar, the container CLI and the
//! filesystem.

pub mod browser_telemetry;
pub mod container_logs;
pub mod container_runtime;
pub mod playwright;
pub mod process_runner;
pub mod savepoint;
pub mod source_map;
pub mod trace_reader;

#[cfg(test)]
mod tests;

pub use browser_telemetry::{Capture, CaptureOptions, TelemetryCollector};
pub use container_logs::ContainerLogFetcher;
pub use container_runtime::DockerCli;
pub use playwright::PlaywrightEngine;
pub use process_runner::ShellProcessRunner;
pub use savepoint::ContainerSavepoints;
pub use source_map::SourceMapFiles;
pub use trace_reader::ZipTraceReader;
