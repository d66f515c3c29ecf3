//! Orchestration use cases
//!
//! `Glassbox` composes the ports into the call patterns the CLI exposes:
//! full-telemetry execution, summarized execution with deferred queries,
//! deterministic scenarios, trace correlation and DOM time-travel.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use shared::filtering::{
    filter_backend_logs_by_level, filter_network_for_summary, truncate_failure, truncate_network_bodies,
};
use shared::{
    run_debug, run_info, run_warn, CorrelationId, FullTelemetry, FullTelemetryReport, LevelSelection,
    ProcessOutcome, QueryData, ResolvedError, RunId, RunRecord, RunSummary, ScenarioReport, SummaryCounts,
    SummaryReport, TelemetryQuery, TelemetrySnapshot, TraceCorrelation,
};

use crate::config::GlassboxConfig;
use crate::core::{find_artifact_position, InMemoryRunStore};
use crate::error::{GlassboxError, GlassboxResult};
use crate::services::{
    CaptureOptions, ContainerLogFetcher, ContainerSavepoints, DockerCli, PlaywrightEngine, ShellProcessRunner,
    SourceMapFiles, TelemetryCollector, ZipTraceReader,
};
use crate::traits::{
    BrowserEngine, Capabilities, ContainerLogs, ContainerRuntime, ProcessRunner, RunStore, SavepointManager,
    SourceMapResolver, TraceReader,
};

/// Ports every engine instance has
#[derive(Clone)]
pub struct Ports {
    pub process_runner: Arc<dyn ProcessRunner>,
    pub browser: Arc<dyn BrowserEngine>,
    pub container_logs: Arc<dyn ContainerLogs>,
    pub trace_reader: Arc<dyn TraceReader>,
    pub run_store: Arc<dyn RunStore>,
}

/// Optional ports, decided once at construction
#[derive(Clone, Default)]
pub struct Extensions {
    pub savepoints: Option<Arc<dyn SavepointManager>>,
    pub source_maps: Option<Arc<dyn SourceMapResolver>>,
}

#[derive(Debug, Clone, Default)]
pub struct ExecuteRequest {
    pub entry_command: String,
    pub target_containers: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SummaryRequest {
    pub entry_command: String,
    pub target_containers: Vec<String>,
    /// Generated when absent
    pub run_id: Option<RunId>,
    pub correlation_id: Option<CorrelationId>,
    pub trace_path: Option<PathBuf>,
    pub truncate_body_chars: Option<usize>,
    pub backend_log_levels: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct ScenarioRequest {
    pub entry_command: String,
    pub target_containers: Vec<String>,
    pub restore_savepoint_after: bool,
    pub savepoint_name: Option<String>,
    pub truncate_body_chars: Option<usize>,
    pub backend_log_levels: Option<Vec<String>>,
}

pub struct Glassbox {
    config: GlassboxConfig,
    ports: Ports,
    extensions: Extensions,
    collector: TelemetryCollector,
}

impl Glassbox {
    pub fn new(config: GlassboxConfig, ports: Ports, extensions: Extensions) -> Self {
        let collector = TelemetryCollector::new(Arc::clone(&ports.browser), config.collector_max_run);
        Self {
            config,
            ports,
            extensions,
            collector,
        }
    }

    pub fn builder(config: GlassboxConfig) -> GlassboxBuilder {
        GlassboxBuilder::new(config)
    }

    pub fn config(&self) -> &GlassboxConfig {
        &self.config
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            savepoints: self.extensions.savepoints.is_some(),
            source_maps: self.extensions.source_maps.is_some(),
        }
    }

    /// Run the command and return everything observed, without storing it
    pub async fn execute_with_telemetry(&self, request: ExecuteRequest) -> GlassboxResult<FullTelemetryReport> {
        require_command(&request.entry_command)?;
        let record = self
            .capture_run(RunId::new(), &request.entry_command, &request.target_containers, CaptureOptions::default())
            .await?;

        Ok(FullTelemetryReport {
            status: record.status,
            exit_code: record.exit_code,
            execution_time_ms: record.execution_time_ms,
            telemetry: FullTelemetry {
                browser_console_errors: record.browser_console_errors,
                network_failures: record.network_failures,
                page_errors: record.page_errors,
                backend_container_logs: record.backend_container_logs,
            },
        })
    }

    /// Run the command, store the full telemetry and return a compact summary
    pub async fn run_and_summarize(&self, request: SummaryRequest) -> GlassboxResult<SummaryReport> {
        require_command(&request.entry_command)?;
        let run_id = request.run_id.clone().unwrap_or_default();
        let options = CaptureOptions {
            max_run: None,
            correlation_id: request.correlation_id.clone(),
            trace_path: request.trace_path.clone(),
        };
        let record = self
            .capture_run(run_id.clone(), &request.entry_command, &request.target_containers, options)
            .await?;

        let max_chars = request
            .truncate_body_chars
            .filter(|chars| *chars > 0)
            .unwrap_or(self.config.truncate_body_chars);
        let levels = request
            .backend_log_levels
            .as_deref()
            .unwrap_or(&self.config.backend_log_levels);

        let network_failures = filter_network_for_summary(&record.network_failures, max_chars);
        let backend_logs = filter_backend_logs_by_level(&record.backend_container_logs, levels);
        let resolved_errors = self.resolve_error_positions(&record).await;

        let summary = RunSummary {
            run_id: run_id.clone(),
            status: record.status,
            exit_code: record.exit_code,
            execution_time_ms: record.execution_time_ms,
            counts: SummaryCounts {
                network_failures: network_failures.len(),
                console_errors: record.browser_console_errors.len(),
                page_errors: record.page_errors.len(),
                backend_warn_error_lines: backend_logs.len(),
            },
            accessibility_tree: record.accessibility_tree.clone(),
            resolved_errors,
            network_failures,
            console_errors: record.browser_console_errors.clone(),
            page_errors: record.page_errors.clone(),
            backend_logs,
        };

        self.ports.run_store.put(run_id.clone(), record);
        run_info!(run_id, status = %summary.status, "Run stored");
        Ok(SummaryReport { run_id, summary })
    }

    /// Read a stored run, reduced by the truncation and level policy
    pub fn query_telemetry(&self, run_id: &RunId, query: &TelemetryQuery) -> GlassboxResult<QueryData> {
        let data = self.ports.run_store.query(run_id, query)?;
        let max_chars = query
            .truncate_body_chars
            .filter(|chars| *chars > 0)
            .unwrap_or(self.config.truncate_body_chars);

        Ok(match data {
            QueryData::Network { network_failures } => QueryData::Network {
                network_failures: truncate_network_bodies(&network_failures, max_chars),
            },
            QueryData::Request(failure) => {
                QueryData::Request(failure.map(|failure| truncate_failure(&failure, max_chars)))
            }
            QueryData::Backend { backend_logs } => QueryData::Backend {
                backend_logs: match &query.backend_log_levels {
                    Some(LevelSelection::Full) => backend_logs,
                    Some(LevelSelection::Levels(levels)) => filter_backend_logs_by_level(&backend_logs, levels),
                    None => filter_backend_logs_by_level(&backend_logs, &self.config.backend_log_levels),
                },
            },
            other => other,
        })
    }

    /// Run with a fresh correlation id and trace, optionally restoring a
    /// savepoint afterwards
    pub async fn run_deterministic_scenario(&self, request: ScenarioRequest) -> GlassboxResult<ScenarioReport> {
        require_command(&request.entry_command)?;
        let restore = if request.restore_savepoint_after {
            let name = request
                .savepoint_name
                .as_deref()
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .ok_or_else(|| GlassboxError::invalid_input("restore_savepoint_after requires a savepoint_name"))?;
            let savepoints = self.require_savepoints()?;
            Some((savepoints, name.to_string()))
        } else {
            None
        };

        let run_id = RunId::new();
        let trace_id = CorrelationId::generate();
        let trace_dir = self.config.trace_dir_for(&run_id);
        tokio::fs::create_dir_all(&trace_dir).await?;
        let trace_path = trace_dir.join("trace.zip");
        run_info!(run_id, trace_id = %trace_id, path = %trace_path.display(), "Starting deterministic scenario");

        let report = self
            .run_and_summarize(SummaryRequest {
                entry_command: request.entry_command,
                target_containers: request.target_containers,
                run_id: Some(run_id.clone()),
                correlation_id: Some(trace_id.clone()),
                trace_path: Some(trace_path),
                truncate_body_chars: request.truncate_body_chars,
                backend_log_levels: request.backend_log_levels,
            })
            .await?;

        if let Some((savepoints, name)) = restore {
            savepoints.restore_savepoint(&name).await?;
            run_info!(run_id, savepoint = %name, "Savepoint restored after scenario");
        }

        Ok(ScenarioReport {
            passed: report.summary.status.is_ok(),
            run_id,
            trace_id,
            exit_code: report.summary.exit_code,
            execution_time_ms: report.summary.execution_time_ms,
        })
    }

    /// Fuse one traced request across browser and backend
    pub fn inspect_trace_correlation(&self, run_id: &RunId, trace_id: &CorrelationId) -> GlassboxResult<TraceCorrelation> {
        if trace_id.as_str().trim().is_empty() {
            return Err(GlassboxError::invalid_input("trace_id must not be empty"));
        }
        let record = self.stored_run(run_id)?;
        let backend_logs = record
            .backend_container_logs
            .iter()
            .filter(|line| line.contains(trace_id.as_str()))
            .cloned()
            .collect();

        Ok(TraceCorrelation {
            run_id: run_id.clone(),
            trace_id: trace_id.clone(),
            console_errors: record.browser_console_errors,
            backend_logs,
            network_failures: record.network_failures,
        })
    }

    /// DOM snapshot of a stored run's trace nearest `offset_ms`
    pub async fn dom_snapshot_at(&self, run_id: &RunId, offset_ms: u64) -> GlassboxResult<String> {
        let record = self.stored_run(run_id)?;
        let trace_path = record
            .trace_path
            .ok_or_else(|| GlassboxError::TraceNotRecorded { run_id: run_id.clone() })?;
        self.snapshot_from_trace(PathBuf::from(trace_path), offset_ms).await
    }

    /// DOM snapshot of any trace archive nearest `offset_ms`
    pub async fn snapshot_from_trace(&self, trace_path: PathBuf, offset_ms: u64) -> GlassboxResult<String> {
        self.ports
            .trace_reader
            .dom_snapshot_at(&trace_path, offset_ms)
            .await
            .ok_or_else(|| GlassboxError::SnapshotUnavailable {
                path: trace_path.display().to_string(),
            })
    }

    pub async fn create_savepoint(&self, name: &str) -> GlassboxResult<String> {
        let name = require_savepoint_name(name)?;
        self.require_savepoints()?.create_savepoint(name).await?;
        Ok(format!("Savepoint '{name}' created."))
    }

    pub async fn restore_savepoint(&self, name: &str) -> GlassboxResult<String> {
        let name = require_savepoint_name(name)?;
        self.require_savepoints()?.restore_savepoint(name).await?;
        Ok(format!("Savepoint '{name}' restored."))
    }

    pub async fn list_savepoints(&self) -> GlassboxResult<Vec<String>> {
        self.require_savepoints()?.list_savepoints().await
    }

    fn require_savepoints(&self) -> GlassboxResult<Arc<dyn SavepointManager>> {
        self.extensions
            .savepoints
            .clone()
            .ok_or(GlassboxError::SavepointNotConfigured)
    }

    fn stored_run(&self, run_id: &RunId) -> GlassboxResult<RunRecord> {
        self.ports
            .run_store
            .get(run_id)
            .ok_or_else(|| GlassboxError::RunNotFound { run_id: run_id.clone() })
    }

    /// One capture window followed by backend log retrieval.
    ///
    /// A collector timeout becomes a TIMEOUT run with an empty snapshot;
    /// spawn and launch failures are returned as errors.
    async fn capture_run(
        &self,
        run_id: RunId,
        command: &str,
        target_containers: &[String],
        options: CaptureOptions,
    ) -> GlassboxResult<RunRecord> {
        let started_at = Utc::now();
        let runner = Arc::clone(&self.ports.process_runner);
        let timeout = self.config.execute_timeout;
        let owned_command = command.to_string();
        run_info!(run_id, command, "Starting run");

        let captured = self
            .collector
            .run_and_collect(
                move |cancel| async move { runner.run(&owned_command, timeout, cancel).await },
                options.clone(),
            )
            .await;
        let (outcome, snapshot, trace_path) = match captured {
            Ok(capture) => (capture.result, capture.snapshot, options.trace_path),
            Err(GlassboxError::CaptureTimeout { after_ms }) => {
                // The trace is only flushed when the window closes normally
                run_warn!(run_id, after_ms, "Capture window timed out");
                (ProcessOutcome::timed_out(after_ms), TelemetrySnapshot::default(), None)
            }
            Err(e) => return Err(e),
        };

        let names = container_names(target_containers);
        let backend_logs = if names.is_empty() {
            Vec::new()
        } else {
            let correlation = options.correlation_id.as_ref().map(ToString::to_string);
            self.ports
                .container_logs
                .logs_since(names, started_at, correlation)
                .await
        };

        let record = RunRecord::assemble(run_id, &outcome, snapshot, backend_logs, started_at).with_trace(
            options.correlation_id,
            trace_path.map(|path| path.display().to_string()),
        );
        run_debug!(record.run_id, exit_code = record.exit_code, "Run captured");
        Ok(record)
    }

    async fn resolve_error_positions(&self, record: &RunRecord) -> Vec<ResolvedError> {
        let Some(resolver) = &self.extensions.source_maps else {
            return Vec::new();
        };

        let mut resolved = Vec::new();
        for message in record.browser_console_errors.iter().chain(&record.page_errors) {
            let Some(position) = find_artifact_position(message) else {
                continue;
            };
            if let Some(original) = resolver
                .resolve(&position.artifact, position.line, position.column)
                .await
            {
                resolved.push(ResolvedError {
                    original: message.clone(),
                    source: original.source,
                    line: original.line,
                    column: Some(original.column),
                });
            }
        }
        resolved
    }
}

fn require_command(command: &str) -> GlassboxResult<()> {
    if command.trim().is_empty() {
        return Err(GlassboxError::invalid_input("entry_command must not be empty"));
    }
    Ok(())
}

fn require_savepoint_name(name: &str) -> GlassboxResult<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(GlassboxError::invalid_input("savepoint name must not be empty"));
    }
    Ok(name)
}

/// Container names with blanks removed
fn container_names(names: &[String]) -> Vec<String> {
    names
        .iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Wires the base ports and the optional extensions.
///
/// Any port not supplied explicitly gets its production adapter, built from
/// the configuration.
pub struct GlassboxBuilder {
    config: GlassboxConfig,
    process_runner: Option<Arc<dyn ProcessRunner>>,
    browser: Option<Arc<dyn BrowserEngine>>,
    container_runtime: Option<Arc<dyn ContainerRuntime>>,
    container_logs: Option<Arc<dyn ContainerLogs>>,
    trace_reader: Option<Arc<dyn TraceReader>>,
    run_store: Option<Arc<dyn RunStore>>,
    savepoints: Option<Arc<dyn SavepointManager>>,
    source_maps: Option<Arc<dyn SourceMapResolver>>,
}

impl GlassboxBuilder {
    pub fn new(config: GlassboxConfig) -> Self {
        Self {
            config,
            process_runner: None,
            browser: None,
            container_runtime: None,
            container_logs: None,
            trace_reader: None,
            run_store: None,
            savepoints: None,
            source_maps: None,
        }
    }

    pub fn with_process_runner(mut self, runner: Arc<dyn ProcessRunner>) -> Self {
        self.process_runner = Some(runner);
        self
    }

    pub fn with_browser(mut self, browser: Arc<dyn BrowserEngine>) -> Self {
        self.browser = Some(browser);
        self
    }

    /// Runtime used by the default log fetcher and savepoint manager
    pub fn with_container_runtime(mut self, runtime: Arc<dyn ContainerRuntime>) -> Self {
        self.container_runtime = Some(runtime);
        self
    }

    pub fn with_container_logs(mut self, logs: Arc<dyn ContainerLogs>) -> Self {
        self.container_logs = Some(logs);
        self
    }

    pub fn with_trace_reader(mut self, reader: Arc<dyn TraceReader>) -> Self {
        self.trace_reader = Some(reader);
        self
    }

    pub fn with_run_store(mut self, store: Arc<dyn RunStore>) -> Self {
        self.run_store = Some(store);
        self
    }

    pub fn with_savepoints(mut self, savepoints: Arc<dyn SavepointManager>) -> Self {
        self.savepoints = Some(savepoints);
        self
    }

    pub fn with_source_maps(mut self, resolver: Arc<dyn SourceMapResolver>) -> Self {
        self.source_maps = Some(resolver);
        self
    }

    pub fn build(self) -> Glassbox {
        let config = self.config;
        let runtime: Arc<dyn ContainerRuntime> = self
            .container_runtime
            .unwrap_or_else(|| Arc::new(DockerCli::new(config.container_cli.clone())));

        let ports = Ports {
            process_runner: self
                .process_runner
                .unwrap_or_else(|| Arc::new(ShellProcessRunner::new())),
            browser: self.browser.unwrap_or_else(|| {
                Arc::new(PlaywrightEngine::new(config.node_bin.clone(), config.playwright_dir.clone()))
            }),
            container_logs: self
                .container_logs
                .unwrap_or_else(|| Arc::new(ContainerLogFetcher::new(Arc::clone(&runtime), config.log_tail_lines))),
            trace_reader: self.trace_reader.unwrap_or_else(|| Arc::new(ZipTraceReader::new())),
            run_store: self
                .run_store
                .unwrap_or_else(|| Arc::new(InMemoryRunStore::new(config.run_store_capacity))),
        };

        let savepoints = self.savepoints.or_else(|| {
            config.savepoint_container.as_ref().map(|container| {
                Arc::new(ContainerSavepoints::new(Arc::clone(&runtime), container.clone())) as Arc<dyn SavepointManager>
            })
        });
        let source_maps = self.source_maps.or_else(|| {
            config
                .source_map_base_path
                .as_ref()
                .map(|base| Arc::new(SourceMapFiles::new(base.clone())) as Arc<dyn SourceMapResolver>)
        });

        Glassbox::new(config, ports, Extensions { savepoints, source_maps })
    }
}
