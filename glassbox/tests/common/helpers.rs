//! Test helpers and builder patterns for engine tests

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ::glassbox::*;
use shared::{ProcessOutcome, RunId};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use super::fixtures::TestFixtures;

/// Builder for engines over mocked ports with sensible defaults.
///
/// A port that is not configured gets a permissive default: the command
/// exits 0, every browser session is quiet, containers have no logs and no
/// trace is readable. The run store is the real in-memory store.
pub struct GlassboxTestBuilder {
    config: GlassboxConfig,
    trace_root: TempDir,
    process_runner: Option<Arc<dyn ProcessRunner>>,
    browser: Option<MockBrowserEngine>,
    container_logs: Option<MockContainerLogs>,
    trace_reader: Option<MockTraceReader>,
    savepoints: Option<MockSavepointManager>,
    source_maps: Option<MockSourceMapResolver>,
}

impl GlassboxTestBuilder {
    pub fn new() -> Self {
        let trace_root = tempfile::tempdir().expect("temp dir");
        let config = GlassboxConfig {
            trace_root: trace_root.path().to_path_buf(),
            collector_max_run: Duration::from_secs(5),
            ..GlassboxConfig::default()
        };
        Self {
            config,
            trace_root,
            process_runner: None,
            browser: None,
            container_logs: None,
            trace_reader: None,
            savepoints: None,
            source_maps: None,
        }
    }

    /// Adjust the configuration
    pub fn with_config<F>(mut self, setup: F) -> Self
    where
        F: FnOnce(&mut GlassboxConfig),
    {
        setup(&mut self.config);
        self
    }

    /// Configure the process runner mock with a setup function
    pub fn with_process_runner<F>(mut self, setup: F) -> Self
    where
        F: FnOnce(&mut MockProcessRunner),
    {
        let mut runner = MockProcessRunner::new();
        setup(&mut runner);
        self.process_runner = Some(Arc::new(runner));
        self
    }

    /// Use a hand-written process runner
    pub fn with_runner_impl(mut self, runner: Arc<dyn ProcessRunner>) -> Self {
        self.process_runner = Some(runner);
        self
    }

    /// Runner that always finishes with `outcome`
    pub fn with_outcome(self, outcome: ProcessOutcome) -> Self {
        self.with_process_runner(move |runner| {
            runner.expect_run().returning(move |_, _, _| Ok(outcome.clone()));
        })
    }

    /// Configure the browser engine mock with a setup function
    pub fn with_browser<F>(mut self, setup: F) -> Self
    where
        F: FnOnce(&mut MockBrowserEngine),
    {
        let mut browser = MockBrowserEngine::new();
        setup(&mut browser);
        self.browser = Some(browser);
        self
    }

    /// Every launched session replays `events`
    pub fn with_browser_events(self, events: Vec<BrowserEvent>) -> Self {
        self.with_browser(move |browser| {
            browser
                .expect_launch()
                .returning(move || Ok(TestFixtures::session_with(events.clone())));
        })
    }

    /// Configure the container logs mock with a setup function
    pub fn with_container_logs<F>(mut self, setup: F) -> Self
    where
        F: FnOnce(&mut MockContainerLogs),
    {
        let mut logs = MockContainerLogs::new();
        setup(&mut logs);
        self.container_logs = Some(logs);
        self
    }

    /// Configure the trace reader mock with a setup function
    pub fn with_trace_reader<F>(mut self, setup: F) -> Self
    where
        F: FnOnce(&mut MockTraceReader),
    {
        let mut reader = MockTraceReader::new();
        setup(&mut reader);
        self.trace_reader = Some(reader);
        self
    }

    /// Wire the savepoint extension
    pub fn with_savepoints<F>(mut self, setup: F) -> Self
    where
        F: FnOnce(&mut MockSavepointManager),
    {
        let mut savepoints = MockSavepointManager::new();
        setup(&mut savepoints);
        self.savepoints = Some(savepoints);
        self
    }

    /// Wire the source map extension
    pub fn with_source_maps<F>(mut self, setup: F) -> Self
    where
        F: FnOnce(&mut MockSourceMapResolver),
    {
        let mut resolver = MockSourceMapResolver::new();
        setup(&mut resolver);
        self.source_maps = Some(resolver);
        self
    }

    /// Build the engine. The returned `TempDir` owns the trace root.
    pub fn build(self) -> (Glassbox, TempDir) {
        let process_runner = self.process_runner.unwrap_or_else(|| {
            let mut runner = MockProcessRunner::new();
            runner
                .expect_run()
                .returning(|_, _, _| Ok(TestFixtures::outcome_ok()));
            Arc::new(runner)
        });
        let browser = self.browser.unwrap_or_else(|| {
            let mut browser = MockBrowserEngine::new();
            browser
                .expect_launch()
                .returning(|| Ok(TestFixtures::session_with(Vec::new())));
            browser
        });
        let container_logs = self.container_logs.unwrap_or_else(|| {
            let mut logs = MockContainerLogs::new();
            logs.expect_logs_since().returning(|_, _, _| Vec::new());
            logs
        });
        let trace_reader = self.trace_reader.unwrap_or_else(|| {
            let mut reader = MockTraceReader::new();
            reader.expect_dom_snapshot_at().returning(|_, _| None);
            reader
        });

        let mut builder = Glassbox::builder(self.config)
            .with_process_runner(process_runner)
            .with_browser(Arc::new(browser))
            .with_container_logs(Arc::new(container_logs))
            .with_trace_reader(Arc::new(trace_reader));
        if let Some(savepoints) = self.savepoints {
            builder = builder.with_savepoints(Arc::new(savepoints));
        }
        if let Some(source_maps) = self.source_maps {
            builder = builder.with_source_maps(Arc::new(source_maps));
        }
        (builder.build(), self.trace_root)
    }
}

impl Default for GlassboxTestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Runner whose command never finishes unless cancelled
pub struct HangingProcessRunner;

#[async_trait]
impl ProcessRunner for HangingProcessRunner {
    async fn run(
        &self,
        _command: &str,
        _timeout: Option<Duration>,
        cancel: CancellationToken,
    ) -> GlassboxResult<ProcessOutcome> {
        cancel.cancelled().await;
        std::future::pending().await
    }
}

/// Helper functions for common test operations
pub struct TestHelpers;

impl TestHelpers {
    /// Engine with every port at its default
    pub fn simple_engine() -> (Glassbox, TempDir) {
        GlassboxTestBuilder::new().build()
    }

    pub fn summary_request(containers: &[&str]) -> SummaryRequest {
        SummaryRequest {
            entry_command: TestFixtures::COMMAND.to_string(),
            target_containers: containers.iter().map(|c| c.to_string()).collect(),
            ..SummaryRequest::default()
        }
    }

    pub fn scenario_request(containers: &[&str]) -> ScenarioRequest {
        ScenarioRequest {
            entry_command: TestFixtures::COMMAND.to_string(),
            target_containers: containers.iter().map(|c| c.to_string()).collect(),
            ..ScenarioRequest::default()
        }
    }

    /// Summarize a run and return its id
    pub async fn stored_run_id(engine: &Glassbox) -> RunId {
        engine
            .run_and_summarize(Self::summary_request(&["backend"]))
            .await
            .expect("run should be summarized")
            .run_id
    }
}
