//! Telemetry collector
//!
//! Opens one isolated browser session per call, records everything the page
//! reports while a unit of work runs, and always closes the session before
//! returning.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use shared::{CorrelationId, TelemetrySnapshot};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::TelemetryAccumulator;
use crate::error::{GlassboxError, GlassboxResult};
use crate::traits::{BrowserEngine, BrowserEvent, BrowserSession};

/// Per-call capture settings
#[derive(Debug, Clone, Default)]
pub struct CaptureOptions {
    /// Bound on the unit of work; zero or `None` uses the collector default
    pub max_run: Option<Duration>,
    pub correlation_id: Option<CorrelationId>,
    pub trace_path: Option<PathBuf>,
}

/// What one capture window produced
#[derive(Debug)]
pub struct Capture<T> {
    pub snapshot: TelemetrySnapshot,
    pub result: T,
}

pub struct TelemetryCollector {
    engine: Arc<dyn BrowserEngine>,
    default_max_run: Duration,
}

impl TelemetryCollector {
    pub fn new(engine: Arc<dyn BrowserEngine>, default_max_run: Duration) -> Self {
        Self {
            engine,
            default_max_run,
        }
    }

    /// Run `work` inside a capture window.
    ///
    /// `work` receives a token that is cancelled when the window times out.
    /// A timeout is reported as `CaptureTimeout`; errors from `work` itself
    /// are passed through unchanged.
    pub async fn run_and_collect<F, Fut, T>(&self, work: F, options: CaptureOptions) -> GlassboxResult<Capture<T>>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = GlassboxResult<T>>,
    {
        let mut session = self.engine.launch().await?;
        debug!("Browser session opened");

        let outcome = self.capture(session.as_mut(), work, &options).await;

        if let Err(e) = session.close().await {
            warn!(error = %e, "Browser session close failed");
        } else {
            debug!("Browser session closed");
        }
        outcome
    }

    async fn capture<F, Fut, T>(
        &self,
        session: &mut dyn BrowserSession,
        work: F,
        options: &CaptureOptions,
    ) -> GlassboxResult<Capture<T>>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = GlassboxResult<T>>,
    {
        let mut events = session.subscribe()?;
        if let Some(correlation_id) = &options.correlation_id {
            session.set_correlation_header(correlation_id).await?;
        }
        if options.trace_path.is_some() {
            session.start_tracing().await?;
        }

        let max_run = options
            .max_run
            .filter(|limit| !limit.is_zero())
            .unwrap_or(self.default_max_run);
        let cancel = CancellationToken::new();
        let mut accumulator = TelemetryAccumulator::new();

        let work = work(cancel.child_token());
        tokio::pin!(work);
        let deadline = tokio::time::sleep(max_run);
        tokio::pin!(deadline);
        let mut listening = true;

        let result = loop {
            tokio::select! {
                result = &mut work => break result,
                _ = &mut deadline => {
                    cancel.cancel();
                    let after_ms = u64::try_from(max_run.as_millis()).unwrap_or(u64::MAX);
                    warn!(after_ms, "Telemetry capture timed out");
                    return Err(GlassboxError::CaptureTimeout { after_ms });
                }
                event = events.recv(), if listening => match event {
                    Some(event) => accumulator.record(event),
                    None => listening = false,
                },
            }
        };
        drain(&mut events, &mut accumulator);
        let result = result?;

        if let Some(path) = &options.trace_path {
            session.stop_tracing(path).await?;
            info!(path = %path.display(), "Trace recorded");
        }

        let accessibility_tree = match session.accessibility_tree().await {
            Ok(tree) => tree.map(|root| root.render()),
            Err(e) => {
                debug!(error = %e, "Accessibility snapshot unavailable");
                None
            }
        };

        Ok(Capture {
            snapshot: accumulator.finish(accessibility_tree),
            result,
        })
    }
}

fn drain(events: &mut mpsc::UnboundedReceiver<BrowserEvent>, accumulator: &mut TelemetryAccumulator) {
    while let Ok(event) = events.try_recv() {
        accumulator.record(event);
    }
}
