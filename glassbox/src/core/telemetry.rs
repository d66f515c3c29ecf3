//! Accumulation of browser events into a telemetry snapshot

use shared::{NetworkFailure, TelemetrySnapshot};

use crate::traits::BrowserEvent;

/// Ordered accumulator for the events of one capture window
#[derive(Debug, Default)]
pub struct TelemetryAccumulator {
    snapshot: TelemetrySnapshot,
}

impl TelemetryAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: BrowserEvent) {
        match event {
            BrowserEvent::Response {
                url,
                method,
                status,
                body,
            } => {
                if status >= 400 {
                    self.snapshot.network_failures.push(NetworkFailure {
                        url,
                        method,
                        status: Some(status),
                        response_body: body,
                    });
                }
            }
            BrowserEvent::RequestFailed { url, method, error } => {
                self.snapshot.network_failures.push(NetworkFailure {
                    url,
                    method,
                    status: None,
                    response_body: error,
                });
            }
            BrowserEvent::Console { kind, text } => {
                if kind == "error" || kind == "warning" {
                    self.snapshot.console_errors.push(format!("[{kind}] {text}"));
                }
            }
            BrowserEvent::PageError { message } => self.snapshot.page_errors.push(message),
        }
    }

    pub fn finish(self, accessibility_tree: Option<String>) -> TelemetrySnapshot {
        TelemetrySnapshot {
            accessibility_tree,
            ..self.snapshot
        }
    }
}
