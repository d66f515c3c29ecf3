//! Test fixtures and data for engine tests

use chrono::Utc;
use glassbox::{BrowserEvent, BrowserSession, MockBrowserSession};
use shared::{ExecutionStatus, NetworkFailure, ProcessOutcome, RunId, RunRecord};
use tokio::sync::mpsc;

/// Standard test data and fixtures
pub struct TestFixtures;

impl TestFixtures {
    pub const COMMAND: &'static str = "npm run test:e2e";
    pub const TRACE_ID: &'static str = "req_0badf00d";

    pub fn outcome_ok() -> ProcessOutcome {
        ProcessOutcome::exited(0, 1200)
    }

    pub fn outcome_failed() -> ProcessOutcome {
        ProcessOutcome::exited(3, 900)
    }

    /// Events a failing checkout page typically produces
    pub fn checkout_events() -> Vec<BrowserEvent> {
        vec![
            BrowserEvent::Response {
                url: "http://app.local/api/cart".to_string(),
                method: "POST".to_string(),
                status: 500,
                body: Some("x".repeat(1200)),
            },
            BrowserEvent::Response {
                url: "http://app.local/api/session".to_string(),
                method: "GET".to_string(),
                status: 401,
                body: Some("unauthorized".to_string()),
            },
            BrowserEvent::RequestFailed {
                url: "http://cdn.local/font.woff2".to_string(),
                method: "GET".to_string(),
                error: Some("net::ERR_NAME_NOT_RESOLVED".to_string()),
            },
            BrowserEvent::Console {
                kind: "error".to_string(),
                text: "TypeError: cart is undefined at http://app.local/assets/app.js:12:7".to_string(),
            },
            BrowserEvent::Console {
                kind: "info".to_string(),
                text: "render done".to_string(),
            },
            BrowserEvent::PageError {
                message: "Unhandled rejection".to_string(),
            },
        ]
    }

    /// Backend lines as the log fetcher returns them
    pub fn backend_lines() -> Vec<String> {
        vec![
            "[backend]".to_string(),
            "INFO request started req_0badf00d".to_string(),
            "ERROR cart write failed req_0badf00d".to_string(),
            "WARN slow query".to_string(),
            "[db]".to_string(),
            "ERROR deadlock detected".to_string(),
        ]
    }

    /// A session that replays `events` and must be closed exactly once
    pub fn session_with(events: Vec<BrowserEvent>) -> Box<dyn BrowserSession> {
        let mut session = MockBrowserSession::new();
        let (tx, rx) = mpsc::unbounded_channel();
        for event in events {
            let _ = tx.send(event);
        }
        drop(tx);

        session.expect_subscribe().return_once(move || Ok(rx));
        session.expect_set_correlation_header().returning(|_| Ok(()));
        session.expect_start_tracing().returning(|| Ok(()));
        session.expect_stop_tracing().returning(|_| Ok(()));
        session.expect_accessibility_tree().returning(|| Ok(None));
        session.expect_close().times(1).returning(|| Ok(()));
        Box::new(session)
    }

    pub fn stored_run(id: &str) -> RunRecord {
        RunRecord {
            run_id: RunId::from(id),
            status: ExecutionStatus::Failed,
            exit_code: 1,
            execution_time_ms: 100,
            browser_console_errors: vec!["[error] boom".to_string()],
            network_failures: vec![NetworkFailure {
                url: "http://app.local/api/cart".to_string(),
                method: "POST".to_string(),
                status: Some(500),
                response_body: Some("0123456789".to_string()),
            }],
            page_errors: vec![],
            backend_container_logs: Self::backend_lines(),
            accessibility_tree: None,
            started_at: Utc::now(),
            trace_id: None,
            trace_path: None,
        }
    }
}
