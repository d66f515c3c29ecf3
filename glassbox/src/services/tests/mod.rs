//! Service-specific tests
//!
//! One file per service adapter. Adapters that shell out are driven through
//! mocked ports or real `sh` invocations; nothing here needs a browser or a
//! container daemon.

mod source_map;

// Common test utilities for services
pub mod common {
    use std::time::Duration;

    use tokio::sync::mpsc;

    use crate::traits::{BrowserEvent, MockBrowserSession};

    /// Upper bound for operations that are expected to finish promptly
    pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

    /// Helper to run async operations with timeout
    pub async fn with_timeout<T, F>(future: F) -> Result<T, tokio::time::error::Elapsed>
    where
        F: std::future::Future<Output = T>,
    {
        tokio::time::timeout(TEST_TIMEOUT, future).await
    }

    /// A session that replays `events` and accepts every command.
    /// `close` must be called exactly once.
    pub fn scripted_session(events: Vec<BrowserEvent>) -> MockBrowserSession {
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
        session
    }
}
