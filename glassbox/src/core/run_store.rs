//! Bounded in-memory run store
//!
//! Keeps the full telemetry of the most recent runs. Eviction is strict FIFO
//! by first insertion; re-putting an existing id replaces its value without
//! moving it in the eviction order.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use shared::{QueryData, QueryKind, RunId, RunRecord, TelemetryQuery};
use tracing::debug;

use crate::error::{GlassboxError, GlassboxResult};
use crate::traits::RunStore;

pub struct InMemoryRunStore {
    capacity: usize,
    inner: Mutex<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    /// Insertion order, oldest first
    order: VecDeque<RunId>,
    runs: HashMap<RunId, Arc<RunRecord>>,
}

impl InMemoryRunStore {
    /// Capacity is clamped to at least one entry
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            inner: Mutex::new(StoreInner {
                order: VecDeque::with_capacity(capacity),
                runs: HashMap::with_capacity(capacity),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, run_id: &RunId) -> Option<Arc<RunRecord>> {
        self.inner.lock().runs.get(run_id).cloned()
    }
}

impl RunStore for InMemoryRunStore {
    fn put(&self, run_id: RunId, record: RunRecord) {
        let record = Arc::new(record);
        let mut inner = self.inner.lock();

        if let Some(existing) = inner.runs.get_mut(&run_id) {
            *existing = record;
            return;
        }

        while inner.order.len() >= self.capacity {
            match inner.order.pop_front() {
                Some(oldest) => {
                    inner.runs.remove(&oldest);
                    debug!(run_id = %oldest, "Evicted run from store");
                }
                None => break,
            }
        }
        inner.order.push_back(run_id.clone());
        inner.runs.insert(run_id, record);
    }

    fn get(&self, run_id: &RunId) -> Option<RunRecord> {
        self.lookup(run_id).map(|record| record.as_ref().clone())
    }

    fn query(&self, run_id: &RunId, query: &TelemetryQuery) -> GlassboxResult<QueryData> {
        let record = self
            .lookup(run_id)
            .ok_or_else(|| GlassboxError::RunNotFound { run_id: run_id.clone() })?;
        Ok(project(&record, query))
    }
}

/// Project one stored run according to the query kind
pub fn project(record: &RunRecord, query: &TelemetryQuery) -> QueryData {
    match query.kind {
        QueryKind::FullTelemetry => QueryData::Full(Box::new(record.clone())),
        QueryKind::NetworkByStatus => QueryData::Network {
            network_failures: record
                .network_failures
                .iter()
                .filter(|failure| query.status.map_or(true, |status| failure.status == Some(status)))
                .cloned()
                .collect(),
        },
        QueryKind::NetworkRequestFull => QueryData::Request(
            record
                .network_failures
                .iter()
                .find(|failure| {
                    query
                        .request_url
                        .as_deref()
                        .map_or(true, |url| failure.url == url)
                })
                .cloned(),
        ),
        QueryKind::ConsoleErrors => QueryData::Console {
            console_errors: record.browser_console_errors.clone(),
        },
        QueryKind::BackendLogs => QueryData::Backend {
            backend_logs: record.backend_container_logs.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shared::{ExecutionStatus, NetworkFailure};

    fn sample_run(id: &str) -> RunRecord {
        RunRecord {
            run_id: RunId::from(id),
            status: ExecutionStatus::Failed,
            exit_code: 1,
            execution_time_ms: 100,
            browser_console_errors: vec!["[error] err1".to_string()],
            network_failures: vec![
                NetworkFailure {
                    url: "https://a".to_string(),
                    method: "GET".to_string(),
                    status: Some(403),
                    response_body: Some("Forbidden".to_string()),
                },
                NetworkFailure {
                    url: "https://b".to_string(),
                    method: "POST".to_string(),
                    status: Some(500),
                    response_body: Some("Server error".to_string()),
                },
            ],
            page_errors: vec![],
            backend_container_logs: vec!["[backend]".to_string(), "[ERROR] something".to_string()],
            accessibility_tree: None,
            started_at: Utc::now(),
            trace_id: None,
            trace_path: None,
        }
    }

    #[test]
    fn test_put_then_get() {
        let store = InMemoryRunStore::new(10);
        let run = sample_run("run-1");
        store.put(RunId::from("run-1"), run.clone());

        assert_eq!(store.get(&RunId::from("run-1")), Some(run));
        assert_eq!(store.get(&RunId::from("run-2")), None);
    }

    #[test]
    fn test_fifo_eviction_drops_exactly_the_oldest() {
        let store = InMemoryRunStore::new(3);
        for id in ["a", "b", "c", "d"] {
            store.put(RunId::from(id), sample_run(id));
        }

        assert!(store.get(&RunId::from("a")).is_none());
        for id in ["b", "c", "d"] {
            assert!(store.get(&RunId::from(id)).is_some(), "{id} should survive");
        }
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_reput_does_not_reorder_eviction() {
        let store = InMemoryRunStore::new(3);
        for id in ["a", "b", "c"] {
            store.put(RunId::from(id), sample_run(id));
        }

        let mut replaced = sample_run("a");
        replaced.exit_code = 42;
        store.put(RunId::from("a"), replaced);
        assert_eq!(store.get(&RunId::from("a")).unwrap().exit_code, 42);
        assert_eq!(store.len(), 3);

        // "a" keeps its original position, so it is still the oldest
        store.put(RunId::from("d"), sample_run("d"));
        assert!(store.get(&RunId::from("a")).is_none());
        assert!(store.get(&RunId::from("b")).is_some());
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let store = InMemoryRunStore::new(0);
        assert_eq!(store.capacity(), 1);
        store.put(RunId::from("a"), sample_run("a"));
        store.put(RunId::from("b"), sample_run("b"));
        assert!(store.get(&RunId::from("a")).is_none());
        assert!(store.get(&RunId::from("b")).is_some());
    }

    #[test]
    fn test_query_missing_run_names_the_id() {
        let store = InMemoryRunStore::new(10);
        let err = store
            .query(&RunId::from("missing"), &TelemetryQuery::new(QueryKind::ConsoleErrors))
            .unwrap_err();
        assert!(matches!(err, GlassboxError::RunNotFound { .. }));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_network_by_status_projection() {
        let store = InMemoryRunStore::new(10);
        store.put(RunId::from("run-1"), sample_run("run-1"));

        let query = TelemetryQuery::new(QueryKind::NetworkByStatus).with_status(403);
        match store.query(&RunId::from("run-1"), &query).unwrap() {
            QueryData::Network { network_failures } => {
                assert_eq!(network_failures.len(), 1);
                assert_eq!(network_failures[0].url, "https://a");
            }
            other => panic!("unexpected projection: {other:?}"),
        }

        let all = TelemetryQuery::new(QueryKind::NetworkByStatus);
        match store.query(&RunId::from("run-1"), &all).unwrap() {
            QueryData::Network { network_failures } => assert_eq!(network_failures.len(), 2),
            other => panic!("unexpected projection: {other:?}"),
        }
    }

    #[test]
    fn test_network_request_full_projection() {
        let record = sample_run("run-1");

        let by_url = TelemetryQuery::new(QueryKind::NetworkRequestFull).with_request_url("https://b");
        assert_eq!(
            project(&record, &by_url),
            QueryData::Request(Some(record.network_failures[1].clone()))
        );

        let first = TelemetryQuery::new(QueryKind::NetworkRequestFull);
        assert_eq!(
            project(&record, &first),
            QueryData::Request(Some(record.network_failures[0].clone()))
        );

        let unknown = TelemetryQuery::new(QueryKind::NetworkRequestFull).with_request_url("https://zzz");
        assert_eq!(project(&record, &unknown), QueryData::Request(None));
    }

    #[test]
    fn test_concurrent_puts_keep_capacity() {
        let store = Arc::new(InMemoryRunStore::new(8));
        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for n in 0..50 {
                        let id = format!("w{worker}-{n}");
                        store.put(RunId::from(id.as_str()), sample_run(&id));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 8);
    }
}
