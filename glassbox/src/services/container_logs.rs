//! Backend log fetcher

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::traits::{ContainerLogs, ContainerRuntime};

pub struct ContainerLogFetcher {
    runtime: Arc<dyn ContainerRuntime>,
    tail_lines: usize,
}

impl ContainerLogFetcher {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, tail_lines: usize) -> Self {
        Self { runtime, tail_lines }
    }
}

#[async_trait]
impl ContainerLogs for ContainerLogFetcher {
    async fn logs_since(
        &self,
        names: Vec<String>,
        since: DateTime<Utc>,
        correlation_id: Option<String>,
    ) -> Vec<String> {
        let fetches = names.iter().map(|name| async move {
            let result = self.runtime.logs(name, since, self.tail_lines).await;
            (name, result)
        });
        let results = join_all(fetches).await;

        let mut lines = Vec::new();
        for (name, result) in results {
            match result {
                Ok(raw) => {
                    let kept: Vec<String> = raw
                        .lines()
                        .map(str::trim)
                        .filter(|line| !line.is_empty())
                        .filter(|line| correlation_id.as_deref().map_or(true, |id| line.contains(id)))
                        .map(str::to_string)
                        .collect();
                    debug!(container = %name, lines = kept.len(), "Fetched container logs");
                    if !kept.is_empty() {
                        lines.push(format!("[{name}]"));
                        lines.extend(kept);
                    }
                }
                Err(e) => {
                    warn!(container = %name, error = %e, "Container log fetch failed");
                    lines.push(format!("[{name}] Error: {e}"));
                }
            }
        }
        lines
    }
}
