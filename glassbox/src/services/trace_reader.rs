//! Trace archive reader
//!
//! The archive layout is the Playwright trace format: a zip holding an
//! NDJSON event stream under `trace` (older versions: `trace.trace`).
//! Reading is best-effort.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::traits::TraceReader;

const EVENT_ENTRIES: [&str; 2] = ["trace", "trace.trace"];

#[derive(Debug, Default)]
pub struct ZipTraceReader;

impl ZipTraceReader {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TraceReader for ZipTraceReader {
    async fn dom_snapshot_at(&self, trace_path: &Path, offset_ms: u64) -> Option<String> {
        if !tokio::fs::try_exists(trace_path).await.unwrap_or(false) {
            debug!(path = %trace_path.display(), "Trace archive missing");
            return None;
        }

        let path: PathBuf = trace_path.to_path_buf();
        let events = match tokio::task::spawn_blocking(move || read_events(&path)).await {
            Ok(Ok(events)) => events,
            Ok(Err(message)) => {
                debug!(path = %trace_path.display(), error = %message, "Trace archive unreadable");
                return None;
            }
            Err(e) => {
                debug!(error = %e, "Trace reader task failed");
                return None;
            }
        };
        Some(select_snapshot(&events, offset_ms))
    }
}

fn read_events(path: &Path) -> Result<Vec<Value>, String> {
    let file = File::open(path).map_err(|e| e.to_string())?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| e.to_string())?;

    let mut text = None;
    for name in EVENT_ENTRIES {
        if let Ok(mut entry) = archive.by_name(name) {
            let mut buf = String::new();
            entry.read_to_string(&mut buf).map_err(|e| e.to_string())?;
            text = Some(buf);
            break;
        }
    }
    let text = text.ok_or_else(|| "no event stream entry".to_string())?;

    Ok(text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .collect())
}

fn timestamp_of(event: &Value) -> Option<f64> {
    event
        .get("timestamp")
        .and_then(Value::as_f64)
        .or_else(|| event.get("ts").and_then(Value::as_f64))
}

fn snapshot_of(event: &Value) -> Option<&Value> {
    event.get("snapshot").filter(|snapshot| !snapshot.is_null())
}

fn render_snapshot(snapshot: &Value) -> String {
    match snapshot {
        Value::String(text) => text.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

/// Pick the snapshot closest to `offset_ms`.
///
/// Only events carrying both a snapshot and a timestamp compete; the first
/// seen wins a tie. Without any, the first snapshot at all is returned, and
/// without that a placeholder describing the trace.
pub fn select_snapshot(events: &[Value], offset_ms: u64) -> String {
    let target = offset_ms as f64;
    let mut best: Option<(f64, &Value)> = None;

    for event in events {
        let (Some(ts), Some(snapshot)) = (timestamp_of(event), snapshot_of(event)) else {
            continue;
        };
        let delta = (ts - target).abs();
        if best.map_or(true, |(best_delta, _)| delta < best_delta) {
            best = Some((delta, snapshot));
        }
    }
    if let Some((_, snapshot)) = best {
        return render_snapshot(snapshot);
    }

    if let Some(snapshot) = events.iter().find_map(snapshot_of) {
        debug!("No timestamped snapshot, using the first snapshot in the trace");
        return render_snapshot(snapshot);
    }

    format!(
        "Trace has {} events; no snapshot with timestamp found near {}ms. Open the trace in the Playwright trace viewer for full inspection.",
        events.len(),
        offset_ms
    )
}
