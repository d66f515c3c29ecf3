//! Playwright browser engine
//!
//! Each session is a Node sidecar driving one headless Chromium. The sidecar
//! writes one JSON message per line on stdout (page events and command
//! replies) and reads one JSON command per line on stdin.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};
use shared::CorrelationId;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{GlassboxError, GlassboxResult};
use crate::traits::{AccessibilityNode, BrowserEngine, BrowserEvent, BrowserSession};

/// Header carrying the correlation id on every outgoing request
pub const TRACE_HEADER: &str = "X-Agent-Trace-Id";

const LAUNCH_TIMEOUT: Duration = Duration::from_secs(30);
const COMMAND_TIMEOUT: Duration = Duration::from_secs(60);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

const SIDECAR_SCRIPT: &str = r#"
const readline = require('readline');
const { chromium } = require('playwright');
const emit = (msg) => process.stdout.write(JSON.stringify(msg) + '\n');
const describe = (err) => String((err && err.message) || err);

(async () => {
  let browser;
  try {
    browser = await chromium.launch({ headless: true });
  } catch (err) {
    emit({ event: 'fatal', message: describe(err) });
    process.exit(1);
  }
  const context = await browser.newContext();
  const page = await context.newPage();

  page.on('requestfailed', (request) => {
    const failure = request.failure();
    emit({ event: 'request_failed', url: request.url(), method: request.method(), error: failure ? failure.errorText : null });
  });
  page.on('response', async (response) => {
    const status = response.status();
    if (status < 400) return;
    let body = null;
    try { body = await response.text(); } catch (_) { body = null; }
    emit({ event: 'response', url: response.url(), method: response.request().method(), status, body });
  });
  page.on('console', (msg) => emit({ event: 'console', kind: msg.type(), text: msg.text() }));
  page.on('pageerror', (err) => emit({ event: 'page_error', message: err.message }));

  const toNode = (node) => node ? {
    role: node.role || null,
    name: node.name || null,
    value: node.value == null ? null : String(node.value),
    children: (node.children || []).map(toNode),
  } : null;

  const handlers = {
    intercept: (cmd) => page.route('**/*', (route) =>
      route.continue({ headers: { ...route.request().headers(), [cmd.header]: cmd.value } })),
    trace_start: () => context.tracing.start({ screenshots: true, snapshots: true }),
    trace_stop: (cmd) => context.tracing.stop({ path: cmd.path }),
    a11y: async () => ({ a11y: toNode(await page.accessibility.snapshot()) }),
    close: () => browser.close(),
  };

  const rl = readline.createInterface({ input: process.stdin });
  rl.on('line', async (line) => {
    let cmd;
    try { cmd = JSON.parse(line); } catch (_) { return; }
    const handler = handlers[cmd.op];
    try {
      if (!handler) throw new Error('unknown op ' + cmd.op);
      const extra = await handler(cmd);
      emit({ event: 'reply', id: cmd.id, ok: true, ...(extra && extra.a11y !== undefined ? extra : {}) });
    } catch (err) {
      emit({ event: 'reply', id: cmd.id, ok: false, error: describe(err) });
    }
    if (cmd.op === 'close') process.exit(0);
  });
  rl.on('close', async () => {
    try { await browser.close(); } finally { process.exit(0); }
  });
  emit({ event: 'ready' });
})();
"#;

/// Reply to one sidecar command
#[derive(Debug, Deserialize)]
struct Reply {
    id: u64,
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    a11y: Option<AccessibilityNode>,
}

type PendingReplies = Arc<Mutex<HashMap<u64, oneshot::Sender<Reply>>>>;

pub struct PlaywrightEngine {
    node_bin: String,
    playwright_dir: PathBuf,
}

impl PlaywrightEngine {
    pub fn new(node_bin: impl Into<String>, playwright_dir: impl Into<PathBuf>) -> Self {
        Self {
            node_bin: node_bin.into(),
            playwright_dir: playwright_dir.into(),
        }
    }
}

#[async_trait]
impl BrowserEngine for PlaywrightEngine {
    async fn launch(&self) -> GlassboxResult<Box<dyn BrowserSession>> {
        let mut child = Command::new(&self.node_bin)
            .arg("-e")
            .arg(SIDECAR_SCRIPT)
            .current_dir(&self.playwright_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| GlassboxError::BrowserLaunch {
                message: format!("failed to start {}: {}", self.node_bin, e),
            })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(GlassboxError::BrowserLaunch {
                message: "sidecar stdio not captured".to_string(),
            });
        };

        let pending: PendingReplies = Arc::new(Mutex::new(HashMap::new()));
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();
        let reader = tokio::spawn(read_sidecar(stdout, Arc::clone(&pending), events_tx, ready_tx));

        let ready = tokio::time::timeout(LAUNCH_TIMEOUT, ready_rx).await;
        let launch_error = match ready {
            Ok(Ok(Ok(()))) => None,
            Ok(Ok(Err(message))) => Some(message),
            Ok(Err(_)) => Some("sidecar exited before it was ready".to_string()),
            Err(_) => Some(format!("sidecar not ready after {}s", LAUNCH_TIMEOUT.as_secs())),
        };
        if let Some(message) = launch_error {
            reader.abort();
            let _ = child.start_kill();
            return Err(GlassboxError::BrowserLaunch { message });
        }

        Ok(Box::new(PlaywrightSession {
            child,
            stdin,
            next_id: 0,
            pending,
            events: Some(events_rx),
            reader,
            closed: false,
        }))
    }
}

async fn read_sidecar(
    stdout: ChildStdout,
    pending: PendingReplies,
    events: mpsc::UnboundedSender<BrowserEvent>,
    ready: oneshot::Sender<Result<(), String>>,
) {
    let mut ready = Some(ready);
    let mut lines = BufReader::new(stdout).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let Ok(message) = serde_json::from_str::<Value>(&line) else {
            debug!(line = %line, "Ignoring non-JSON sidecar output");
            continue;
        };
        match message.get("event").and_then(Value::as_str) {
            Some("ready") => {
                if let Some(tx) = ready.take() {
                    let _ = tx.send(Ok(()));
                }
            }
            Some("fatal") => {
                let text = message
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("browser launch failed")
                    .to_string();
                warn!(error = %text, "Browser sidecar reported a fatal error");
                if let Some(tx) = ready.take() {
                    let _ = tx.send(Err(text));
                }
            }
            Some("reply") => match serde_json::from_value::<Reply>(message) {
                Ok(reply) => {
                    let waiter = pending.lock().remove(&reply.id);
                    if let Some(tx) = waiter {
                        let _ = tx.send(reply);
                    }
                }
                Err(e) => debug!(error = %e, "Malformed sidecar reply"),
            },
            _ => match serde_json::from_value::<BrowserEvent>(message) {
                Ok(event) => {
                    let _ = events.send(event);
                }
                Err(e) => debug!(error = %e, "Unrecognised sidecar event"),
            },
        }
    }

    // Dropping the senders fails every outstanding command
    pending.lock().clear();
    if let Some(tx) = ready.take() {
        let _ = tx.send(Err("sidecar exited before it was ready".to_string()));
    }
}

pub struct PlaywrightSession {
    child: Child,
    stdin: ChildStdin,
    next_id: u64,
    pending: PendingReplies,
    events: Option<mpsc::UnboundedReceiver<BrowserEvent>>,
    reader: JoinHandle<()>,
    closed: bool,
}

impl PlaywrightSession {
    async fn request(&mut self, op: &str, mut command: Value) -> GlassboxResult<Reply> {
        if self.closed {
            return Err(GlassboxError::browser("session already closed"));
        }
        self.next_id += 1;
        let id = self.next_id;
        command["op"] = json!(op);
        command["id"] = json!(id);

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        let mut line = serde_json::to_string(&command)?;
        line.push('\n');
        if let Err(e) = self.stdin.write_all(line.as_bytes()).await {
            self.pending.lock().remove(&id);
            return Err(GlassboxError::browser(format!("{op}: sidecar unreachable: {e}")));
        }
        self.stdin.flush().await?;

        let reply = match tokio::time::timeout(COMMAND_TIMEOUT, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => return Err(GlassboxError::browser(format!("{op}: sidecar exited"))),
            Err(_) => {
                self.pending.lock().remove(&id);
                return Err(GlassboxError::browser(format!("{op}: no reply from sidecar")));
            }
        };
        if reply.ok {
            Ok(reply)
        } else {
            Err(GlassboxError::browser(format!(
                "{op}: {}",
                reply.error.as_deref().unwrap_or("command failed")
            )))
        }
    }
}

#[async_trait]
impl BrowserSession for PlaywrightSession {
    fn subscribe(&mut self) -> GlassboxResult<mpsc::UnboundedReceiver<BrowserEvent>> {
        self.events
            .take()
            .ok_or_else(|| GlassboxError::browser("event stream already taken"))
    }

    async fn set_correlation_header(&mut self, correlation_id: &CorrelationId) -> GlassboxResult<()> {
        self.request("intercept", json!({ "header": TRACE_HEADER, "value": correlation_id.as_str() }))
            .await
            .map(|_| ())
    }

    async fn start_tracing(&mut self) -> GlassboxResult<()> {
        self.request("trace_start", json!({})).await.map(|_| ())
    }

    async fn stop_tracing(&mut self, path: &Path) -> GlassboxResult<()> {
        self.request("trace_stop", json!({ "path": path.to_string_lossy() }))
            .await
            .map(|_| ())
    }

    async fn accessibility_tree(&mut self) -> GlassboxResult<Option<AccessibilityNode>> {
        self.request("a11y", json!({})).await.map(|reply| reply.a11y)
    }

    async fn close(&mut self) -> GlassboxResult<()> {
        if self.closed {
            return Ok(());
        }
        if let Err(e) = self.request("close", json!({})).await {
            debug!(error = %e, "Sidecar close command failed");
        }
        self.closed = true;

        if tokio::time::timeout(CLOSE_TIMEOUT, self.child.wait()).await.is_err() {
            warn!("Browser sidecar did not exit, killing it");
            self.child.kill().await?;
        }
        self.reader.abort();
        Ok(())
    }
}
