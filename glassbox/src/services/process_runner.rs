//! Shell process runner
//!
//! Runs the test command in its own process group so a timeout can kill the
//! shell together with everything it spawned.

use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use shared::{ProcessOutcome, SIGKILL_EXIT_CODE};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{GlassboxError, GlassboxResult};
use crate::traits::ProcessRunner;

pub struct ShellProcessRunner {
    shell: String,
}

impl ShellProcessRunner {
    pub fn new() -> Self {
        Self {
            shell: "sh".to_string(),
        }
    }

    /// Use a different POSIX shell (fluent API)
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }
}

impl Default for ShellProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessRunner for ShellProcessRunner {
    async fn run(
        &self,
        command: &str,
        timeout: Option<Duration>,
        cancel: CancellationToken,
    ) -> GlassboxResult<ProcessOutcome> {
        let started = Instant::now();

        // stdout is reserved for JSON results, so the child writes to stderr
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(std::io::stderr())
            .stderr(std::io::stderr())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|e| GlassboxError::ProcessSpawn {
            command: command.to_string(),
            message: e.to_string(),
        })?;
        let mut guard = ProcessGroupGuard::new(child.id());
        info!(pid = ?child.id(), command, "Started test command");

        let timer = async {
            match timeout.filter(|t| !t.is_zero()) {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            status = child.wait() => {
                guard.disarm();
                let status = status?;
                let outcome = outcome_from_status(status, elapsed_ms(started));
                info!(exit_code = outcome.exit_code, duration_ms = outcome.duration_ms, "Test command exited");
                Ok(outcome)
            }
            _ = timer => {
                guard.kill();
                let duration_ms = elapsed_ms(started);
                let _ = child.start_kill();
                let _ = child.wait().await;
                warn!(duration_ms, "Test command timed out, process group killed");
                Ok(ProcessOutcome::timed_out(duration_ms))
            }
            _ = cancel.cancelled() => {
                guard.kill();
                let duration_ms = elapsed_ms(started);
                let _ = child.start_kill();
                let _ = child.wait().await;
                warn!(duration_ms, "Test command cancelled, process group killed");
                Ok(ProcessOutcome {
                    exit_code: SIGKILL_EXIT_CODE,
                    duration_ms,
                    killed: true,
                    timed_out: false,
                })
            }
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn outcome_from_status(status: ExitStatus, duration_ms: u64) -> ProcessOutcome {
    if let Some(code) = status.code() {
        return ProcessOutcome::exited(code, duration_ms);
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            let exit_code = if signal == nix::sys::signal::Signal::SIGKILL as i32 {
                SIGKILL_EXIT_CODE
            } else {
                1
            };
            return ProcessOutcome {
                exit_code,
                duration_ms,
                killed: true,
                timed_out: false,
            };
        }
    }

    ProcessOutcome::exited(1, duration_ms)
}

/// Kills the child's process group unless disarmed, including when the
/// owning future is dropped mid-run.
struct ProcessGroupGuard {
    pgid: Option<u32>,
}

impl ProcessGroupGuard {
    fn new(pgid: Option<u32>) -> Self {
        Self { pgid }
    }

    fn disarm(&mut self) {
        self.pgid = None;
    }

    fn kill(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            kill_process_group(pgid);
        }
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(unix)]
fn kill_process_group(pgid: u32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pgid) else {
        return;
    };
    match killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        Ok(()) => debug!(pgid, "Sent SIGKILL to process group"),
        Err(e) => debug!(pgid, error = %e, "Process group already gone"),
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pgid: u32) {}
