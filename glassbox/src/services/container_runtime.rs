//! Container runtime over the docker CLI

use std::process::Output;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::process::Command;
use tracing::debug;

use crate::error::{GlassboxError, GlassboxResult};
use crate::traits::ContainerRuntime;

/// Seconds a container gets to stop gracefully
const STOP_GRACE_SECS: u32 = 10;

pub struct DockerCli {
    binary: String,
}

impl DockerCli {
    /// `binary` is `docker` or a compatible CLI such as `podman`
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn exec(&self, operation: &str, container: &str, args: &[&str]) -> GlassboxResult<Output> {
        debug!(cli = %self.binary, ?args, "Running container command");
        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .map_err(|e| GlassboxError::Container {
                operation: operation.to_string(),
                container: container.to_string(),
                message: format!("failed to run {}: {}", self.binary, e),
            })?;

        if output.status.success() {
            Ok(output)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(GlassboxError::Container {
                operation: operation.to_string(),
                container: container.to_string(),
                message: if stderr.is_empty() {
                    format!("exited with {}", output.status)
                } else {
                    stderr
                },
            })
        }
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn stop(&self, container: &str) -> GlassboxResult<()> {
        let grace = STOP_GRACE_SECS.to_string();
        self.exec("stop", container, &["stop", "-t", &grace, container])
            .await
            .map(|_| ())
    }

    async fn start(&self, container: &str) -> GlassboxResult<()> {
        self.exec("start", container, &["start", container]).await.map(|_| ())
    }

    async fn remove(&self, container: &str) -> GlassboxResult<()> {
        self.exec("rm", container, &["rm", "-f", container]).await.map(|_| ())
    }

    async fn commit(&self, container: &str, image: &str) -> GlassboxResult<()> {
        self.exec("commit", container, &["commit", container, image])
            .await
            .map(|_| ())
    }

    async fn create(&self, container: &str, image: &str) -> GlassboxResult<()> {
        self.exec("create", container, &["create", "--name", container, image])
            .await
            .map(|_| ())
    }

    async fn logs(&self, container: &str, since: DateTime<Utc>, tail: usize) -> GlassboxResult<String> {
        let since = since.timestamp().to_string();
        let tail = tail.to_string();
        let output = self
            .exec("logs", container, &["logs", "--since", &since, "--tail", &tail, container])
            .await?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.is_empty() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&stderr);
        }
        Ok(text)
    }

    async fn image_tags(&self, repository: &str) -> GlassboxResult<Vec<String>> {
        let output = self
            .exec("images", repository, &["images", repository, "--format", "{{.Tag}}"])
            .await?;
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|tag| !tag.is_empty() && *tag != "<none>")
            .map(str::to_string)
            .collect())
    }
}
