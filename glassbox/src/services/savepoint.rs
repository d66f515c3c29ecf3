//! Container savepoints
//!
//! A savepoint is a committed image of one container. Externally mounted
//! volumes are not part of the image and are not restored.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::{GlassboxError, GlassboxResult};
use crate::traits::{ContainerRuntime, SavepointManager};

/// Image repository holding savepoint images
pub const SAVEPOINT_REPOSITORY: &str = "glassbox_savepoint";

/// Map a savepoint name onto a valid image tag
pub fn sanitize_tag(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

pub struct ContainerSavepoints {
    runtime: Arc<dyn ContainerRuntime>,
    container: String,
}

impl ContainerSavepoints {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, container: impl Into<String>) -> Self {
        Self {
            runtime,
            container: container.into(),
        }
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    fn image_for(name: &str) -> String {
        format!("{SAVEPOINT_REPOSITORY}:{}", sanitize_tag(name))
    }
}

#[async_trait]
impl SavepointManager for ContainerSavepoints {
    async fn create_savepoint(&self, name: &str) -> GlassboxResult<()> {
        let image = Self::image_for(name);
        info!(container = %self.container, image = %image, "Creating savepoint");

        self.runtime.stop(&self.container).await?;
        if let Err(e) = self.runtime.commit(&self.container, &image).await {
            // Bring the container back before reporting the failed commit
            if let Err(restart) = self.runtime.start(&self.container).await {
                warn!(container = %self.container, error = %restart, "Restart after failed commit also failed");
            }
            return Err(GlassboxError::Savepoint {
                name: name.to_string(),
                message: e.to_string(),
            });
        }
        self.runtime.start(&self.container).await?;

        info!(container = %self.container, image = %image, "Savepoint created");
        Ok(())
    }

    async fn restore_savepoint(&self, name: &str) -> GlassboxResult<()> {
        let tag = sanitize_tag(name);
        let tags = self.runtime.image_tags(SAVEPOINT_REPOSITORY).await?;
        if !tags.iter().any(|existing| *existing == tag) {
            return Err(GlassboxError::Savepoint {
                name: name.to_string(),
                message: format!("no image {SAVEPOINT_REPOSITORY}:{tag}"),
            });
        }

        let image = Self::image_for(name);
        info!(container = %self.container, image = %image, "Restoring savepoint");
        self.runtime.stop(&self.container).await?;
        self.runtime.remove(&self.container).await?;
        self.runtime.create(&self.container, &image).await?;
        self.runtime.start(&self.container).await?;

        info!(container = %self.container, image = %image, "Savepoint restored");
        Ok(())
    }

    async fn list_savepoints(&self) -> GlassboxResult<Vec<String>> {
        self.runtime.image_tags(SAVEPOINT_REPOSITORY).await
    }
}
