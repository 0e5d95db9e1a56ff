//! The container engine seam.
//!
//! [`ContainerOrchestrator`](super::ContainerOrchestrator) only ever talks to
//! a [`ContainerEngine`]. [`ContainerClient`](super::ContainerClient) is the
//! bollard-backed implementation; tests plug in an in-memory one.

use crate::container::{ContainerConfig, Result};
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Which container stream a log frame came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSource {
    /// Container standard output
    Stdout,
    /// Container standard error
    Stderr,
}

/// One frame of container log output.
///
/// Frames follow the daemon's write boundaries, not line boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogChunk {
    /// Originating stream
    pub source: LogSource,
    /// Raw bytes of the frame
    pub data: Vec<u8>,
}

impl LogChunk {
    /// Create a stdout frame.
    pub fn stdout(data: impl Into<Vec<u8>>) -> Self {
        Self {
            source: LogSource::Stdout,
            data: data.into(),
        }
    }

    /// Create a stderr frame.
    pub fn stderr(data: impl Into<Vec<u8>>) -> Self {
        Self {
            source: LogSource::Stderr,
            data: data.into(),
        }
    }
}

/// Image information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    /// Image ID
    pub id: String,
    /// Repository tags
    pub repo_tags: Vec<String>,
}

/// Operations the run sequence needs from a Docker-compatible daemon.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Pull an image, draining the progress stream until it ends.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the stream reports a failure.
    async fn pull_image(&self, image: &str, platform: Option<&str>) -> Result<()>;

    /// Create a container and return its ID.
    ///
    /// # Errors
    ///
    /// Returns error if the daemon rejects the configuration.
    async fn create_container(&self, config: &ContainerConfig, name: &str) -> Result<String>;

    /// Start a created container.
    ///
    /// # Errors
    ///
    /// Returns error if the container cannot be started.
    async fn start_container(&self, container_id: &str) -> Result<()>;

    /// Block until the container is no longer running and return its exit code.
    ///
    /// # Errors
    ///
    /// Returns error if the daemon connection fails while waiting.
    async fn wait_container(&self, container_id: &str) -> Result<i64>;

    /// Stream the container's full log.
    fn container_logs<'a>(
        &'a self,
        container_id: &'a str,
        include_stderr: bool,
    ) -> BoxStream<'a, Result<LogChunk>>;

    /// Remove a container, killing it first when `force` is set.
    ///
    /// # Errors
    ///
    /// Returns error if removal fails.
    async fn remove_container(&self, container_id: &str, force: bool) -> Result<()>;

    /// List local images.
    ///
    /// # Errors
    ///
    /// Returns error if listing fails.
    async fn list_images(&self) -> Result<Vec<ImageInfo>>;

    /// Remove an image by ID or reference.
    ///
    /// # Errors
    ///
    /// Returns error if removal fails.
    async fn remove_image(&self, image: &str, force: bool) -> Result<()>;
}
