//! Docker/Podman client wrapper.
//!
//! Connects to the daemon the way the Docker CLI does and implements
//! [`ContainerEngine`] on top of the bollard API.

use crate::container::{
    ContainerConfig, ContainerEngine, ContainerError, ImageInfo, LogChunk, Result,
};
use async_trait::async_trait;
use bollard::Docker;
use bollard::container::LogOutput;
use bollard::query_parameters::{
    CreateContainerOptionsBuilder, CreateImageOptionsBuilder, ListImagesOptions,
    LogsOptionsBuilder, RemoveContainerOptionsBuilder, RemoveImageOptionsBuilder,
    StartContainerOptions, WaitContainerOptionsBuilder,
};
use futures::stream::{BoxStream, StreamExt};
use std::sync::Arc;
use tracing::{debug, info};

/// Seconds bollard waits on a socket connection before giving up.
const SOCKET_TIMEOUT_SECS: u64 = 120;

/// Docker/Podman API client wrapper.
#[derive(Clone)]
pub struct ContainerClient {
    docker: Arc<Docker>,
}

impl ContainerClient {
    /// Connect to the container runtime and verify it answers.
    ///
    /// # Errors
    ///
    /// Returns error if neither Docker nor Podman are reachable.
    pub async fn new() -> Result<Self> {
        let docker = Self::connect()?;

        let client = Self {
            docker: Arc::new(docker),
        };

        client.ping().await?;

        Ok(client)
    }

    /// Connect to Docker or Podman daemon.
    ///
    /// Tries in order:
    /// 1. `DOCKER_HOST` and related environment, else the local default socket
    /// 2. Rootless Podman socket
    /// 3. System Podman socket
    fn connect() -> Result<Docker> {
        debug!("Attempting to connect to container runtime...");

        match Docker::connect_with_defaults() {
            Ok(docker) => {
                debug!("Connected to container runtime via environment defaults");
                return Ok(docker);
            }
            Err(e) => {
                debug!("Environment defaults failed: {}", e);
            }
        }

        #[cfg(unix)]
        {
            let mut sockets = Vec::new();
            if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
                sockets.push(format!("unix://{}/podman/podman.sock", runtime_dir));
            }
            if let Ok(home) = std::env::var("HOME") {
                sockets.push(format!("unix://{}/run/podman/podman.sock", home));
            }
            sockets.push("unix:///run/podman/podman.sock".to_string());

            for socket in sockets {
                debug!("Trying Podman socket: {}", socket);
                match Docker::connect_with_socket(
                    &socket,
                    SOCKET_TIMEOUT_SECS,
                    bollard::API_DEFAULT_VERSION,
                ) {
                    Ok(docker) => {
                        debug!("Connected to Podman via {}", socket);
                        return Ok(docker);
                    }
                    Err(e) => {
                        debug!("Podman socket {} failed: {}", socket, e);
                    }
                }
            }
        }

        Err(ContainerError::Other(
            "Failed to connect to Docker or Podman. \
             Please ensure Docker or Podman is installed and running."
                .to_string(),
        ))
    }

    /// Ping the container runtime to verify connectivity.
    ///
    /// # Errors
    ///
    /// Returns error if ping fails.
    pub async fn ping(&self) -> Result<()> {
        self.docker.ping().await.map_err(|e| {
            ContainerError::Other(format!("Failed to ping container runtime: {}", e))
        })?;
        debug!("Container runtime ping successful");
        Ok(())
    }

    /// Get version information from the container runtime.
    ///
    /// # Errors
    ///
    /// Returns error if version query fails.
    pub async fn version(&self) -> Result<bollard::models::SystemVersion> {
        self.docker
            .version()
            .await
            .map_err(|e| ContainerError::Other(format!("Failed to get version: {}", e)))
    }

    /// Check if the runtime is Docker or Podman.
    ///
    /// # Errors
    ///
    /// Returns error if runtime detection fails.
    pub async fn runtime_type(&self) -> Result<RuntimeType> {
        let version = self.version().await?;

        let is_podman = version
            .components
            .unwrap_or_default()
            .iter()
            .any(|c| c.name.to_lowercase().contains("podman"));

        if is_podman {
            Ok(RuntimeType::Podman)
        } else {
            Ok(RuntimeType::Docker)
        }
    }
}

#[async_trait]
impl ContainerEngine for ContainerClient {
    async fn pull_image(&self, image: &str, platform: Option<&str>) -> Result<()> {
        info!("Pulling image: {}", image);

        let mut options = CreateImageOptionsBuilder::default().from_image(image);
        if let Some(platform) = platform {
            options = options.platform(platform);
        }

        let mut stream = self.docker.create_image(Some(options.build()), None, None);

        while let Some(result) = stream.next().await {
            let info = result?;
            if let Some(error) = info.error {
                return Err(ContainerError::PullError {
                    image: image.to_string(),
                    message: error,
                });
            }
            if let Some(status) = info.status {
                debug!("Pull status: {}", status);
            }
            if let Some(progress) = info.progress {
                debug!("Pull progress: {}", progress);
            }
        }

        info!("Successfully pulled image: {}", image);
        Ok(())
    }

    async fn create_container(&self, config: &ContainerConfig, name: &str) -> Result<String> {
        let mut options = CreateContainerOptionsBuilder::default().name(name);
        if let Some(platform) = &config.platform {
            options = options.platform(&platform.to_string());
        }

        debug!("Creating container: {}", name);

        let response = self
            .docker
            .create_container(Some(options.build()), config.to_create_body())
            .await?;

        for warning in &response.warnings {
            debug!("Create warning: {}", warning);
        }

        info!("Created container: {} ({})", name, response.id);
        Ok(response.id)
    }

    async fn start_container(&self, container_id: &str) -> Result<()> {
        debug!("Starting container: {}", container_id);

        self.docker
            .start_container(container_id, None::<StartContainerOptions>)
            .await?;

        info!("Started container: {}", container_id);
        Ok(())
    }

    async fn wait_container(&self, container_id: &str) -> Result<i64> {
        let options = WaitContainerOptionsBuilder::default()
            .condition("not-running")
            .build();

        let mut stream = self.docker.wait_container(container_id, Some(options));

        match stream.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            // bollard reports a non-zero exit status as an error
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(ContainerError::ApiError(e)),
            None => Err(ContainerError::Other(format!(
                "Wait stream for container {} ended without a status",
                container_id
            ))),
        }
    }

    fn container_logs<'a>(
        &'a self,
        container_id: &'a str,
        include_stderr: bool,
    ) -> BoxStream<'a, Result<LogChunk>> {
        let options = LogsOptionsBuilder::default()
            .stdout(true)
            .stderr(include_stderr)
            .build();

        self.docker
            .logs(container_id, Some(options))
            .filter_map(|item| async move {
                match item {
                    Ok(LogOutput::StdOut { message }) | Ok(LogOutput::Console { message }) => {
                        Some(Ok(LogChunk::stdout(message.to_vec())))
                    }
                    Ok(LogOutput::StdErr { message }) => {
                        Some(Ok(LogChunk::stderr(message.to_vec())))
                    }
                    Ok(_) => None,
                    Err(e) => Some(Err(ContainerError::ApiError(e))),
                }
            })
            .boxed()
    }

    async fn remove_container(&self, container_id: &str, force: bool) -> Result<()> {
        debug!("Removing container: {}", container_id);

        let options = RemoveContainerOptionsBuilder::default()
            .force(force)
            .v(true)
            .build();

        self.docker
            .remove_container(container_id, Some(options))
            .await?;

        info!("Removed container: {}", container_id);
        Ok(())
    }

    async fn list_images(&self) -> Result<Vec<ImageInfo>> {
        let images = self
            .docker
            .list_images(None::<ListImagesOptions>)
            .await?;

        Ok(images
            .into_iter()
            .map(|img| ImageInfo {
                id: img.id,
                repo_tags: img.repo_tags,
            })
            .collect())
    }

    async fn remove_image(&self, image: &str, force: bool) -> Result<()> {
        info!("Removing image: {}", image);

        let options = RemoveImageOptionsBuilder::default().force(force).build();

        self.docker
            .remove_image(image, Some(options), None)
            .await
            .map_err(|e| match e {
                bollard::errors::Error::DockerResponseServerError {
                    status_code: 404, ..
                } => ContainerError::NotFound(image.to_string()),
                e => ContainerError::ApiError(e),
            })?;

        info!("Successfully removed image: {}", image);
        Ok(())
    }
}

/// Type of container runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeType {
    /// Docker runtime
    Docker,
    /// Podman runtime
    Podman,
}

impl std::fmt::Display for RuntimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeType::Docker => write!(f, "Docker"),
            RuntimeType::Podman => write!(f, "Podman"),
        }
    }
}
