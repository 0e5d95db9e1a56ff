//! Throwaway container orchestration.
//!
//! Runs one command in a fresh container: pull the image, create the
//! container with its bind mounts, start it, wait for it to stop (or for an
//! interrupt), print its logs, then remove the container and the image.

use crate::container::{
    ContainerConfig, ContainerEngine, ContainerError, LineBuffer, LogSource, Platform, Result,
    find_image_id,
};
use crate::env;
use futures::stream::{Stream, StreamExt};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::pin::{Pin, pin};
use tracing::{debug, info, warn};

/// Exit status reported after an interrupt, as a shell would for SIGINT.
pub const INTERRUPTED_EXIT_CODE: u8 = 130;

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Image to run the command in
    pub image: String,
    /// Platform to pull and create for (None lets the daemon pick)
    pub platform: Option<Platform>,
    /// Host directory mounted read-only
    pub input_dir: PathBuf,
    /// Container path of the read-only mount
    pub input_target: String,
    /// Host directory mounted read-write
    pub output_dir: PathBuf,
    /// Container path of the read-write mount
    pub output_target: String,
    /// Leave the image in place after the run
    pub keep_image: bool,
    /// Print the container's stderr as well as its stdout
    pub show_stderr: bool,
    /// Container name prefix
    pub name_prefix: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            image: env::DEFAULT_IMAGE.to_string(),
            platform: Some(Platform::linux(env::DEFAULT_ARCHITECTURE)),
            input_dir: PathBuf::from(env::DEFAULT_INPUT_DIR),
            input_target: env::DEFAULT_INPUT_TARGET.to_string(),
            output_dir: PathBuf::from(env::DEFAULT_OUTPUT_DIR),
            output_target: env::DEFAULT_OUTPUT_TARGET.to_string(),
            keep_image: false,
            show_stderr: false,
            name_prefix: env::CONTAINER_NAME_PREFIX.to_string(),
        }
    }
}

/// How the wait for the container ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The container stopped with this exit code
    Exited(i64),
    /// The user interrupted the wait
    Interrupted,
    /// The daemon failed while waiting
    DaemonError(String),
}

impl WaitOutcome {
    /// The line printed to stdout once the wait is over.
    pub fn message(&self) -> String {
        match self {
            WaitOutcome::Exited(code) => format!("(exited with {})", code),
            WaitOutcome::Interrupted => "(caught SIGINT)".to_string(),
            WaitOutcome::DaemonError(_) => "An error occurred with the docker daemon".to_string(),
        }
    }
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// ID of the (now removed) container
    pub container_id: String,
    /// How the wait ended
    pub outcome: WaitOutcome,
    /// Whether the image was removed
    pub image_removed: bool,
}

impl RunReport {
    /// Process exit status for this run.
    pub fn exit_code(&self) -> u8 {
        match &self.outcome {
            WaitOutcome::Exited(code) => u8::try_from(*code).unwrap_or(1),
            WaitOutcome::Interrupted => INTERRUPTED_EXIT_CODE,
            WaitOutcome::DaemonError(_) => 1,
        }
    }
}

/// Runs commands in throwaway containers on a [`ContainerEngine`].
pub struct ContainerOrchestrator<E> {
    engine: E,
    config: OrchestratorConfig,
}

impl<E: ContainerEngine> ContainerOrchestrator<E> {
    /// Create an orchestrator over an engine.
    pub fn new(engine: E, config: OrchestratorConfig) -> Self {
        Self { engine, config }
    }

    /// Get the underlying engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Get the configuration.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Build the container configuration for `command`.
    ///
    /// Host directories are resolved against the working directory and must
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns error if a host directory is missing or cannot be resolved.
    pub fn container_config(&self, command: &[String]) -> Result<ContainerConfig> {
        let input = resolve_host_dir(&self.config.input_dir)?;
        let output = resolve_host_dir(&self.config.output_dir)?;

        let mut builder = ContainerConfig::builder()
            .image(&self.config.image)
            .cmd(command.iter().cloned())
            .label(env::MANAGED_LABEL, "true")
            .mount(input, &self.config.input_target, true)
            .mount(output, &self.config.output_target, false);

        if let Some(platform) = &self.config.platform {
            builder = builder.platform(platform.clone());
        }

        builder.build()
    }

    /// Run `command` to completion in a new container.
    ///
    /// Each item of `interrupts` is one interrupt request. The first one
    /// during the pull aborts the run before a container exists. Once the
    /// container exists, an interrupt ends the wait early and a further one
    /// stops log printing; cleanup always runs. Container stdout lines go to
    /// `out`, stderr lines (when enabled) to `err`.
    ///
    /// # Errors
    ///
    /// Returns error if pulling, creating, starting, reading logs or cleanup
    /// fails, or [`ContainerError::Interrupted`] if interrupted during the
    /// pull. Once the container exists, removal of the container and the
    /// image is attempted before any error is returned.
    pub async fn run<S, O, W>(
        &self,
        command: &[String],
        interrupts: S,
        out: &mut O,
        err: &mut W,
    ) -> Result<RunReport>
    where
        S: Stream<Item = ()>,
        O: Write,
        W: Write,
    {
        let mut interrupts = pin!(interrupts);
        let container_config = self.container_config(command)?;
        self.pull(&mut interrupts).await?;

        let name = format!("{}-{}", self.config.name_prefix, uuid::Uuid::new_v4());
        let container_id = self
            .engine
            .create_container(&container_config, &name)
            .await?;

        match self
            .run_created(&container_id, &mut interrupts, out, err)
            .await
        {
            Ok(outcome) => {
                let image_removed = self.cleanup(&container_id).await?;
                Ok(RunReport {
                    container_id,
                    outcome,
                    image_removed,
                })
            }
            Err(e) => {
                warn!("Run failed, cleaning up container {}: {}", container_id, e);
                // Failures are already logged by cleanup
                let _ = self.cleanup(&container_id).await;
                Err(e)
            }
        }
    }

    /// Pull the image unless interrupted first.
    async fn pull<S>(&self, interrupts: &mut Pin<&mut S>) -> Result<()>
    where
        S: Stream<Item = ()>,
    {
        let platform = self.config.platform.as_ref().map(Platform::to_string);
        let pull = self
            .engine
            .pull_image(&self.config.image, platform.as_deref());

        tokio::select! {
            biased;
            result = pull => result,
            Some(()) = interrupts.next() => {
                info!("Interrupted while pulling {}", self.config.image);
                Err(ContainerError::Interrupted)
            }
        }
    }

    async fn run_created<S, O, W>(
        &self,
        container_id: &str,
        interrupts: &mut Pin<&mut S>,
        out: &mut O,
        err: &mut W,
    ) -> Result<WaitOutcome>
    where
        S: Stream<Item = ()>,
        O: Write,
        W: Write,
    {
        self.engine.start_container(container_id).await?;

        let outcome = self.watch(container_id, interrupts).await;
        writeln!(out, "{}", outcome.message())?;
        if let WaitOutcome::DaemonError(message) = &outcome {
            warn!("Waiting on container {} failed: {}", container_id, message);
        }

        self.dump_logs(container_id, interrupts, out, err).await?;
        Ok(outcome)
    }

    /// Wait for the container to stop running, or for an interrupt.
    ///
    /// An interrupt that arrived while the container was being created or
    /// started is still queued and ends the wait at once.
    async fn watch<S>(&self, container_id: &str, interrupts: &mut Pin<&mut S>) -> WaitOutcome
    where
        S: Stream<Item = ()>,
    {
        tokio::select! {
            biased;
            result = self.engine.wait_container(container_id) => match result {
                Ok(code) => {
                    debug!("Container {} exited with {}", container_id, code);
                    WaitOutcome::Exited(code)
                }
                Err(e) => WaitOutcome::DaemonError(e.to_string()),
            },
            Some(()) = interrupts.next() => {
                info!("Interrupted while waiting on container {}", container_id);
                WaitOutcome::Interrupted
            }
        }
    }

    /// Print the container's log line by line.
    ///
    /// An interrupt stops printing; whatever was already printed is kept.
    async fn dump_logs<S, O, W>(
        &self,
        container_id: &str,
        interrupts: &mut Pin<&mut S>,
        out: &mut O,
        err: &mut W,
    ) -> Result<()>
    where
        S: Stream<Item = ()>,
        O: Write,
        W: Write,
    {
        let mut stdout_lines = LineBuffer::new();
        let mut stderr_lines = LineBuffer::new();

        let mut stream = self
            .engine
            .container_logs(container_id, self.config.show_stderr);

        loop {
            let chunk = tokio::select! {
                biased;
                Some(()) = interrupts.next() => {
                    info!("Interrupted while printing logs of container {}", container_id);
                    break;
                }
                chunk = stream.next() => match chunk {
                    Some(chunk) => chunk?,
                    None => break,
                },
            };

            match chunk.source {
                LogSource::Stdout => {
                    for line in stdout_lines.push(&chunk.data) {
                        writeln!(out, "{}", line)?;
                    }
                }
                LogSource::Stderr => {
                    for line in stderr_lines.push(&chunk.data) {
                        writeln!(err, "{}", line)?;
                    }
                }
            }
        }

        if let Some(line) = stdout_lines.finish() {
            writeln!(out, "{}", line)?;
        }
        if let Some(line) = stderr_lines.finish() {
            writeln!(err, "{}", line)?;
        }

        out.flush()?;
        err.flush()?;
        Ok(())
    }

    /// Remove the container, then the image even if that failed.
    ///
    /// Returns whether the image was removed, or the first error.
    async fn cleanup(&self, container_id: &str) -> Result<bool> {
        let container = self.engine.remove_container(container_id, true).await;
        if let Err(e) = &container {
            warn!("Failed to remove container {}: {}", container_id, e);
        }

        let image = self.remove_image().await;
        if let Err(e) = &image {
            warn!("Failed to remove image {}: {}", self.config.image, e);
        }

        container?;
        image
    }

    /// Remove the pulled image by ID. Returns whether anything was removed.
    async fn remove_image(&self) -> Result<bool> {
        if self.config.keep_image {
            debug!("Keeping image {}", self.config.image);
            return Ok(false);
        }

        let images = self.engine.list_images().await?;
        match find_image_id(&images, &self.config.image) {
            Some(id) => {
                self.engine.remove_image(&id, true).await?;
                Ok(true)
            }
            None => {
                warn!(
                    "No local image tagged {}, skipping image removal",
                    self.config.image
                );
                Ok(false)
            }
        }
    }
}

/// Resolve a host directory to an absolute path for bind mounting.
fn resolve_host_dir(dir: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(dir)?;
    if !absolute.is_dir() {
        return Err(ContainerError::ConfigError(format!(
            "Host directory does not exist: {}",
            absolute.display()
        )));
    }
    Ok(absolute)
}
