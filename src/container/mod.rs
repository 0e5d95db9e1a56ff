//! Container engine access and the throwaway run sequence.
//!
//! Everything that talks to Docker/Podman lives here. The daemon does the
//! real work; this module marshals arguments into bollard calls and drains
//! the responses.
//!
//! ## Architecture
//!
//! - [`client`]: connection to the Docker/Podman daemon, implements [`ContainerEngine`]
//! - [`engine`]: the [`ContainerEngine`] trait the run sequence is written against
//! - [`config`]: container configuration builder and [`Platform`] parsing
//! - [`image`]: image reference helpers used during cleanup
//! - [`logs`]: splitting log frames back into lines
//! - [`orchestrator`]: pull, create, start, wait, print logs, remove
//!
//! ## Usage
//!
//! ```rust,no_run
//! use throwaway::container::{ContainerClient, ContainerOrchestrator, OrchestratorConfig};
//! use tokio::signal::unix::{SignalKind, signal};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Listen before anything is created so no Ctrl-C is missed
//!     let mut sigint = signal(SignalKind::interrupt())?;
//!     let interrupts = futures::stream::poll_fn(move |cx| sigint.poll_recv(cx));
//!
//!     let client = ContainerClient::new().await?;
//!     let orchestrator = ContainerOrchestrator::new(client, OrchestratorConfig::default());
//!
//!     let command = vec!["echo".to_string(), "hello".to_string()];
//!     let report = orchestrator
//!         .run(&command, interrupts, &mut std::io::stdout(), &mut std::io::stderr())
//!         .await?;
//!
//!     std::process::exit(report.exit_code().into());
//! }
//! ```

mod client;
mod config;
mod engine;
mod image;
mod logs;
mod orchestrator;

pub use client::{ContainerClient, RuntimeType};
pub use config::{BindMount, ContainerConfig, ContainerConfigBuilder, Platform};
pub use engine::{ContainerEngine, ImageInfo, LogChunk, LogSource};
pub use image::{find_image_id, normalize_reference};
pub use logs::LineBuffer;
pub use orchestrator::{
    ContainerOrchestrator, INTERRUPTED_EXIT_CODE, OrchestratorConfig, RunReport, WaitOutcome,
};

/// Container runtime errors.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    /// Docker/Podman API error
    #[error("Container API error: {0}")]
    ApiError(#[from] bollard::errors::Error),

    /// Container or image not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Container configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Image pull reported a failure in its progress stream
    #[error("Pull failed for {image}: {message}")]
    PullError { image: String, message: String },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Interrupted before a container was created
    #[error("Interrupted before the container was created")]
    Interrupted,

    /// General error
    #[error("Container error: {0}")]
    Other(String),
}

/// Result type for container operations.
pub type Result<T> = std::result::Result<T, ContainerError>;
