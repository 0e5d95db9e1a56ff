//! # throwaway
//!
//! Runs a command inside a disposable Linux container and cleans up after it.
//!
//! The run is a straight sequence of calls against a Docker-compatible daemon:
//! pull the image, create a container with two bind-mounted host directories
//! (`dir1` read-only at `/dir1`, `dir2` read-write at `/dir2`), start it, wait
//! for it to exit or for Ctrl-C, print its logs, then remove the container and
//! the image.
//!
//! ## Modules
//!
//! - **[`container`]**: daemon client, engine trait and the run orchestrator
//! - **[`cli`]**: argument parsing and configuration discovery
//! - **[`env`]**: defaults, file names and labels
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use throwaway::container::{ContainerClient, ContainerOrchestrator, OrchestratorConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = ContainerClient::new().await?;
//!     let orchestrator = ContainerOrchestrator::new(client, OrchestratorConfig::default());
//!
//!     let command = vec!["ls".to_string(), "/dir1".to_string()];
//!     let interrupts = futures::stream::pending::<()>();
//!     let report = orchestrator
//!         .run(&command, interrupts, &mut std::io::stdout(), &mut std::io::stderr())
//!         .await?;
//!
//!     println!("exit status {}", report.exit_code());
//!     Ok(())
//! }
//! ```

/// Container engine access and the run sequence.
pub mod container;

/// Command line interface.
pub mod cli;

/// Environment constants and path utilities.
pub mod env;

pub use container::{ContainerClient, ContainerOrchestrator, OrchestratorConfig, RunReport};
