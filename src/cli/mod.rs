//! CLI-specific functionality
//!
//! Argument parsing and configuration discovery for the `throwaway` binary.

pub mod args;
pub mod config;

pub use args::{Args, display_command};
pub use config::{ConfigDiscovery, ConfigError, Settings};
