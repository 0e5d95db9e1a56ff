//! Command line argument parsing
//!
//! `throwaway [OPTIONS] [COMMAND]...` runs COMMAND (default `uname -a`) in a
//! throwaway container. Everything after the options is passed to the
//! container untouched, hyphenated arguments included.

use super::config::{ConfigDiscovery, ConfigError, Settings};
use clap::Parser;
use std::borrow::Cow;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "throwaway")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run a command in a throwaway container, print its logs, and clean up")]
#[command(long_about = None)]
pub struct Args {
    /// Configuration file path (skips discovery)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Image to run the command in
    #[arg(long = "image", value_name = "REF")]
    pub image: Option<String>,
    /// Platform to pull and run, e.g. linux/arm64, or "native"
    #[arg(long = "platform", value_name = "OS/ARCH")]
    pub platform: Option<String>,
    /// Host directory mounted read-only
    #[arg(long = "input-dir", value_name = "DIR")]
    pub input_dir: Option<PathBuf>,
    /// Host directory mounted read-write
    #[arg(long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,
    /// Do not remove the image afterward
    #[arg(long = "keep-image")]
    pub keep_image: bool,
    /// Also print the container's stderr
    #[arg(long = "stderr")]
    pub stderr: bool,
    /// Enable debug logging
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
    /// Print the effective configuration and exit
    #[arg(long = "show-config")]
    pub show_config: bool,
    /// Command to run in the container
    #[arg(
        value_name = "COMMAND",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub command: Vec<String>,
}

impl Args {
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Load the configuration file and apply command line overrides.
    pub fn resolve_settings(&self) -> Result<Settings, ConfigError> {
        let mut settings = match &self.config {
            Some(path) => {
                info!("Loading configuration override from: {:?}", path);
                Settings::from_toml_file(path)?
            }
            None => ConfigDiscovery::discover_config()?,
        };
        self.apply_overrides(&mut settings);
        Ok(settings)
    }

    /// Apply flags given on the command line to `settings`.
    pub fn apply_overrides(&self, settings: &mut Settings) {
        if let Some(image) = &self.image {
            settings.image = image.clone();
        }
        if let Some(platform) = &self.platform {
            settings.platform = platform.clone();
        }
        if let Some(dir) = &self.input_dir {
            settings.input_dir = dir.clone();
        }
        if let Some(dir) = &self.output_dir {
            settings.output_dir = dir.clone();
        }
        if self.keep_image {
            settings.keep_image = true;
        }
        if self.stderr {
            settings.show_stderr = true;
        }
    }

    /// The command to run: the positional arguments, else the configured default.
    pub fn command(&self, settings: &Settings) -> Vec<String> {
        if self.command.is_empty() {
            settings.command.clone()
        } else {
            self.command.clone()
        }
    }
}

/// Render a command for echoing, shell-escaping each argument.
pub fn display_command(command: &[String]) -> String {
    command
        .iter()
        .map(|arg| shell_escape::escape(Cow::Borrowed(arg.as_str())))
        .collect::<Vec<_>>()
        .join(" ")
}
