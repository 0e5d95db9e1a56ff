//! Configuration discovery and loading
//!
//! This module handles the configuration discovery hierarchy:
//! 1. Current directory: ./throwaway.toml or ./.throwaway/config.toml
//! 2. User config: ~/.throwaway/config.toml
//! 3. System config: /etc/throwaway/config.toml
//! 4. Built-in defaults
//!
//! Command line flags are applied on top of whatever was loaded.

use crate::container::{OrchestratorConfig, Platform};
use crate::env;
use serde::{Deserialize, Serialize};
use std::env as std_env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Platform value that lets the daemon pick its native platform.
pub const NATIVE_PLATFORM: &str = "native";

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file exists but could not be read
    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML or has unknown keys
    #[error("Invalid config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Settings could not be rendered as TOML
    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value is syntactically valid but unusable
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Effective settings for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Image to run the command in
    pub image: String,
    /// `os/arch[/variant]`, a bare architecture, or `native`
    pub platform: String,
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
    /// Print the container's stderr too
    pub show_stderr: bool,
    /// Command used when none is given on the command line
    pub command: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            image: env::DEFAULT_IMAGE.to_string(),
            platform: Platform::linux(env::DEFAULT_ARCHITECTURE).to_string(),
            input_dir: PathBuf::from(env::DEFAULT_INPUT_DIR),
            input_target: env::DEFAULT_INPUT_TARGET.to_string(),
            output_dir: PathBuf::from(env::DEFAULT_OUTPUT_DIR),
            output_target: env::DEFAULT_OUTPUT_TARGET.to_string(),
            keep_image: false,
            show_stderr: false,
            command: env::default_command(),
        }
    }
}

impl Settings {
    /// Load from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Parsed platform, or None when the daemon should choose.
    pub fn platform(&self) -> Result<Option<Platform>, ConfigError> {
        let value = self.platform.trim();
        if value.is_empty() || value.eq_ignore_ascii_case(NATIVE_PLATFORM) {
            return Ok(None);
        }
        value
            .parse()
            .map(Some)
            .map_err(|e: crate::container::ContainerError| ConfigError::Invalid(e.to_string()))
    }

    /// Convert to the orchestrator's configuration.
    pub fn to_orchestrator_config(&self) -> Result<OrchestratorConfig, ConfigError> {
        if self.image.trim().is_empty() {
            return Err(ConfigError::Invalid("image must not be empty".to_string()));
        }
        if self.command.is_empty() {
            return Err(ConfigError::Invalid(
                "default command must not be empty".to_string(),
            ));
        }

        Ok(OrchestratorConfig {
            image: self.image.clone(),
            platform: self.platform()?,
            input_dir: self.input_dir.clone(),
            input_target: self.input_target.clone(),
            output_dir: self.output_dir.clone(),
            output_target: self.output_target.clone(),
            keep_image: self.keep_image,
            show_stderr: self.show_stderr,
            ..OrchestratorConfig::default()
        })
    }
}

/// Configuration discovery system
pub struct ConfigDiscovery;

impl ConfigDiscovery {
    /// Discover and load configuration using the hierarchy
    pub fn discover_config() -> Result<Settings, ConfigError> {
        match Self::find_config_file() {
            Some(path) => {
                info!("Loading configuration from: {:?}", path);
                Settings::from_toml_file(path)
            }
            None => {
                debug!("No configuration file found, using defaults");
                Ok(Settings::default())
            }
        }
    }

    /// Find configuration file using discovery hierarchy
    pub fn find_config_file() -> Option<PathBuf> {
        let current_dir = std_env::current_dir().ok();
        let home_dir = Self::get_home_dir();
        Self::find_config_file_in(current_dir.as_deref(), home_dir.as_deref())
    }

    /// Find the first existing candidate for the given working and home directories
    pub fn find_config_file_in(
        current_dir: Option<&Path>,
        home_dir: Option<&Path>,
    ) -> Option<PathBuf> {
        for candidate in Self::get_config_candidates(current_dir, home_dir) {
            debug!("Checking for config file: {:?}", candidate);
            if candidate.is_file() {
                debug!("Found config file: {:?}", candidate);
                return Some(candidate);
            }
        }

        debug!("No config file found in discovery hierarchy");
        None
    }

    /// Get list of configuration file candidates in priority order
    pub fn get_config_candidates(
        current_dir: Option<&Path>,
        home_dir: Option<&Path>,
    ) -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        if let Some(dir) = current_dir {
            candidates.push(env::local_config_file_path(dir));
            candidates.push(env::app_config_file_path(dir));
        }

        if let Some(home) = home_dir {
            candidates.push(env::app_config_file_path(home));
        }

        #[cfg(unix)]
        candidates.push(PathBuf::from(env::SYSTEM_CONFIG_FILE));

        candidates
    }

    /// Get home directory path
    fn get_home_dir() -> Option<PathBuf> {
        std_env::var("HOME")
            .ok()
            .or_else(|| std_env::var("USERPROFILE").ok())
            .map(PathBuf::from)
    }
}
