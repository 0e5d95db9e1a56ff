//! Environment constants and path utilities.
//!
//! Centralizes the defaults, file names and labels used across the crate.

use std::path::{Path, PathBuf};

/// Image used when none is configured
pub const DEFAULT_IMAGE: &str = "alpine:latest";

/// Architecture used when no platform is configured
pub const DEFAULT_ARCHITECTURE: &str = "amd64";

/// Command run when none is given on the command line
pub const DEFAULT_COMMAND: &[&str] = &["uname", "-a"];

/// Host directory mounted read-only, relative to the working directory
pub const DEFAULT_INPUT_DIR: &str = "dir1";

/// Container path of the read-only mount
pub const DEFAULT_INPUT_TARGET: &str = "/dir1";

/// Host directory mounted read-write, relative to the working directory
pub const DEFAULT_OUTPUT_DIR: &str = "dir2";

/// Container path of the read-write mount
pub const DEFAULT_OUTPUT_TARGET: &str = "/dir2";

/// Prefix of generated container names
pub const CONTAINER_NAME_PREFIX: &str = "throwaway";

/// Label set on every container this tool creates
pub const MANAGED_LABEL: &str = "throwaway.managed";

/// Hidden application directory name
pub const APP_DIR_NAME: &str = ".throwaway";

/// Configuration file name inside [`APP_DIR_NAME`]
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration file name in the working directory
pub const LOCAL_CONFIG_FILE_NAME: &str = "throwaway.toml";

/// System-wide configuration file
pub const SYSTEM_CONFIG_FILE: &str = "/etc/throwaway/config.toml";

/// Build the `.throwaway/config.toml` path under a directory
pub fn app_config_file_path(dir: &Path) -> PathBuf {
    dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME)
}

/// Build the `throwaway.toml` path under a directory
pub fn local_config_file_path(dir: &Path) -> PathBuf {
    dir.join(LOCAL_CONFIG_FILE_NAME)
}

/// Default command as owned arguments
pub fn default_command() -> Vec<String> {
    DEFAULT_COMMAND.iter().map(|s| s.to_string()).collect()
}
