//! Container configuration builders.
//!
//! Provides a fluent API for describing the throwaway container: image,
//! command, bind mounts and target platform.

use crate::container::{ContainerError, Result};
use bollard::models::{ContainerCreateBody, HostConfig, Mount, MountTypeEnum};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Target platform for pulling and creating, e.g. `linux/amd64`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    /// Operating system
    pub os: String,
    /// CPU architecture
    pub architecture: String,
    /// Architecture variant (e.g. `v8` for `arm64/v8`)
    pub variant: Option<String>,
}

impl Platform {
    /// Linux on the given architecture.
    pub fn linux<S: Into<String>>(architecture: S) -> Self {
        Self {
            os: "linux".to_string(),
            architecture: architecture.into(),
            variant: None,
        }
    }
}

impl FromStr for Platform {
    type Err = ContainerError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.trim().split('/').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(ContainerError::ConfigError(format!(
                "Invalid platform '{}': expected os/arch[/variant] or arch",
                s
            )));
        }

        match parts.as_slice() {
            [arch] => Ok(Self::linux(*arch)),
            [os, arch] => Ok(Self {
                os: os.to_string(),
                architecture: arch.to_string(),
                variant: None,
            }),
            [os, arch, variant] => Ok(Self {
                os: os.to_string(),
                architecture: arch.to_string(),
                variant: Some(variant.to_string()),
            }),
            _ => Err(ContainerError::ConfigError(format!(
                "Invalid platform '{}': too many components",
                s
            ))),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.architecture)?;
        if let Some(variant) = &self.variant {
            write!(f, "/{}", variant)?;
        }
        Ok(())
    }
}

/// A host directory bind-mounted into the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindMount {
    /// Absolute host path
    pub source: PathBuf,
    /// Path inside the container
    pub target: String,
    /// Mount read-only
    pub read_only: bool,
}

impl BindMount {
    fn to_mount(&self) -> Mount {
        Mount {
            target: Some(self.target.clone()),
            source: Some(self.source.to_string_lossy().into_owned()),
            typ: Some(MountTypeEnum::BIND),
            read_only: Some(self.read_only),
            ..Default::default()
        }
    }
}

/// Container configuration builder.
#[derive(Default)]
pub struct ContainerConfigBuilder {
    image: Option<String>,
    cmd: Option<Vec<String>>,
    working_dir: Option<String>,
    env: Vec<String>,
    labels: HashMap<String, String>,
    mounts: Vec<BindMount>,
    platform: Option<Platform>,
}

impl ContainerConfigBuilder {
    /// Create a new container configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the container image.
    pub fn image<S: Into<String>>(mut self, image: S) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Set the command to run in the container.
    pub fn cmd<I, S>(mut self, cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cmd = Some(cmd.into_iter().map(|s| s.into()).collect());
        self
    }

    /// Set the working directory in the container.
    pub fn working_dir<S: Into<String>>(mut self, dir: S) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Add an environment variable.
    pub fn env<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.env.push(format!("{}={}", key.into(), value.into()));
        self
    }

    /// Add a label to the container.
    pub fn label<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Add a bind mount. `source` must already be absolute.
    pub fn mount<P: Into<PathBuf>, S: Into<String>>(
        mut self,
        source: P,
        target: S,
        read_only: bool,
    ) -> Self {
        self.mounts.push(BindMount {
            source: source.into(),
            target: target.into(),
            read_only,
        });
        self
    }

    /// Set the platform to create the container for.
    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Build the container configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the image is missing or a mount source is relative.
    pub fn build(self) -> Result<ContainerConfig> {
        let image = self
            .image
            .ok_or_else(|| ContainerError::ConfigError("Image is required".to_string()))?;

        if let Some(mount) = self.mounts.iter().find(|m| !m.source.is_absolute()) {
            return Err(ContainerError::ConfigError(format!(
                "Bind mount source must be absolute: {}",
                mount.source.display()
            )));
        }

        Ok(ContainerConfig {
            image,
            cmd: self.cmd,
            working_dir: self.working_dir,
            env: self.env,
            labels: self.labels,
            mounts: self.mounts,
            platform: self.platform,
        })
    }
}

/// Container configuration.
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    /// Image name
    pub image: String,
    /// Command to run
    pub cmd: Option<Vec<String>>,
    /// Working directory
    pub working_dir: Option<String>,
    /// Environment variables (`KEY=value`)
    pub env: Vec<String>,
    /// Labels
    pub labels: HashMap<String, String>,
    /// Bind mounts
    pub mounts: Vec<BindMount>,
    /// Target platform
    pub platform: Option<Platform>,
}

impl ContainerConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ContainerConfigBuilder {
        ContainerConfigBuilder::new()
    }

    /// Convert to the daemon's container create body.
    pub fn to_create_body(&self) -> ContainerCreateBody {
        let mounts: Vec<Mount> = self.mounts.iter().map(BindMount::to_mount).collect();

        ContainerCreateBody {
            image: Some(self.image.clone()),
            cmd: self.cmd.clone(),
            working_dir: self.working_dir.clone(),
            env: if self.env.is_empty() {
                None
            } else {
                Some(self.env.clone())
            },
            labels: if self.labels.is_empty() {
                None
            } else {
                Some(self.labels.clone())
            },
            host_config: Some(HostConfig {
                mounts: if mounts.is_empty() { None } else { Some(mounts) },
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}
