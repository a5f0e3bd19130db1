//! Configuration loading
//!
//! # Hierarchy
//!
//! Configuration is resolved in this order (later overrides earlier):
//! 1. Built-in defaults
//! 2. Config file: explicit path, else `<config dir>/buildgrid/config.toml`
//! 3. Environment variables: `BUILDGRID_*`
//!
//! The result selects exactly one backend for the lifetime of the process.
//!
//! # Example Config
//!
//! ```toml
//! backend = "local"
//! member_address = "localhost"
//! notification_workers = 4
//! ```

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Backend implementation behind the data provider facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Single-node, in-process structures
    #[default]
    Local,
}

impl<'de> Deserialize<'de> for BackendKind {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "local" | "single-node" => Ok(Self::Local),
            _ => Err(Error::InvalidConfig(format!(
                "Invalid backend: {s}. Must be one of: local"
            ))),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
        }
    }
}

const DEFAULT_MEMBER_ADDRESS: &str = "localhost";
const DEFAULT_NOTIFICATION_WORKERS: usize = 4;

/// Coordination backend configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Which backend serves the data provider
    pub backend: BackendKind,
    /// Address this member reports to callers
    pub member_address: String,
    /// Threads delivering set notifications
    pub notification_workers: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            member_address: DEFAULT_MEMBER_ADDRESS.to_string(),
            notification_workers: DEFAULT_NOTIFICATION_WORKERS,
        }
    }
}

impl GridConfig {
    /// Parse a TOML document; missing fields take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::InvalidConfig(format!("Malformed config: {e}")))
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    /// Resolve the full hierarchy.
    ///
    /// An explicit `path` must exist. The default location is optional and
    /// skipped silently when absent.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - An explicit config file cannot be read
    /// - A config file is malformed TOML
    /// - An environment override cannot be parsed
    /// - The resolved values fail validation
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(path) => match Self::from_file(&path) {
                    Ok(config) => config,
                    Err(Error::IoError(_)) => Self::default(),
                    Err(e) => return Err(e),
                },
                None => Self::default(),
            },
        };
        config.apply_env_vars()?;
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => {
                Error::IoError(format!("Config file not found: {}", path.display()))
            }
            _ => Error::IoError(format!("Failed to read {}: {e}", path.display())),
        })?;
        Self::from_toml_str(&content)
    }

    /// Apply environment variable overrides
    ///
    /// # Errors
    ///
    /// Returns error if environment variable values are invalid
    pub fn apply_env_vars(&mut self) -> Result<()> {
        // BUILDGRID_BACKEND
        if let Ok(value) = std::env::var("BUILDGRID_BACKEND") {
            self.backend = value.parse()?;
        }

        // BUILDGRID_MEMBER_ADDRESS
        if let Ok(value) = std::env::var("BUILDGRID_MEMBER_ADDRESS") {
            self.member_address = value;
        }

        // BUILDGRID_NOTIFICATION_WORKERS
        if let Ok(value) = std::env::var("BUILDGRID_NOTIFICATION_WORKERS") {
            self.notification_workers = value.parse().map_err(|e| {
                Error::InvalidConfig(format!("Invalid BUILDGRID_NOTIFICATION_WORKERS value: {e}"))
            })?;
        }

        Ok(())
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.member_address.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "member_address must not be empty".to_string(),
            ));
        }
        if self.notification_workers == 0 {
            return Err(Error::InvalidConfig(
                "notification_workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Get path to the per-user config file
fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "buildgrid")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}
