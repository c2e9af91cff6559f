//! Gateway settings.

use crate::error::RuntimeResult;
use fifu_kernel::config::{load_config, load_with_env};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Prefix of environment variables overriding file settings.
pub const ENV_PREFIX: &str = "FIFU";

/// Settings for one gateway process. Every field is optional in files.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Worker threads; `0` uses one per CPU.
    pub workers: usize,
    /// Resource list mapped at startup.
    pub resources: Option<PathBuf>,
    /// Directory of protocol plugin manifests.
    pub protocols_dir: Option<PathBuf>,
    /// Directory of converter plugin manifests.
    pub converters_dir: Option<PathBuf>,
    /// Log filter used when `RUST_LOG` is not set, e.g. `info` or
    /// `fifu_runtime=debug`.
    pub log_level: Option<String>,
}

impl GatewayConfig {
    /// Load settings from a TOML, YAML or JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> RuntimeResult<Self> {
        Ok(load_config(path)?)
    }

    /// Load settings from a file, letting `FIFU_*` variables override it.
    pub fn from_file_with_env(path: impl AsRef<Path>) -> RuntimeResult<Self> {
        Ok(load_with_env(path, ENV_PREFIX)?)
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_resources(mut self, path: impl Into<PathBuf>) -> Self {
        self.resources = Some(path.into());
        self
    }

    pub fn with_protocols_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.protocols_dir = Some(path.into());
        self
    }

    pub fn with_converters_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.converters_dir = Some(path.into());
        self
    }

    pub fn with_log_level(mut self, level: &str) -> Self {
        self.log_level = Some(level.to_string());
        self
    }
}
