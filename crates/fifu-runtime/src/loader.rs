//! Plugin discovery.
//!
//! Plugins are compiled in and listed in a [`PluginCatalog`] under a kind
//! name. What gets instantiated is decided at startup by scanning a
//! directory of manifest files, one plugin per file:
//!
//! ```toml
//! # protocols/ndn.toml
//! kind = "loopback"
//! scheme = "ndn"
//!
//! [options]
//! prefix = "/fifu"
//! ```

use crate::error::{RuntimeError, RuntimeResult};
use fifu_kernel::config;
use fifu_kernel::plugin::{
    ConverterPlugin, PluginContext, PluginError, PluginResult, ProtocolPlugin,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Contents of a plugin manifest file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PluginManifest {
    /// Catalog entry to instantiate.
    pub kind: String,
    /// Scheme override for protocol plugins.
    #[serde(default)]
    pub scheme: Option<String>,
    /// Free-form plugin options.
    #[serde(default)]
    pub options: HashMap<String, String>,
}

impl PluginManifest {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            ..Self::default()
        }
    }

    pub fn with_scheme(mut self, scheme: &str) -> Self {
        self.scheme = Some(scheme.to_string());
        self
    }

    pub fn with_option(mut self, key: &str, value: &str) -> Self {
        self.options.insert(key.to_string(), value.to_string());
        self
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    /// Like [`option`](Self::option), failing when the key is absent.
    pub fn require(&self, key: &str) -> PluginResult<&str> {
        self.option(key)
            .ok_or_else(|| PluginError::MissingOption(key.to_string()))
    }

    /// The manifest's scheme, or `default` when none is given.
    pub fn scheme_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.scheme.as_deref().unwrap_or(default)
    }
}

/// Builds a protocol plugin from its manifest.
pub type ProtocolFactory = Arc<
    dyn Fn(&PluginManifest, &PluginContext) -> PluginResult<Arc<dyn ProtocolPlugin>> + Send + Sync,
>;

/// Builds a converter plugin from its manifest.
pub type ConverterFactory =
    Arc<dyn Fn(&PluginManifest) -> PluginResult<Arc<dyn ConverterPlugin>> + Send + Sync>;

/// Plugin kinds known to this build.
#[derive(Clone, Default)]
pub struct PluginCatalog {
    protocols: HashMap<String, ProtocolFactory>,
    converters: HashMap<String, ConverterFactory>,
}

impl PluginCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_protocol<F>(mut self, kind: &str, factory: F) -> Self
    where
        F: Fn(&PluginManifest, &PluginContext) -> PluginResult<Arc<dyn ProtocolPlugin>>
            + Send
            + Sync
            + 'static,
    {
        self.protocols.insert(kind.to_string(), Arc::new(factory));
        self
    }

    pub fn with_converter<F>(mut self, kind: &str, factory: F) -> Self
    where
        F: Fn(&PluginManifest) -> PluginResult<Arc<dyn ConverterPlugin>> + Send + Sync + 'static,
    {
        self.converters.insert(kind.to_string(), Arc::new(factory));
        self
    }

    pub fn protocol_kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.protocols.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    pub fn converter_kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.converters.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    pub fn build_protocol(
        &self,
        manifest: &PluginManifest,
        context: &PluginContext,
        path: &Path,
    ) -> RuntimeResult<Arc<dyn ProtocolPlugin>> {
        let factory = self
            .protocols
            .get(&manifest.kind)
            .ok_or_else(|| RuntimeError::UnknownKind {
                kind: manifest.kind.clone(),
                path: path.to_path_buf(),
            })?;
        Ok(factory(manifest, context)?)
    }

    pub fn build_converter(
        &self,
        manifest: &PluginManifest,
        path: &Path,
    ) -> RuntimeResult<Arc<dyn ConverterPlugin>> {
        let factory = self
            .converters
            .get(&manifest.kind)
            .ok_or_else(|| RuntimeError::UnknownKind {
                kind: manifest.kind.clone(),
                path: path.to_path_buf(),
            })?;
        Ok(factory(manifest)?)
    }
}

/// Read one manifest file.
pub fn load_manifest(path: impl AsRef<Path>) -> RuntimeResult<PluginManifest> {
    Ok(config::load_config(path)?)
}

/// Manifest files in `dir`, sorted by name.
///
/// Entries that are not regular files or have an unsupported extension are
/// skipped with a log line. A missing directory yields nothing.
pub fn manifest_files(dir: impl AsRef<Path>) -> Vec<PathBuf> {
    let dir = dir.as_ref();
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "cannot read plugin directory");
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            if !path.is_file() {
                warn!(path = %path.display(), "skipping non-regular file");
                return false;
            }
            if !config::is_supported(path) {
                debug!(path = %path.display(), "skipping file with unsupported extension");
                return false;
            }
            true
        })
        .collect();
    files.sort();
    files
}
