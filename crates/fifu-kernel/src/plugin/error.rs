//! Typed errors for the plugin sub-system.

use thiserror::Error;

/// Errors that can occur while building or starting a plugin.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PluginError {
    /// Plugin failed during `start`.
    #[error("Plugin start failed: {0}")]
    StartFailed(String),

    /// A manifest option the plugin needs was not given.
    #[error("Missing plugin option: {0}")]
    MissingOption(String),

    /// A manifest option had a value the plugin cannot use.
    #[error("Invalid plugin option {key}: {reason}")]
    InvalidOption {
        /// Option name as written in the manifest.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// An I/O error surfaced during a plugin operation.
    #[error("Plugin I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for errors that don't fit the above categories.
    #[error("{0}")]
    Other(String),
}

/// Result type for plugin operations
pub type PluginResult<T> = Result<T, PluginError>;
