//! Runtime error types.

use fifu_kernel::KernelError;
use fifu_kernel::config::ConfigError;
use fifu_kernel::plugin::PluginError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while assembling or running a gateway.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RuntimeError {
    /// A protocol plugin for this scheme is already registered.
    #[error("a protocol plugin for scheme '{0}' is already registered")]
    DuplicateScheme(String),

    /// A manifest names a plugin kind the catalog does not know.
    #[error("unknown plugin kind '{kind}' in {path}")]
    UnknownKind { kind: String, path: PathBuf },

    /// Bootstrap finished without a single protocol plugin.
    #[error("no protocol plugins loaded")]
    NoProtocols,

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;
