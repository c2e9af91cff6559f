//! Typed errors for the kernel primitives.

use thiserror::Error;

/// Errors raised while setting up kernel primitives.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KernelError {
    /// The operating system refused to start a thread.
    #[error("failed to spawn thread {name}: {source}")]
    Spawn {
        /// Name the thread would have carried.
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for kernel operations
pub type KernelResult<T> = Result<T, KernelError>;
