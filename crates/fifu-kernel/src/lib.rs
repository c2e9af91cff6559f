//! FIFU kernel.
//!
//! Building blocks shared by the router, the plugins and the binary:
//!
//! - [`uri`]: resource identifiers, parsing, resolution and normalization
//! - [`message`]: the envelope moved between plugins and the router
//! - [`queue`] and [`pool`]: the blocking queue and worker pool every thread
//!   hand-off goes through
//! - [`plugin`]: protocol and converter plugin contracts
//! - [`content`]: content-type detection
//! - [`config`]: configuration file loading

pub mod config;
pub mod content;
pub mod error;
pub mod message;
pub mod plugin;
pub mod pool;
pub mod queue;
pub mod uri;

pub use error::{KernelError, KernelResult};
pub use message::{MessageKind, MetaMessage};
pub use plugin::{ConverterPlugin, PluginContext, PluginError, ProtocolEndpoint, ProtocolPlugin};
pub use pool::WorkerPool;
pub use queue::{BlockingQueue, Closed};
pub use uri::Uri;
