//! Plugin contracts.
//!
//! Two kinds of plugins extend the gateway:
//!
//! - a [`ProtocolPlugin`] owns one identifier scheme. It mints foreign names
//!   for originals of other schemes, receives traffic and pushes it into the
//!   router's inbound queue, and transmits what the router hands back.
//! - a [`ConverterPlugin`] understands one or more content types well enough
//!   to find embedded identifiers and rewrite them.
//!
//! Implementations live in `fifu-plugins`; the router in `fifu-runtime`
//! only sees these traits.

pub mod endpoint;
pub mod error;

pub use endpoint::ProtocolEndpoint;
pub use error::{PluginError, PluginResult};

use crate::message::MetaMessage;
use crate::pool::WorkerPool;
use crate::queue::BlockingQueue;
use crate::uri::Uri;
use std::collections::HashMap;
use std::sync::Arc;

// ─────────────────────────────────────────────────────────────────────────────
// Shared handles
// ─────────────────────────────────────────────────────────────────────────────

/// What a protocol plugin gets from the gateway at construction time.
#[derive(Clone)]
pub struct PluginContext {
    /// Where received envelopes go. Drained by the router's dispatch loop.
    pub inbound: Arc<BlockingQueue<MetaMessage>>,
    /// Shared worker pool used for outbound delivery.
    pub pool: Arc<WorkerPool>,
}

impl PluginContext {
    pub fn new(inbound: Arc<BlockingQueue<MetaMessage>>, pool: Arc<WorkerPool>) -> Self {
        Self { inbound, pool }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Protocol plugins
// ─────────────────────────────────────────────────────────────────────────────

/// A transport for one identifier scheme.
///
/// All methods take `&self`: plugins are shared between the router's worker
/// threads and keep their mutable state behind their own locks.
pub trait ProtocolPlugin: Send + Sync {
    /// The scheme this plugin serves, e.g. `ndn`.
    fn scheme(&self) -> &str;

    /// Begin receiving traffic. Called once when the plugin is registered.
    fn start(&self) -> PluginResult<()>;

    /// Stop receiving and sending. Must be safe to call more than once.
    fn stop(&self);

    /// Mint this scheme's name for `original`. Returning an invalid [`Uri`]
    /// declines the mapping.
    fn install_mapping(&self, original: &Uri) -> Uri;

    /// Hand a message over for transmission. Must not block on the network.
    fn send_message(&self, message: MetaMessage);
}

// ─────────────────────────────────────────────────────────────────────────────
// Converter plugins
// ─────────────────────────────────────────────────────────────────────────────

/// Content adaptation for a family of media types.
pub trait ConverterPlugin: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Media types (without parameters) this converter handles.
    fn file_types(&self) -> Vec<String>;

    /// Find identifiers embedded in `content`.
    ///
    /// Keys are the literal text as it appears in the content; values are
    /// those literals resolved against `base`.
    fn extract_uris_from_content(&self, base: &Uri, content: &[u8]) -> HashMap<String, Uri>;

    /// Replace every literal key of `replacements` in `content` with the
    /// corresponding identifier.
    fn convert_content(&self, content: &[u8], replacements: &HashMap<String, Uri>) -> Vec<u8>;
}
