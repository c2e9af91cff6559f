//! In-process protocol plugin.
//!
//! Mirrors originals into its own scheme (`http://host/p` becomes
//! `{scheme}://host/p`) and has no network side: traffic is fed in with
//! [`LoopbackProtocol::inject`] and whatever the router sends comes out of
//! [`LoopbackProtocol::outbound`]. Useful for wiring tests and as the
//! skeleton of a real transport.

use crossbeam_channel::{Receiver, Sender, unbounded};
use fifu_kernel::message::MetaMessage;
use fifu_kernel::plugin::{
    PluginContext, PluginError, PluginResult, ProtocolEndpoint, ProtocolPlugin,
};
use fifu_kernel::uri::Uri;
use fifu_runtime::PluginManifest;
use parking_lot::RwLock;
use std::collections::HashSet;
use tracing::{debug, trace};

pub struct LoopbackProtocol {
    scheme: String,
    endpoint: ProtocolEndpoint,
    served: RwLock<HashSet<Uri>>,
    tap_tx: Sender<MetaMessage>,
    tap_rx: Receiver<MetaMessage>,
}

impl LoopbackProtocol {
    pub fn new(scheme: &str, context: PluginContext) -> Self {
        let (tap_tx, tap_rx) = unbounded();
        Self {
            scheme: scheme.to_string(),
            endpoint: ProtocolEndpoint::new(scheme, context),
            served: RwLock::new(HashSet::new()),
            tap_tx,
            tap_rx,
        }
    }

    /// Build from a manifest. The scheme is mandatory.
    pub fn from_manifest(manifest: &PluginManifest, context: &PluginContext) -> PluginResult<Self> {
        let scheme = manifest
            .scheme
            .as_deref()
            .ok_or_else(|| PluginError::MissingOption("scheme".to_string()))?;
        if scheme.is_empty() || scheme.contains(&[':', '/', '?', '#'][..]) {
            return Err(PluginError::InvalidOption {
                key: "scheme".to_string(),
                reason: format!("'{scheme}' is not a valid scheme"),
            });
        }
        Ok(Self::new(scheme, context.clone()))
    }

    /// Feed a message in as if it had been received from the network.
    pub fn inject(&self, message: MetaMessage) {
        self.endpoint.deliver(message);
    }

    /// Messages this plugin has transmitted, in delivery order.
    pub fn outbound(&self) -> Receiver<MetaMessage> {
        self.tap_rx.clone()
    }

    /// Whether `uri` is one of the names this plugin minted.
    pub fn serves(&self, uri: &Uri) -> bool {
        self.served.read().contains(uri)
    }
}

impl ProtocolPlugin for LoopbackProtocol {
    fn scheme(&self) -> &str {
        &self.scheme
    }

    fn start(&self) -> PluginResult<()> {
        let tap = self.tap_tx.clone();
        let scheme = self.scheme.clone();
        self.endpoint.start(move |message| {
            trace!(scheme = %scheme, uri = %message.uri, "loopback transmit");
            if tap.send(message).is_err() {
                debug!(scheme = %scheme, "outbound tap closed");
            }
        })
    }

    fn stop(&self) {
        self.endpoint.stop();
    }

    fn install_mapping(&self, original: &Uri) -> Uri {
        if original.authority().is_empty() {
            return Uri::invalid();
        }
        let foreign = original.with_scheme(self.scheme.clone());
        self.served.write().insert(foreign.clone());
        foreign
    }

    fn send_message(&self, message: MetaMessage) {
        self.endpoint.enqueue(message);
    }
}
