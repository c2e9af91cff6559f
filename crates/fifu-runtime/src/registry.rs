//! Plugin registry.
//!
//! Maps schemes to protocol plugins and content types to converters. It is
//! filled while the gateway is assembled and only read once routing starts,
//! so it carries no lock of its own.

use crate::error::{RuntimeError, RuntimeResult};
use fifu_kernel::content::essence;
use fifu_kernel::plugin::{ConverterPlugin, ProtocolPlugin};
use fifu_kernel::uri::Uri;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Default)]
pub struct PluginRegistry {
    protocols: BTreeMap<String, Arc<dyn ProtocolPlugin>>,
    converters: HashMap<String, Arc<dyn ConverterPlugin>>,
}

impl PluginRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `plugin` and make it the handler for its scheme.
    ///
    /// A second plugin for a scheme that is already taken is rejected and
    /// left unstarted.
    pub fn register_protocol(&mut self, plugin: Arc<dyn ProtocolPlugin>) -> RuntimeResult<()> {
        let scheme = plugin.scheme().to_string();
        if self.protocols.contains_key(&scheme) {
            return Err(RuntimeError::DuplicateScheme(scheme));
        }
        plugin.start()?;
        info!(scheme = %scheme, "protocol plugin loaded and started");
        self.protocols.insert(scheme, plugin);
        Ok(())
    }

    /// Register `plugin` under every content type it declares. A later
    /// converter for the same type replaces the earlier one.
    pub fn register_converter(&mut self, plugin: Arc<dyn ConverterPlugin>) {
        for file_type in plugin.file_types() {
            let key = essence(&file_type);
            if let Some(previous) = self.converters.insert(key.clone(), Arc::clone(&plugin)) {
                warn!(
                    content_type = %key,
                    previous = previous.name(),
                    "converter replaced for content type"
                );
            }
        }
        info!(converter = plugin.name(), "converter plugin loaded");
    }

    /// Ask every protocol plugin except the one owning `original`'s scheme to
    /// mint a foreign identifier. Declined mappings come back invalid.
    pub fn install_mapping(&self, original: &Uri) -> Vec<Uri> {
        self.install_mapping_excluding(original, |_| false)
            .into_iter()
            .map(|(_, foreign)| foreign)
            .collect()
    }

    /// Like [`install_mapping`](Self::install_mapping), skipping schemes for
    /// which `skip` returns true. Results are paired with the scheme of the
    /// plugin that produced them, in scheme order.
    pub fn install_mapping_excluding<F>(&self, original: &Uri, skip: F) -> Vec<(String, Uri)>
    where
        F: Fn(&str) -> bool,
    {
        self.protocols
            .iter()
            .filter(|(scheme, _)| scheme.as_str() != original.scheme() && !skip(scheme))
            .map(|(scheme, plugin)| (scheme.clone(), plugin.install_mapping(original)))
            .collect()
    }

    /// Schemes a mapping for `original` should exist in.
    pub fn foreign_schemes<'a>(&'a self, original: &'a Uri) -> impl Iterator<Item = &'a str> + 'a {
        self.protocols
            .keys()
            .map(String::as_str)
            .filter(move |scheme| *scheme != original.scheme())
    }

    pub fn protocol(&self, scheme: &str) -> Option<Arc<dyn ProtocolPlugin>> {
        self.protocols.get(scheme).cloned()
    }

    /// Converter for `content_type`. Parameters and case are ignored.
    pub fn converter(&self, content_type: &str) -> Option<Arc<dyn ConverterPlugin>> {
        self.converters.get(&essence(content_type)).cloned()
    }

    pub fn schemes(&self) -> Vec<String> {
        self.protocols.keys().cloned().collect()
    }

    pub fn content_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.converters.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn protocol_count(&self) -> usize {
        self.protocols.len()
    }

    /// Stop every protocol plugin.
    pub fn stop_all(&self) {
        for (scheme, plugin) in &self.protocols {
            plugin.stop();
            info!(scheme = %scheme, "protocol plugin stopped");
        }
    }
}
