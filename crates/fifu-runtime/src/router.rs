//! The router.
//!
//! Owns the two tables that make the gateway work:
//!
//! - the **mapping table**, foreign identifier → original identifier, filled
//!   by [`Router::create_mapping`] and never shrunk;
//! - the **correlation table**, original identifier → foreign identifiers
//!   whose requests are waiting for that original's response.
//!
//! Each table sits behind its own reader/writer lock. Inbound envelopes are
//! drained from the shared queue by a single dispatch loop and routed on the
//! worker pool, so any number of [`Router::route`] calls may run at once.

use crate::error::RuntimeResult;
use crate::registry::PluginRegistry;
use fifu_kernel::KernelError;
use fifu_kernel::content::detect_content_type;
use fifu_kernel::message::{MessageKind, MetaMessage};
use fifu_kernel::plugin::ConverterPlugin;
use fifu_kernel::pool::WorkerPool;
use fifu_kernel::queue::{BlockingQueue, Closed};
use fifu_kernel::uri::Uri;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, trace, warn};

// ─────────────────────────────────────────────────────────────────────────────
// Tables
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct MappingTable {
    /// foreign → original
    originals: HashMap<Uri, Uri>,
    /// original → scheme → foreign, kept in step with `originals`
    foreign: HashMap<Uri, BTreeMap<String, Uri>>,
}

impl MappingTable {
    fn foreign_of(&self, original: &Uri) -> Vec<Uri> {
        self.foreign
            .get(original)
            .map(|by_scheme| by_scheme.values().cloned().collect())
            .unwrap_or_default()
    }

    fn has_scheme(&self, original: &Uri, scheme: &str) -> bool {
        self.foreign
            .get(original)
            .is_some_and(|by_scheme| by_scheme.contains_key(scheme))
    }
}

/// Serializable view of the router's tables.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RouterSnapshot {
    /// foreign → original
    pub mappings: BTreeMap<String, String>,
    /// original → foreign identifiers awaiting its response
    pub waiting_for_response: BTreeMap<String, Vec<String>>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

struct RouterInner {
    registry: PluginRegistry,
    inbound: Arc<BlockingQueue<MetaMessage>>,
    pool: Arc<WorkerPool>,
    mappings: RwLock<MappingTable>,
    waiting_for_response: RwLock<HashMap<Uri, Vec<Uri>>>,
    /// Serializes the slow path of `create_mapping`.
    creating: Mutex<()>,
    running: AtomicBool,
    stopped: AtomicBool,
}

/// Cheap to clone; clones share the same tables.
#[derive(Clone)]
pub struct Router {
    inner: Arc<RouterInner>,
}

/// A reference found in converted content.
struct Reference {
    literal: String,
    foreign: Vec<Uri>,
}

impl Router {
    pub fn new(
        registry: PluginRegistry,
        inbound: Arc<BlockingQueue<MetaMessage>>,
        pool: Arc<WorkerPool>,
    ) -> Self {
        Self {
            inner: Arc::new(RouterInner {
                registry,
                inbound,
                pool,
                mappings: RwLock::new(MappingTable::default()),
                waiting_for_response: RwLock::new(HashMap::new()),
                creating: Mutex::new(()),
                running: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
            }),
        }
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.inner.registry
    }

    pub fn inbound(&self) -> &Arc<BlockingQueue<MetaMessage>> {
        &self.inner.inbound
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    // ── Mapping ────────────────────────────────────────────────────────────

    /// Make sure `original` is reachable under every other registered
    /// scheme and return its foreign identifiers, ordered by scheme.
    ///
    /// Calling this again for the same original returns the same set without
    /// creating new entries, also when callers race each other. Schemes whose
    /// plugin declines are asked again on the next call.
    pub fn create_mapping(&self, original: &Uri) -> Vec<Uri> {
        if !original.is_absolute() {
            debug!(uri = %original, "not mapping invalid or relative identifier");
            return Vec::new();
        }
        let registry = &self.inner.registry;

        {
            let table = self.inner.mappings.read();
            if registry
                .foreign_schemes(original)
                .all(|scheme| table.has_scheme(original, scheme))
            {
                return table.foreign_of(original);
            }
        }

        let _creating = self.inner.creating.lock();

        let missing: HashSet<String> = {
            let table = self.inner.mappings.read();
            registry
                .foreign_schemes(original)
                .filter(|scheme| !table.has_scheme(original, scheme))
                .map(str::to_string)
                .collect()
        };

        if !missing.is_empty() {
            let minted =
                registry.install_mapping_excluding(original, |scheme| !missing.contains(scheme));

            let mut table = self.inner.mappings.write();
            for (scheme, foreign) in minted {
                if !foreign.is_valid() {
                    debug!(scheme = %scheme, uri = %original, "plugin declined mapping");
                    continue;
                }
                match table.originals.get(&foreign) {
                    Some(owner) if owner != original => {
                        warn!(
                            foreign = %foreign,
                            owner = %owner,
                            uri = %original,
                            "foreign identifier already mapped to another resource"
                        );
                        continue;
                    }
                    Some(_) => {}
                    None => {
                        table.originals.insert(foreign.clone(), original.clone());
                    }
                }
                info!(uri = %original, foreign = %foreign, "mapping created");
                table
                    .foreign
                    .entry(original.clone())
                    .or_default()
                    .insert(scheme, foreign);
            }
        }

        self.inner.mappings.read().foreign_of(original)
    }

    /// The original a foreign identifier stands for.
    pub fn original_of(&self, foreign: &Uri) -> Option<Uri> {
        self.inner.mappings.read().originals.get(foreign).cloned()
    }

    /// Foreign identifiers of `original`, ordered by scheme.
    pub fn foreign_of(&self, original: &Uri) -> Vec<Uri> {
        self.inner.mappings.read().foreign_of(original)
    }

    /// Number of foreign identifiers known.
    pub fn mapping_count(&self) -> usize {
        self.inner.mappings.read().originals.len()
    }

    /// Foreign identifiers waiting for `original`'s response.
    pub fn pending_for(&self, original: &Uri) -> Vec<Uri> {
        self.inner
            .waiting_for_response
            .read()
            .get(original)
            .cloned()
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> RouterSnapshot {
        let mappings = self
            .inner
            .mappings
            .read()
            .originals
            .iter()
            .map(|(foreign, original)| (foreign.to_string(), original.to_string()))
            .collect();
        let waiting_for_response = self
            .inner
            .waiting_for_response
            .read()
            .iter()
            .map(|(original, waiting)| {
                (
                    original.to_string(),
                    waiting.iter().map(ToString::to_string).collect(),
                )
            })
            .collect();
        RouterSnapshot {
            mappings,
            waiting_for_response,
        }
    }

    // ── Routing ────────────────────────────────────────────────────────────

    /// Route one inbound envelope to wherever it has to go.
    ///
    /// A message for a mapped foreign identifier is a request: it goes to the
    /// original, and its sender is remembered in the correlation table. Any
    /// other message is treated as the original answering, and goes to every
    /// foreign identifier waiting for it.
    pub fn route(&self, message: MetaMessage) {
        let (targets, toward_original) = self.targets_for(&message);
        if targets.is_empty() {
            warn!(uri = %message.uri, "no route for message, dropping");
            return;
        }

        let content_type = if message.content_type.is_empty() && !message.content_data.is_empty() {
            detect_content_type(&message.content_data)
        } else {
            message.content_type.clone()
        };

        let converter = if message.content_data.is_empty() {
            None
        } else {
            self.inner.registry.converter(&content_type)
        };
        let references = converter
            .as_ref()
            .map(|converter| self.map_references(converter.as_ref(), &message))
            .unwrap_or_default();

        let kind = match message.kind() {
            MessageKind::Unknown if toward_original => MessageKind::Request,
            MessageKind::Unknown => MessageKind::Response,
            kind => kind,
        };

        for target in targets {
            let content_data = match &converter {
                Some(converter) => {
                    let replacements = replacements_for(&references, target.scheme());
                    converter.convert_content(&message.content_data, &replacements)
                }
                None => message.content_data.clone(),
            };

            let mut outbound = MetaMessage {
                uri: target.clone(),
                metadata: message.metadata.clone(),
                content_type: content_type.clone(),
                content_data,
            };
            outbound.set_kind(kind);

            match self.inner.registry.protocol(target.scheme()) {
                Some(protocol) => {
                    debug!(from = %message.uri, to = %target, kind = %kind, "forwarding message");
                    protocol.send_message(outbound);
                }
                None => {
                    warn!(uri = %target, scheme = target.scheme(), "no protocol plugin for scheme, dropping");
                }
            }
        }
    }

    fn targets_for(&self, message: &MetaMessage) -> (Vec<Uri>, bool) {
        let original = self.original_of(&message.uri);

        let mut waiting = self.inner.waiting_for_response.write();
        match original {
            Some(original) => {
                let requesters = waiting.entry(original.clone()).or_default();
                if !requesters.contains(&message.uri) {
                    requesters.push(message.uri.clone());
                }
                trace!(foreign = %message.uri, original = %original, "request recorded");
                (vec![original], true)
            }
            None => {
                let requesters = if message.keep_session() {
                    waiting.get(&message.uri).cloned().unwrap_or_default()
                } else {
                    waiting.remove(&message.uri).unwrap_or_default()
                };
                trace!(original = %message.uri, requesters = requesters.len(), "response correlated");
                (requesters, false)
            }
        }
    }

    /// Extract the identifiers embedded in the message content and make sure
    /// each of them is mapped.
    fn map_references(&self, converter: &dyn ConverterPlugin, message: &MetaMessage) -> Vec<Reference> {
        converter
            .extract_uris_from_content(&message.uri, &message.content_data)
            .into_iter()
            .map(|(literal, resolved)| Reference {
                foreign: self.create_mapping(&resolved),
                literal,
            })
            .collect()
    }

    // ── Lifecycle ──────────────────────────────────────────────────────────

    /// Run the dispatch loop on the calling thread until the inbound queue
    /// is stopped.
    pub fn run(&self) {
        self.inner.running.store(true, Ordering::Release);
        info!("router dispatch loop started");
        loop {
            match self.inner.inbound.pop() {
                Ok(message) => {
                    trace!(uri = %message.uri, "inbound message");
                    let router = self.clone();
                    self.inner.pool.schedule(move || router.route(message));
                }
                Err(Closed) => break,
            }
        }
        self.inner.running.store(false, Ordering::Release);
        info!("router dispatch loop stopped");
    }

    /// Run the dispatch loop on its own thread.
    pub fn start(&self) -> RuntimeResult<JoinHandle<()>> {
        let router = self.clone();
        let name = "fifu-dispatch".to_string();
        thread::Builder::new()
            .name(name.clone())
            .spawn(move || router.run())
            .map_err(|source| KernelError::Spawn { name, source }.into())
    }

    /// Stop every plugin and the dispatch loop. Calling it again does nothing.
    pub fn stop(&self) {
        if self.inner.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("stopping router");
        self.inner.registry.stop_all();
        self.inner.inbound.stop();
    }
}

fn replacements_for(references: &[Reference], scheme: &str) -> HashMap<String, Uri> {
    references
        .iter()
        .filter_map(|reference| {
            reference
                .foreign
                .iter()
                .find(|foreign| foreign.scheme() == scheme)
                .map(|foreign| (reference.literal.clone(), foreign.clone()))
        })
        .collect()
}
