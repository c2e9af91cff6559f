//! Gateway assembly and lifecycle.
//!
//! ```rust,ignore
//! let gateway = Gateway::builder()
//!     .workers(4)
//!     .catalog(fifu_plugins::builtin_catalog())
//!     .load_protocols("/etc/fifu/protocols")
//!     .load_converters("/etc/fifu/converters")
//!     .build()?;
//! gateway.load_resources("/etc/fifu/resources.txt")?;
//! gateway.start()?;
//! // ...
//! gateway.shutdown();
//! ```

use crate::config::GatewayConfig;
use crate::error::{RuntimeError, RuntimeResult};
use crate::loader::{PluginCatalog, load_manifest, manifest_files};
use crate::registry::PluginRegistry;
use crate::resources::load_resource_file;
use crate::router::Router;
use fifu_kernel::plugin::{ConverterPlugin, PluginContext, ProtocolPlugin};
use fifu_kernel::pool::WorkerPool;
use fifu_kernel::queue::BlockingQueue;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{info, warn};

type ProtocolConstructor = Box<dyn FnOnce(&PluginContext) -> Arc<dyn ProtocolPlugin>>;

/// Collects plugins and settings, then wires them into a [`Gateway`].
#[derive(Default)]
pub struct GatewayBuilder {
    workers: usize,
    catalog: PluginCatalog,
    protocols: Vec<ProtocolConstructor>,
    converters: Vec<Arc<dyn ConverterPlugin>>,
    protocol_dirs: Vec<PathBuf>,
    converter_dirs: Vec<PathBuf>,
}

impl GatewayBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Worker threads; `0` uses one per CPU.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Plugin kinds available to manifest directories.
    pub fn catalog(mut self, catalog: PluginCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Add an already constructed protocol plugin.
    pub fn protocol(self, plugin: Arc<dyn ProtocolPlugin>) -> Self {
        self.protocol_with(move |_| plugin)
    }

    /// Add a protocol plugin that needs the gateway's queue and pool.
    pub fn protocol_with<F>(mut self, constructor: F) -> Self
    where
        F: FnOnce(&PluginContext) -> Arc<dyn ProtocolPlugin> + 'static,
    {
        self.protocols.push(Box::new(constructor));
        self
    }

    pub fn converter(mut self, plugin: Arc<dyn ConverterPlugin>) -> Self {
        self.converters.push(plugin);
        self
    }

    /// Instantiate a protocol plugin for every manifest in `dir`.
    pub fn load_protocols(mut self, dir: impl Into<PathBuf>) -> Self {
        self.protocol_dirs.push(dir.into());
        self
    }

    /// Instantiate a converter plugin for every manifest in `dir`.
    pub fn load_converters(mut self, dir: impl Into<PathBuf>) -> Self {
        self.converter_dirs.push(dir.into());
        self
    }

    /// Create the worker pool and inbound queue, start every protocol plugin
    /// and hand everything to a new router.
    ///
    /// Plugins that fail to load are logged and skipped. Ending up without
    /// any protocol plugin is an error.
    pub fn build(self) -> RuntimeResult<Gateway> {
        let pool = Arc::new(WorkerPool::new(self.workers)?);
        let inbound = Arc::new(BlockingQueue::new());
        let context = PluginContext::new(Arc::clone(&inbound), Arc::clone(&pool));
        let mut registry = PluginRegistry::new();

        for constructor in self.protocols {
            register_protocol(&mut registry, constructor(&context), None);
        }
        for dir in &self.protocol_dirs {
            for path in manifest_files(dir) {
                let built = load_manifest(&path)
                    .and_then(|manifest| self.catalog.build_protocol(&manifest, &context, &path));
                match built {
                    Ok(plugin) => register_protocol(&mut registry, plugin, Some(&path)),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "failed to load protocol plugin")
                    }
                }
            }
        }

        for converter in self.converters {
            registry.register_converter(converter);
        }
        for dir in &self.converter_dirs {
            for path in manifest_files(dir) {
                let built = load_manifest(&path)
                    .and_then(|manifest| self.catalog.build_converter(&manifest, &path));
                match built {
                    Ok(plugin) => registry.register_converter(plugin),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "failed to load converter plugin")
                    }
                }
            }
        }

        if registry.protocol_count() == 0 {
            return Err(RuntimeError::NoProtocols);
        }

        info!(
            schemes = ?registry.schemes(),
            content_types = ?registry.content_types(),
            workers = pool.size(),
            "gateway assembled"
        );

        Ok(Gateway {
            router: Router::new(registry, inbound, Arc::clone(&pool)),
            context,
            pool,
            dispatch: Mutex::new(None),
        })
    }
}

fn register_protocol(registry: &mut PluginRegistry, plugin: Arc<dyn ProtocolPlugin>, path: Option<&Path>) {
    let scheme = plugin.scheme().to_string();
    if let Err(e) = registry.register_protocol(plugin) {
        match path {
            Some(path) => warn!(scheme = %scheme, path = %path.display(), error = %e, "skipping protocol plugin"),
            None => warn!(scheme = %scheme, error = %e, "skipping protocol plugin"),
        }
    }
}

/// A running gateway: router, plugins and worker pool.
pub struct Gateway {
    router: Router,
    context: PluginContext,
    pool: Arc<WorkerPool>,
    dispatch: Mutex<Option<JoinHandle<()>>>,
}

impl Gateway {
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }

    /// Assemble a gateway from settings, using `catalog` for manifest
    /// directories, and map the configured resource list.
    pub fn from_config(config: &GatewayConfig, catalog: PluginCatalog) -> RuntimeResult<Self> {
        let mut builder = Self::builder().workers(config.workers).catalog(catalog);
        if let Some(dir) = &config.protocols_dir {
            builder = builder.load_protocols(dir);
        }
        if let Some(dir) = &config.converters_dir {
            builder = builder.load_converters(dir);
        }
        let gateway = builder.build()?;
        if let Some(resources) = &config.resources {
            gateway.load_resources(resources)?;
        }
        Ok(gateway)
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// The queue and pool handed to protocol plugins.
    pub fn context(&self) -> &PluginContext {
        &self.context
    }

    /// Create mappings for every identifier in a resource list file and
    /// return how many entries were processed.
    pub fn load_resources(&self, path: impl AsRef<Path>) -> RuntimeResult<usize> {
        let path = path.as_ref();
        let resources = load_resource_file(path)?;
        for uri in &resources {
            let foreign = self.router.create_mapping(uri);
            if foreign.is_empty() {
                warn!(uri = %uri, "no plugin produced a mapping");
            }
        }
        info!(path = %path.display(), count = resources.len(), "resource list loaded");
        Ok(resources.len())
    }

    /// Start the dispatch thread. A second call does nothing.
    pub fn start(&self) -> RuntimeResult<()> {
        let mut dispatch = self.dispatch.lock();
        if dispatch.is_none() {
            *dispatch = Some(self.router.start()?);
        }
        Ok(())
    }

    /// Stop plugins and the dispatch loop, let scheduled work finish, and
    /// join every thread. Safe to call more than once.
    pub fn shutdown(&self) {
        self.router.stop();
        if let Some(handle) = self.dispatch.lock().take() {
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                warn!("dispatch thread terminated abnormally");
            }
        }
        self.pool.shutdown();
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        self.shutdown();
    }
}
