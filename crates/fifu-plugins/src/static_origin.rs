//! Origin server backed by a local directory.
//!
//! Answers requests for `scheme://host/path` with the file at
//! `root/host/path`, feeding a response envelope back into the router. It
//! serves originals only and never mints foreign names.

use fifu_kernel::message::{MessageKind, MetaMessage};
use fifu_kernel::plugin::{
    PluginContext, PluginError, PluginResult, ProtocolEndpoint, ProtocolPlugin,
};
use fifu_kernel::queue::BlockingQueue;
use fifu_kernel::uri::Uri;
use fifu_runtime::PluginManifest;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Scheme used when the manifest does not name one.
pub const DEFAULT_SCHEME: &str = "http";
/// File served for paths that end in `/`.
pub const INDEX_FILE: &str = "index.html";

pub struct StaticOriginProtocol {
    scheme: String,
    root: PathBuf,
    endpoint: ProtocolEndpoint,
}

impl StaticOriginProtocol {
    pub fn new(scheme: &str, root: impl Into<PathBuf>, context: PluginContext) -> Self {
        Self {
            scheme: scheme.to_string(),
            root: root.into(),
            endpoint: ProtocolEndpoint::new(scheme, context),
        }
    }

    /// Build from a manifest: option `root` is required, the scheme defaults
    /// to `http`.
    pub fn from_manifest(manifest: &PluginManifest, context: &PluginContext) -> PluginResult<Self> {
        let root = PathBuf::from(manifest.require("root")?);
        if !root.is_dir() {
            return Err(PluginError::InvalidOption {
                key: "root".to_string(),
                reason: format!("{} is not a directory", root.display()),
            });
        }
        Ok(Self::new(manifest.scheme_or(DEFAULT_SCHEME), root, context.clone()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Map an identifier onto a file below `root`. Identifiers that would
/// escape `root` map to nothing.
fn file_for(root: &Path, uri: &Uri) -> Option<PathBuf> {
    let mut relative = PathBuf::from(uri.authority());
    let path = uri.path().trim_start_matches('/');
    relative.push(path);
    if path.is_empty() || uri.path().ends_with('/') {
        relative.push(INDEX_FILE);
    }
    if uri.authority().is_empty()
        || relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }
    Some(root.join(relative))
}

fn respond(root: &Path, inbound: &BlockingQueue<MetaMessage>, request: MetaMessage) {
    if request.kind() != MessageKind::Request {
        debug!(uri = %request.uri, kind = %request.kind(), "ignoring non-request message");
        return;
    }
    let Some(file) = file_for(root, &request.uri) else {
        warn!(uri = %request.uri, "identifier does not map to a file");
        return;
    };
    match std::fs::read(&file) {
        Ok(content) => {
            debug!(uri = %request.uri, file = %file.display(), bytes = content.len(), "serving file");
            let response = MetaMessage::response(request.uri, "", content);
            inbound.push(response);
        }
        Err(e) => {
            warn!(uri = %request.uri, file = %file.display(), error = %e, "cannot serve file");
        }
    }
}

impl ProtocolPlugin for StaticOriginProtocol {
    fn scheme(&self) -> &str {
        &self.scheme
    }

    fn start(&self) -> PluginResult<()> {
        let root = self.root.clone();
        let inbound = Arc::clone(&self.endpoint.context().inbound);
        self.endpoint
            .start(move |request| respond(&root, &inbound, request))
    }

    fn stop(&self) {
        self.endpoint.stop();
    }

    fn install_mapping(&self, _original: &Uri) -> Uri {
        Uri::invalid()
    }

    fn send_message(&self, message: MetaMessage) {
        self.endpoint.enqueue(message);
    }
}
