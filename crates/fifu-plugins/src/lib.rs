//! Built-in plugins.
//!
//! | kind       | type      | what it does                                     |
//! |------------|-----------|--------------------------------------------------|
//! | `html`     | converter | rewrites `href`/`src` attributes                 |
//! | `loopback` | protocol  | in-process transport mirroring names into its scheme |
//! | `static`   | protocol  | origin server answering from a local directory   |

pub mod html;
pub mod loopback;
pub mod static_origin;

pub use html::HtmlConverter;
pub use loopback::LoopbackProtocol;
pub use static_origin::StaticOriginProtocol;

use fifu_kernel::plugin::{ConverterPlugin, ProtocolPlugin};
use fifu_runtime::PluginCatalog;
use std::sync::Arc;

/// Catalog with every plugin kind shipped in this crate.
pub fn builtin_catalog() -> PluginCatalog {
    PluginCatalog::new()
        .with_protocol("loopback", |manifest, context| {
            let plugin = LoopbackProtocol::from_manifest(manifest, context)?;
            Ok(Arc::new(plugin) as Arc<dyn ProtocolPlugin>)
        })
        .with_protocol("static", |manifest, context| {
            let plugin = StaticOriginProtocol::from_manifest(manifest, context)?;
            Ok(Arc::new(plugin) as Arc<dyn ProtocolPlugin>)
        })
        .with_converter("html", |_manifest| {
            Ok(Arc::new(HtmlConverter::new()) as Arc<dyn ConverterPlugin>)
        })
}
