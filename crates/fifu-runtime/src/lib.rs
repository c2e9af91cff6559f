//! FIFU runtime.
//!
//! Turns the kernel's building blocks into a working gateway:
//!
//! ```text
//!  protocol plugin ──push──▶ inbound queue ──▶ dispatch loop
//!                                                   │ schedule
//!                                                   ▼
//!  protocol plugin ◀──send_message── Router::route (worker pool)
//!                                      │
//!                                      ├─ mapping table (foreign → original)
//!                                      ├─ correlation table (original → requesters)
//!                                      └─ converter plugins
//! ```

pub mod config;
pub mod error;
pub mod gateway;
pub mod loader;
pub mod registry;
pub mod resources;
pub mod router;

pub use config::GatewayConfig;
pub use error::{RuntimeError, RuntimeResult};
pub use gateway::{Gateway, GatewayBuilder};
pub use loader::{PluginCatalog, PluginManifest};
pub use registry::PluginRegistry;
pub use router::{Router, RouterSnapshot};
