//! Extension Host - plugin discovery and extension initialization
//!
//! This library provides the core functionality for the extension host:
//! - Manifest discovery across extension root directories
//! - A categorized registry of extension descriptors
//! - Per-category dispatch of the server and background phases
//! - Aggregation of configuration UI bundles, templates and static assets
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                Extension directories                 │
//! │   extension.json  │  package.json  │  static/  │ ... │
//! └────────────────────┬────────────────────────────────┘
//!                      │ discover + register
//! ┌────────────────────▼────────────────────────────────┐
//! │                      Loader                          │
//! │  Registry  │  Resolver  │  Dispatchers  │  Assets    │
//! └────────────────────┬────────────────────────────────┘
//!                      │ routes, events, schema, auth
//! ┌────────────────────▼────────────────────────────────┐
//! │                   HostContext                        │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod assets;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod host;
pub mod loader;
pub mod plugins;

pub use assets::{Aggregator, Bundle, BundleOutputs, ConfigKind};
pub use config::Config;
pub use dispatch::{Dispatcher, Initialized};
pub use error::{Error, Result};
pub use host::{EventBus, HostContext, Middleware, Namespace, RouteGuard, RouteTable};
pub use loader::{Loader, PhaseResults};
pub use plugins::{
    Category, Descriptor, DiscoveredExtension, ExtensionManifest, ExtensionRegistry, ModuleLoader,
    Phase, PluginEntry, PluginFn, PluginModule, ProcessModules, StaticModules,
};
