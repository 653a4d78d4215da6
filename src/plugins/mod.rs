//! Extension discovery, registration and capability resolution
//!
//! Extensions are directories holding an `extension.json` manifest (or a
//! `package.json` with an `extension` section). Each declares a category that
//! decides how it is initialized, plus entry points for the server and
//! background phases.

pub mod descriptor;
pub mod discovery;
pub mod entry;
pub mod manifest;
pub mod process;
pub mod registry;
pub mod resolve;

pub use descriptor::{Category, Descriptor, ManifestSource, Phase};
pub use discovery::{DiscoveredExtension, default_extension_dirs, discover_extensions};
pub use entry::{Capability, CapabilitySlot, PluginEntry, PluginFn, PluginModule};
pub use manifest::{ExtensionManifest, PackageInfo};
pub use process::ProcessModules;
pub use registry::{ExtensionRegistry, RESERVED_IDS};
pub use resolve::{ModuleLoader, Resolver, StaticModules};
