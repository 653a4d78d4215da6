//! Normalized in-memory record of one discovered extension

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::entry::{Capability, CapabilitySlot};
use super::manifest::{ExtensionManifest, PackageInfo};
use crate::dispatch::{self, Dispatcher};

/// Category used when a manifest declares none
pub const DEFAULT_CATEGORY: Category = Category::Basic;

/// Weight used when a manifest declares none
pub const DEFAULT_WEIGHT: i64 = -1;

/// Closed set of extension categories
///
/// The declaration order is the registry's iteration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Request-routing extension (per-resource and global routes)
    Job,
    /// Background worker instantiated against the event bus
    Runner,
    /// External service provider (routes guarded by provider association)
    Provider,
    /// Generic extension exporting a single function
    Basic,
}

impl Category {
    /// All categories in iteration order
    pub const ALL: [Self; 4] = [Self::Job, Self::Runner, Self::Provider, Self::Basic];

    /// Wire name of the category
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Job => "job",
            Self::Runner => "runner",
            Self::Provider => "provider",
            Self::Basic => "basic",
        }
    }

    /// Dispatcher translating this category's plugin contract into host calls
    #[must_use]
    pub fn dispatcher(self) -> &'static dyn Dispatcher {
        match self {
            Self::Job => &dispatch::job::JobDispatcher,
            Self::Runner => &dispatch::runner::RunnerDispatcher,
            Self::Provider => &dispatch::provider::ProviderDispatcher,
            Self::Basic => &dispatch::basic::BasicDispatcher,
        }
    }

    /// Manifest field holding the per-user configuration block
    #[must_use]
    pub const fn user_config_key(self) -> &'static str {
        match self {
            Self::Provider => "accountConfig",
            _ => "userConfig",
        }
    }

    /// Default UI controller name for configuration blocks
    #[must_use]
    pub fn controller_name(self) -> String {
        let name = self.as_str();
        let mut chars = name.chars();
        chars.next().map_or_else(String::new, |first| {
            format!("{}{}Controller", first.to_ascii_uppercase(), chars.as_str())
        })
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "job" => Ok(Self::Job),
            "runner" => Ok(Self::Runner),
            "provider" => Ok(Self::Provider),
            "basic" => Ok(Self::Basic),
            other => Err(other.to_string()),
        }
    }
}

/// Initialization phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Server-side setup (routes, auth, listeners)
    Server,
    /// Background-process setup (workers)
    Background,
}

impl Phase {
    /// Manifest field holding this phase's entry point
    #[must_use]
    pub const fn field(self) -> &'static str {
        match self {
            Self::Server => "webapp",
            Self::Background => "worker",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Server => "server",
            Self::Background => "background",
        })
    }
}

/// Where the manifest came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifestSource {
    /// Dedicated `extension.json`
    ManifestFile,
    /// `extension` section of `package.json`
    PackageSection,
    /// Registered in code by the host
    Inline,
}

/// A registered extension
///
/// Created by the registry from a discovered manifest. Immutable afterwards except
/// for the capability slots, which may be promoted once from a path to loaded code.
#[derive(Debug)]
pub struct Descriptor {
    /// Lower-cased unique id
    pub id: String,
    /// Category deciding which dispatcher handles the extension
    pub category: Category,
    /// Absolute extension directory; anchor for every relative lookup
    pub dir: PathBuf,
    /// Ordering hint for list-style enumeration
    pub weight: i64,
    /// Where the manifest came from
    pub source: ManifestSource,
    /// Raw manifest (category-specific fields live here)
    pub manifest: ExtensionManifest,
    /// Package metadata, when a `package.json` was present
    pub package: Option<PackageInfo>,
    webapp: Option<CapabilitySlot>,
    worker: Option<CapabilitySlot>,
}

impl Descriptor {
    /// Assemble a descriptor from already normalized parts
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: String,
        category: Category,
        dir: PathBuf,
        source: ManifestSource,
        manifest: ExtensionManifest,
        package: Option<PackageInfo>,
        webapp: Option<Capability>,
        worker: Option<Capability>,
    ) -> Self {
        Self {
            id,
            category,
            weight: manifest.weight.unwrap_or(DEFAULT_WEIGHT),
            dir,
            source,
            manifest,
            package,
            webapp: webapp.map(CapabilitySlot::new),
            worker: worker.map(CapabilitySlot::new),
        }
    }

    /// Capability slot for a phase, if the extension declares one
    #[must_use]
    pub const fn capability(&self, phase: Phase) -> Option<&CapabilitySlot> {
        match phase {
            Phase::Server => self.webapp.as_ref(),
            Phase::Background => self.worker.as_ref(),
        }
    }

    /// Title shown in the host UI, falling back to the id
    #[must_use]
    pub fn title(&self) -> &str {
        self.manifest.title.as_deref().unwrap_or(&self.id)
    }

    /// Declared templates
    #[must_use]
    pub const fn templates(&self) -> &IndexMap<String, String> {
        &self.manifest.templates
    }

    /// Category-specific manifest field
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.manifest.field(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parsing_is_case_insensitive() {
        assert_eq!("Job".parse::<Category>(), Ok(Category::Job));
        assert_eq!("RUNNER".parse::<Category>(), Ok(Category::Runner));
        assert_eq!("nope".parse::<Category>(), Err("nope".to_string()));
    }

    #[test]
    fn controller_names() {
        assert_eq!(Category::Job.controller_name(), "JobController");
        assert_eq!(Category::Provider.controller_name(), "ProviderController");
    }

    #[test]
    fn provider_overrides_user_config_key() {
        assert_eq!(Category::Provider.user_config_key(), "accountConfig");
        assert_eq!(Category::Job.user_config_key(), "userConfig");
        assert_eq!(Category::Basic.user_config_key(), "userConfig");
    }

    #[test]
    fn weight_defaults_to_minus_one() {
        let descriptor = Descriptor::new(
            "demo".into(),
            Category::Basic,
            PathBuf::from("/tmp/demo"),
            ManifestSource::Inline,
            ExtensionManifest::default(),
            None,
            None,
            None,
        );
        assert_eq!(descriptor.weight, DEFAULT_WEIGHT);
        assert_eq!(descriptor.title(), "demo");
        assert!(descriptor.capability(Phase::Server).is_none());
    }
}
