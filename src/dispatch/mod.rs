//! Per-category initialization
//!
//! Each [`Category`](crate::plugins::Category) owns one [`Dispatcher`] that
//! translates its plugin contract into calls against the host context. A
//! category without a hook for a phase passes the resolved entry through.

pub mod basic;
pub mod job;
pub mod provider;
pub mod runner;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::host::{HostContext, Namespace, RouteGuard};
use crate::plugins::{Descriptor, Phase, PluginEntry, PluginModule};

/// What a dispatcher produced for one extension in one phase
#[derive(Clone)]
pub enum Initialized {
    /// The resolved entry itself, for categories with no hook in the phase
    Entry(PluginEntry),
    /// A module whose hooks have been wired into the host
    Module(Arc<dyn PluginModule>),
    /// A provider module, tagged with the deployment's hosted flag
    Provider {
        /// The provider module
        module: Arc<dyn PluginModule>,
        /// Whether the host runs hosted
        hosted: bool,
    },
    /// Value reported by a function entry or a created worker
    Value(Value),
}

impl Initialized {
    /// Reported value, if the hook produced one
    #[must_use]
    pub const fn value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Hosted flag of a provider result
    #[must_use]
    pub const fn hosted(&self) -> Option<bool> {
        match self {
            Self::Provider { hosted, .. } => Some(*hosted),
            _ => None,
        }
    }
}

impl fmt::Debug for Initialized {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entry(entry) => f.debug_tuple("Entry").field(entry).finish(),
            Self::Module(_) => f.write_str("Module"),
            Self::Provider { hosted, .. } => f.debug_struct("Provider").field("hosted", hosted).finish_non_exhaustive(),
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
        }
    }
}

/// Category-specific initialization for both phases
///
/// Both hooks default to passing the resolved entry through unchanged.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Server-side setup: routes, listeners, auth
    async fn server_setup(
        &self,
        _descriptor: &Descriptor,
        entry: PluginEntry,
        _host: &HostContext,
    ) -> anyhow::Result<Initialized> {
        Ok(Initialized::Entry(entry))
    }

    /// Background setup: workers
    async fn background_setup(
        &self,
        _descriptor: &Descriptor,
        entry: PluginEntry,
        _host: &HostContext,
    ) -> anyhow::Result<Initialized> {
        Ok(Initialized::Entry(entry))
    }
}

impl dyn Dispatcher {
    /// Run the hook for `phase`
    ///
    /// # Errors
    ///
    /// Returns whatever the hook reports
    pub async fn setup(
        &self,
        phase: Phase,
        descriptor: &Descriptor,
        entry: PluginEntry,
        host: &HostContext,
    ) -> anyhow::Result<Initialized> {
        match phase {
            Phase::Server => self.server_setup(descriptor, entry, host).await,
            Phase::Background => self.background_setup(descriptor, entry, host).await,
        }
    }
}

/// Prefix of the per-resource namespace for an extension
#[must_use]
pub fn resource_prefix(id: &str) -> String {
    format!("/{{org}}/{{repo}}/api/{id}")
}

/// Prefix of the global namespace for an extension
#[must_use]
pub fn global_prefix(id: &str) -> String {
    format!("/ext/{id}")
}

/// Register a module's per-resource and global routes
///
/// `guards` protect the per-resource namespace; the global one is unguarded.
pub(crate) fn mount_namespaces(
    descriptor: &Descriptor,
    module: &dyn PluginModule,
    host: &HostContext,
    guards: Vec<Arc<dyn RouteGuard>>,
) -> anyhow::Result<()> {
    let mut scoped = Namespace::new(&descriptor.id, resource_prefix(&descriptor.id), guards);
    module.routes(&mut scoped, host)?;
    host.routes.mount(scoped)?;

    let mut global = Namespace::new(&descriptor.id, global_prefix(&descriptor.id), Vec::new());
    module.global_routes(&mut global, host)?;
    host.routes.mount(global)?;
    Ok(())
}

/// Plugin config defaults overlaid with host overrides
///
/// Only truthy override values replace a default: `false`, `0`, `""` and
/// `null` in the host config leave the plugin default in place.
#[must_use]
pub fn merge_truthy(defaults: Option<Value>, overrides: Option<&Value>) -> Value {
    let mut merged = match defaults {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };

    if let Some(Value::Object(overrides)) = overrides {
        for (key, value) in overrides {
            if is_truthy(value) {
                merged.insert(key.clone(), value.clone());
            }
        }
    }

    Value::Object(merged)
}

/// Truthiness of a config value
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Warn about an old-style function entry in a hook-based category
pub(crate) fn legacy_passthrough(descriptor: &Descriptor, entry: PluginEntry) -> Initialized {
    tracing::warn!(
        extension = %descriptor.id,
        category = %descriptor.category,
        "legacy function entry, skipping hook wiring"
    );
    Initialized::Entry(entry)
}
