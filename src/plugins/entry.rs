//! Resolved plugin code and the capability slots that hold it

use std::fmt;
use std::future::Future;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use axum::routing::MethodRouter;
use serde_json::Value;

use crate::host::{AuthRegistry, EventBus, HostContext, Namespace};

/// A plugin entry point that is a single callable
///
/// Generic (`basic`) extensions export exactly one of these. It receives the host
/// context and reports completion with an optional value.
#[async_trait]
pub trait PluginFn: Send + Sync {
    /// Run the entry point against the host
    async fn call(&self, host: HostContext) -> anyhow::Result<Value>;
}

#[async_trait]
impl<F, Fut> PluginFn for F
where
    F: Fn(HostContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send,
{
    async fn call(&self, host: HostContext) -> anyhow::Result<Value> {
        (self)(host).await
    }
}

/// A plugin entry point that exposes category hooks
///
/// Every hook is optional. Which ones are consulted depends on the extension's
/// category: routing categories use `routes`, `global_routes`, `listen`, `auth` and
/// `config_defaults`; providers additionally use `new_account`; runners use
/// `app_config` and `create`.
#[async_trait]
pub trait PluginModule: Send + Sync {
    /// Register routes under the per-resource namespace `/{org}/{repo}/api/{id}`
    fn routes(&self, _routes: &mut Namespace, _host: &HostContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Register routes under the global namespace `/ext/{id}`
    fn global_routes(&self, _routes: &mut Namespace, _host: &HostContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Subscribe to host-wide events; most plugins don't need this
    fn listen(&self, _events: &EventBus) -> anyhow::Result<()> {
        Ok(())
    }

    /// Install authentication strategies, given the merged plugin configuration
    fn auth(&self, _auth: &AuthRegistry, _config: &Value) -> anyhow::Result<()> {
        Ok(())
    }

    /// Configuration defaults that host overrides are merged onto
    fn config_defaults(&self) -> Option<Value> {
        None
    }

    /// Handler for the "new account" link of provider extensions
    fn new_account(&self) -> Option<MethodRouter> {
        None
    }

    /// Schema fragment a runner adds to the host's schema registry
    fn app_config(&self) -> Option<Value> {
        None
    }

    /// Instantiate a background worker
    async fn create(&self, _events: EventBus, _config: Option<Value>) -> anyhow::Result<Value> {
        anyhow::bail!("plugin does not provide a worker")
    }
}

/// Loaded plugin code
#[derive(Clone)]
pub enum PluginEntry {
    /// A single exported function
    Function(Arc<dyn PluginFn>),
    /// An object exposing category hooks
    Module(Arc<dyn PluginModule>),
}

impl PluginEntry {
    /// Wrap a closure as a function entry
    pub fn function<F, Fut>(f: F) -> Self
    where
        F: Fn(HostContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Self::Function(Arc::new(f))
    }

    /// Wrap a hook object as a module entry
    pub fn module(module: impl PluginModule + 'static) -> Self {
        Self::Module(Arc::new(module))
    }

    /// Whether the entry is directly callable
    #[must_use]
    pub const fn is_callable(&self) -> bool {
        matches!(self, Self::Function(_))
    }

    /// Short label for logs
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Function(_) => "function",
            Self::Module(_) => "module",
        }
    }
}

impl fmt::Debug for PluginEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PluginEntry::{}", self.kind())
    }
}

/// A capability field: either a path still to be loaded, or loaded code
#[derive(Debug, Clone)]
pub enum Capability {
    /// Path relative to the extension directory
    Unresolved(String),
    /// Loaded entry point
    Resolved(PluginEntry),
}

/// Holder for one capability on a descriptor
///
/// The only mutation allowed is the one-way promotion from `Unresolved` to
/// `Resolved`.
#[derive(Debug)]
pub struct CapabilitySlot(RwLock<Capability>);

impl CapabilitySlot {
    /// Create a slot from its declared state
    #[must_use]
    pub const fn new(capability: Capability) -> Self {
        Self(RwLock::new(capability))
    }

    /// Current state of the slot
    #[must_use]
    pub fn get(&self) -> Capability {
        self.0
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Resolved entry, if the slot has been promoted
    #[must_use]
    pub fn resolved(&self) -> Option<PluginEntry> {
        match self.get() {
            Capability::Resolved(entry) => Some(entry),
            Capability::Unresolved(_) => None,
        }
    }

    /// Promote the slot to a resolved entry
    ///
    /// Returns the entry now held by the slot; if another task promoted it first,
    /// that entry wins.
    pub fn promote(&self, entry: PluginEntry) -> PluginEntry {
        let mut guard = self
            .0
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match &*guard {
            Capability::Resolved(existing) => existing.clone(),
            Capability::Unresolved(_) => {
                *guard = Capability::Resolved(entry.clone());
                entry
            }
        }
    }
}
