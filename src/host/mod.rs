//! Host services handed to extensions during initialization
//!
//! [`HostContext`] bundles everything an extension may touch: configuration,
//! the route table, guard middleware, the event bus, the schema registry and
//! the auth registry. It is cheap to clone.

pub mod auth;
pub mod events;
pub mod router;
pub mod schema;

use std::sync::Arc;

use serde_json::{Value, json};

use crate::config::Config;

pub use auth::{AuthRegistry, AuthStrategy};
pub use events::{EventBus, HostEvent};
pub use router::{AllowAll, Middleware, Namespace, RouteGuard, RouteRecord, RouteTable};
pub use schema::SchemaRegistry;

/// Services shared by the host with every extension
#[derive(Clone)]
pub struct HostContext {
    /// Host configuration
    pub config: Arc<Config>,
    /// Routes mounted by extensions
    pub routes: Arc<RouteTable>,
    /// Guard middleware for extension routes
    pub middleware: Arc<Middleware>,
    /// Host-wide events
    pub events: EventBus,
    /// Configuration schema fragments
    pub schema: Arc<SchemaRegistry>,
    /// Authentication strategies
    pub auth: Arc<AuthRegistry>,
}

impl Default for HostContext {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl HostContext {
    /// Create a context with fresh registries and allow-all middleware
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            routes: Arc::new(RouteTable::new()),
            middleware: Arc::new(Middleware::default()),
            events: EventBus::new(),
            schema: Arc::new(SchemaRegistry::new()),
            auth: Arc::new(AuthRegistry::new()),
        }
    }

    /// Replace the guard middleware
    #[must_use]
    pub fn with_middleware(mut self, middleware: Middleware) -> Self {
        self.middleware = Arc::new(middleware);
        self
    }

    /// JSON view of the host for out-of-process plugins
    #[must_use]
    pub fn snapshot(&self) -> Value {
        json!({
            "config": {
                "hosted": self.config.hosted,
                "plugins": self.config.plugins,
                "runners": self.config.runners,
                "frameworkRoot": self.config.assets.framework_root,
            },
            "routes": self.routes.records(),
            "schema": self.schema.paths(),
            "auth": self.auth.names(),
        })
    }
}

impl std::fmt::Debug for HostContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostContext")
            .field("config", &self.config)
            .field("routes", &self.routes.records().len())
            .field("auth", &self.auth)
            .finish_non_exhaustive()
    }
}
