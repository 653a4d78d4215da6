//! Route namespaces and the host route table
//!
//! Extensions never touch the host router directly. They fill a [`Namespace`]
//! (a path prefix plus guard middleware) and the host mounts it, recording which
//! extension owns which path.

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use axum::Router;
use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::MethodRouter;
use serde::Serialize;
use tower_http::services::ServeDir;

/// Request check run before an extension handler
///
/// Guards run in the order the namespace lists them; the first one returning
/// `Err` short-circuits with its response.
#[async_trait]
pub trait RouteGuard: Send + Sync {
    /// Inspect (and possibly annotate) a request bound for `extension`
    async fn check(&self, extension: &str, request: &mut Request) -> Result<(), Response>;
}

/// Guard that lets every request through
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl RouteGuard for AllowAll {
    async fn check(&self, _extension: &str, _request: &mut Request) -> Result<(), Response> {
        Ok(())
    }
}

/// Host-provided guard middleware
#[derive(Clone)]
pub struct Middleware {
    /// Looks up the `{org}/{repo}` resource addressed by the request
    pub resource: Arc<dyn RouteGuard>,
    /// Checks the resource has the extension enabled
    pub plugin_resource: Arc<dyn RouteGuard>,
    /// Checks the resource is associated with the provider extension
    pub provider: Arc<dyn RouteGuard>,
    /// Requires a logged-in user
    pub login_required: Arc<dyn RouteGuard>,
}

impl Default for Middleware {
    fn default() -> Self {
        Self {
            resource: Arc::new(AllowAll),
            plugin_resource: Arc::new(AllowAll),
            provider: Arc::new(AllowAll),
            login_required: Arc::new(AllowAll),
        }
    }
}

/// Join a namespace prefix and a relative path
#[must_use]
pub fn join(prefix: &str, path: &str) -> String {
    let prefix = prefix.strip_suffix('/').unwrap_or(prefix);
    if path.starts_with('/') {
        format!("{prefix}{path}")
    } else {
        format!("{prefix}/{path}")
    }
}

/// Routes one extension registers under a common prefix and guard chain
pub struct Namespace {
    extension: String,
    prefix: String,
    guards: Vec<Arc<dyn RouteGuard>>,
    routes: Vec<(String, MethodRouter)>,
}

impl Namespace {
    /// Create an empty namespace
    #[must_use]
    pub fn new(
        extension: impl Into<String>,
        prefix: impl Into<String>,
        guards: Vec<Arc<dyn RouteGuard>>,
    ) -> Self {
        Self {
            extension: extension.into(),
            prefix: prefix.into(),
            guards,
            routes: Vec::new(),
        }
    }

    /// Register a handler at `path`, relative to the prefix
    ///
    /// All methods for one path go in a single `MethodRouter`.
    pub fn route(&mut self, path: &str, handler: MethodRouter) -> &mut Self {
        self.routes.push((join(&self.prefix, path), handler));
        self
    }

    /// The namespace prefix
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Full paths registered so far
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|(path, _)| path.as_str())
    }

    /// Whether nothing has been registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// A path mounted on behalf of an extension
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteRecord {
    /// Owning extension id
    pub extension: String,
    /// Full route path
    pub path: String,
    /// Whether the path serves a static directory
    pub is_static: bool,
}

#[derive(Clone)]
struct GuardChain {
    extension: Arc<str>,
    guards: Arc<[Arc<dyn RouteGuard>]>,
}

async fn run_guards(State(chain): State<GuardChain>, mut request: Request, next: Next) -> Response {
    for guard in chain.guards.iter() {
        if let Err(response) = guard.check(&chain.extension, &mut request).await {
            return response;
        }
    }
    next.run(request).await
}

struct RouteTableInner {
    router: Router,
    records: Vec<RouteRecord>,
}

/// Build on a copy of `router`, so a path axum rejects leaves the original intact
///
/// Axum reports invalid and overlapping paths by panicking.
fn extend(router: &Router, build: impl FnOnce(Router) -> Router) -> anyhow::Result<Router> {
    let base = router.clone();
    panic::catch_unwind(AssertUnwindSafe(move || build(base))).map_err(|payload| {
        let message = payload
            .downcast_ref::<String>()
            .map(String::as_str)
            .or_else(|| payload.downcast_ref::<&str>().copied())
            .unwrap_or("invalid route");
        anyhow::anyhow!("{message}")
    })
}

/// Append-only table of routes mounted by extensions
pub struct RouteTable {
    inner: Mutex<RouteTableInner>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteTable {
    /// Create an empty route table
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RouteTableInner {
                router: Router::new(),
                records: Vec::new(),
            }),
        }
    }

    /// Mount a namespace, wrapping each handler in its guard chain
    ///
    /// Returns the number of routes mounted.
    ///
    /// # Errors
    ///
    /// Returns error if a path is already mounted, is registered twice by the
    /// namespace, or is rejected by the router. Nothing from the namespace is
    /// mounted in that case.
    pub fn mount(&self, namespace: Namespace) -> anyhow::Result<usize> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        let mut paths = HashSet::new();
        for path in namespace.paths() {
            if let Some(owner) = inner.records.iter().find(|r| r.path == path) {
                anyhow::bail!("route {path} is already registered by `{}`", owner.extension);
            }
            if !paths.insert(path.to_string()) {
                anyhow::bail!(
                    "route {path} is registered twice by `{}`; put every method in one handler",
                    namespace.extension
                );
            }
        }

        let chain = GuardChain {
            extension: Arc::from(namespace.extension.as_str()),
            guards: Arc::from(namespace.guards),
        };
        let mounted: Vec<String> = namespace.routes.iter().map(|(path, _)| path.clone()).collect();
        let routes = namespace.routes;

        let router = extend(&inner.router, move |mut router| {
            for (path, handler) in routes {
                let handler = if chain.guards.is_empty() {
                    handler
                } else {
                    handler.route_layer(middleware::from_fn_with_state(chain.clone(), run_guards))
                };
                router = router.route(&path, handler);
            }
            router
        })
        .map_err(|e| anyhow::anyhow!("cannot mount routes for `{}`: {e}", namespace.extension))?;

        inner.router = router;
        for path in &mounted {
            tracing::debug!(extension = %namespace.extension, path = %path, "mounted route");
        }
        let count = mounted.len();
        inner
            .records
            .extend(mounted.into_iter().map(|path| RouteRecord {
                extension: namespace.extension.clone(),
                path,
                is_static: false,
            }));

        Ok(count)
    }

    /// Serve a directory under `path` on behalf of an extension
    ///
    /// # Errors
    ///
    /// Returns error if `path` is already mounted or the router rejects it; the
    /// table is unchanged in that case.
    pub fn mount_static(&self, extension: &str, path: &str, dir: &Path) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(owner) = inner.records.iter().find(|r| r.path == path) {
            anyhow::bail!("route {path} is already registered by `{}`", owner.extension);
        }

        let service = ServeDir::new(dir);
        inner.router = extend(&inner.router, |router| router.nest_service(path, service))?;
        tracing::debug!(extension = %extension, path = %path, dir = %dir.display(), "mounted static dir");
        inner.records.push(RouteRecord {
            extension: extension.to_string(),
            path: path.to_string(),
            is_static: true,
        });
        Ok(())
    }

    /// Everything mounted so far
    #[must_use]
    pub fn records(&self) -> Vec<RouteRecord> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .records
            .clone()
    }

    /// Take the assembled router, leaving an empty one behind
    ///
    /// Records are kept so ownership can still be reported.
    #[must_use]
    pub fn take_router(&self) -> Router {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut inner.router, Router::new())
    }
}
