//! HTTP API server for the extension host

pub mod extensions;
pub mod health;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::host::HostContext;
use crate::plugins::ExtensionRegistry;
use crate::Result;

/// API server
pub struct ApiServer {
    router: Router,
    port: u16,
}

impl ApiServer {
    /// Assemble the host API and every route extensions mounted on `host`
    ///
    /// Takes the router out of the host's route table; mount extensions first.
    #[must_use]
    pub fn new(registry: &ExtensionRegistry, host: &HostContext, port: u16) -> Self {
        let router = Router::new()
            .nest("/api/extensions", extensions::router(registry))
            .nest("/api/routes", health::routes_router(host.routes.clone()))
            .merge(health::router())
            .merge(host.routes.take_router())
            .layer(TraceLayer::new_for_http());

        Self { router, port }
    }

    /// The assembled router
    #[must_use]
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, self.router)
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }
}
