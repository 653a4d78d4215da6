//! Health and route ownership endpoints

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::host::{RouteRecord, RouteTable};

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Liveness probe - is the service running?
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Routes mounted by extensions and who owns them
async fn routes(State(table): State<Arc<RouteTable>>) -> Json<Vec<RouteRecord>> {
    Json(table.records())
}

/// Build health router (liveness only, no state needed)
pub fn router() -> Router {
    Router::new().route("/health", get(health))
}

/// Build the route ownership listing
pub fn routes_router(table: Arc<RouteTable>) -> Router {
    Router::new().route("/", get(routes)).with_state(table)
}
