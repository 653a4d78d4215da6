//! Extension listing endpoints

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::plugins::{Category, Descriptor, ExtensionRegistry, ManifestSource, Phase};

/// Extension info returned by the API
#[derive(Debug, Clone, Serialize)]
pub struct ExtensionResponse {
    pub id: String,
    pub title: String,
    pub category: Category,
    pub weight: i64,
    pub dir: PathBuf,
    pub source: ManifestSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub webapp: bool,
    pub worker: bool,
    pub templates: usize,
}

impl From<&Descriptor> for ExtensionResponse {
    fn from(d: &Descriptor) -> Self {
        let package = d.package.as_ref();
        Self {
            id: d.id.clone(),
            title: d.title().to_string(),
            category: d.category,
            weight: d.weight,
            dir: d.dir.clone(),
            source: d.source,
            version: package.and_then(|p| p.version.clone()),
            description: package.and_then(|p| p.description.clone()),
            icon: d.manifest.icon.clone(),
            webapp: d.capability(Phase::Server).is_some(),
            worker: d.capability(Phase::Background).is_some(),
            templates: d.templates().len(),
        }
    }
}

/// Extensions sorted by weight, for listings
#[must_use]
pub fn listing(registry: &ExtensionRegistry) -> Vec<ExtensionResponse> {
    registry
        .by_weight()
        .iter()
        .map(|d| ExtensionResponse::from(d.as_ref()))
        .collect()
}

type SharedListing = Arc<Vec<ExtensionResponse>>;

/// Build extension listing routes
///
/// The registry is read once; the listing doesn't change for the life of a run.
pub fn router(registry: &ExtensionRegistry) -> Router {
    Router::new()
        .route("/", get(list_extensions))
        .route("/{id}", get(get_extension))
        .with_state(Arc::new(listing(registry)))
}

/// List all registered extensions
async fn list_extensions(State(listing): State<SharedListing>) -> Json<Vec<ExtensionResponse>> {
    Json(listing.as_ref().clone())
}

/// Get one extension by id
async fn get_extension(
    State(listing): State<SharedListing>,
    Path(id): Path<String>,
) -> Result<Json<ExtensionResponse>, StatusCode> {
    let id = id.to_lowercase();
    listing
        .iter()
        .find(|e| e.id == id)
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}
