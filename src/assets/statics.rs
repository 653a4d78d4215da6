//! Static asset directories
//!
//! An extension with a `static` subdirectory gets it served under `/ext/{id}`.

use crate::dispatch::global_prefix;
use crate::host::RouteTable;
use crate::plugins::ExtensionRegistry;
use crate::{Error, Result};

/// Name of the static asset subdirectory
pub const STATIC_DIR: &str = "static";

/// Mount every extension's static directory, returning the ids served
///
/// # Errors
///
/// Returns [`Error::Mount`] naming the first extension whose directory can't be
/// mounted; directories mounted before it stay mounted.
pub async fn mount_static_dirs(registry: &ExtensionRegistry, routes: &RouteTable) -> Result<Vec<String>> {
    let mut mounted = Vec::new();
    for descriptor in registry.iter() {
        let dir = descriptor.dir.join(STATIC_DIR);
        let is_dir = tokio::fs::metadata(&dir).await.is_ok_and(|m| m.is_dir());
        if !is_dir {
            continue;
        }
        let path = global_prefix(&descriptor.id);
        routes
            .mount_static(&descriptor.id, &path, &dir)
            .map_err(|source| Error::Mount {
                id: descriptor.id.clone(),
                path,
                source,
            })?;
        mounted.push(descriptor.id.clone());
    }
    Ok(mounted)
}
