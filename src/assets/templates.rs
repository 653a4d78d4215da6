//! Template collection
//!
//! Extensions declare `templates: {name: value}`. A value ending in `.html` is a
//! file relative to the extension directory; anything else is inline markup.

use futures::future::try_join_all;
use indexmap::IndexMap;

use crate::plugins::{Descriptor, ExtensionRegistry};
use crate::{Error, Result};

/// Collect every extension's templates by name
///
/// Later extensions in registry order win on name collisions.
///
/// # Errors
///
/// Returns [`Error::MissingFragment`] when a declared `.html` file is missing,
/// or [`Error::Fragment`] when it can't be read.
pub async fn collect_templates(registry: &ExtensionRegistry) -> Result<IndexMap<String, String>> {
    let per_extension = try_join_all(registry.iter().map(|d| extension_templates(d))).await?;

    let mut templates = IndexMap::new();
    for (name, text) in per_extension.into_iter().flatten() {
        templates.insert(name, text);
    }
    tracing::debug!(count = templates.len(), "collected templates");
    Ok(templates)
}

async fn extension_templates(descriptor: &Descriptor) -> Result<Vec<(String, String)>> {
    try_join_all(
        descriptor
            .templates()
            .iter()
            .map(|(name, value)| load_template(descriptor, name, value)),
    )
    .await
}

async fn load_template(descriptor: &Descriptor, name: &str, value: &str) -> Result<(String, String)> {
    if !value.ends_with(".html") {
        return Ok((name.to_string(), value.to_string()));
    }

    let path = descriptor.dir.join(value);
    let text = tokio::fs::read_to_string(&path).await.map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            Error::MissingFragment {
                id: descriptor.id.clone(),
                path: path.clone(),
                source,
            }
        } else {
            Error::Fragment {
                id: descriptor.id.clone(),
                path: path.clone(),
                source,
            }
        }
    })?;
    Ok((name.to_string(), text))
}
