//! Extension registry - categorized, uniquely keyed store of descriptors

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;

use super::descriptor::{Category, DEFAULT_CATEGORY, Descriptor, Phase};
use super::discovery::DiscoveredExtension;
use super::entry::Capability;
use crate::{Error, Result};

/// Ids the host keeps for its own route prefixes
pub const RESERVED_IDS: &[&str] = &["api", "config", "provider", "ext"];

/// Registered extensions, keyed by category then id
///
/// Iteration is categories in [`Category::ALL`] order, then ids in registration
/// order. The registry lives for one orchestrator run; nothing is persisted.
#[derive(Debug, Default)]
pub struct ExtensionRegistry {
    extensions: BTreeMap<Category, IndexMap<String, Arc<Descriptor>>>,
}

impl ExtensionRegistry {
    /// Create a new empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize and register a batch of discovered extensions
    ///
    /// The whole batch is validated before anything is inserted, so a failing
    /// call leaves the registry exactly as it was. Returns the normalized ids in
    /// batch order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReservedId`], [`Error::DuplicateId`] (across categories,
    /// case-insensitive, against both the batch and prior registrations),
    /// [`Error::InvalidId`], [`Error::UnknownCategory`] or [`Error::MissingId`].
    pub fn register(&mut self, discovered: Vec<DiscoveredExtension>) -> Result<Vec<String>> {
        let mut seen: HashMap<String, PathBuf> = HashMap::new();
        let mut staged = Vec::with_capacity(discovered.len());

        for ext in discovered {
            let descriptor = normalize(ext)?;

            let existing = self
                .get(&descriptor.id)
                .map(|d| d.dir.clone())
                .or_else(|| seen.get(&descriptor.id).cloned());
            if let Some(existing) = existing {
                return Err(Error::DuplicateId {
                    id: descriptor.id,
                    dir: descriptor.dir,
                    existing,
                });
            }

            seen.insert(descriptor.id.clone(), descriptor.dir.clone());
            staged.push(descriptor);
        }

        let mut ids = Vec::with_capacity(staged.len());
        for descriptor in staged {
            tracing::info!(
                extension = %descriptor.id,
                category = %descriptor.category,
                weight = descriptor.weight,
                path = %descriptor.dir.display(),
                "registered extension"
            );
            ids.push(descriptor.id.clone());
            self.extensions
                .entry(descriptor.category)
                .or_default()
                .insert(descriptor.id.clone(), Arc::new(descriptor));
        }

        Ok(ids)
    }

    /// Get an extension by id, in any category
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Arc<Descriptor>> {
        let id = id.to_lowercase();
        self.extensions.values().find_map(|by_id| by_id.get(&id))
    }

    /// Extensions of one category, in registration order
    pub fn category(&self, category: Category) -> impl Iterator<Item = &Arc<Descriptor>> {
        self.extensions
            .get(&category)
            .into_iter()
            .flat_map(IndexMap::values)
    }

    /// All extensions in registry iteration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Descriptor>> {
        Category::ALL
            .into_iter()
            .flat_map(move |category| self.category(category))
    }

    /// All extensions sorted by ascending weight
    ///
    /// The sort is stable, so equal weights keep registry order.
    #[must_use]
    pub fn by_weight(&self) -> Vec<Arc<Descriptor>> {
        let mut list: Vec<_> = self.iter().cloned().collect();
        list.sort_by_key(|d| d.weight);
        list
    }

    /// Number of registered extensions
    #[must_use]
    pub fn len(&self) -> usize {
        self.extensions.values().map(IndexMap::len).sum()
    }

    /// Whether no extensions are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Turn a discovered extension into a descriptor
///
/// Lower-cases the id, defaults the category and picks in-code entries over
/// declared paths.
fn normalize(mut ext: DiscoveredExtension) -> Result<Descriptor> {
    let id = ext.id.trim().to_lowercase();
    if id.is_empty() {
        return Err(Error::MissingId { dir: ext.dir });
    }

    if RESERVED_IDS.contains(&id.as_str()) {
        return Err(Error::ReservedId { id, dir: ext.dir });
    }

    // Ids become route path segments (`/ext/{id}`)
    if let Some(character) = id.chars().find(|c| is_path_significant(*c)) {
        return Err(Error::InvalidId {
            id,
            character,
            dir: ext.dir,
        });
    }

    let category = match ext.manifest.kind.as_deref().map(str::trim) {
        None | Some("") => DEFAULT_CATEGORY,
        Some(kind) => kind.parse::<Category>().map_err(|kind| Error::UnknownCategory {
            id: id.clone(),
            kind,
            dir: ext.dir.clone(),
        })?,
    };

    let webapp = capability(&mut ext, Phase::Server);
    let worker = capability(&mut ext, Phase::Background);

    Ok(Descriptor::new(
        id,
        category,
        ext.dir,
        ext.source,
        ext.manifest,
        ext.package,
        webapp,
        worker,
    ))
}

fn is_path_significant(c: char) -> bool {
    matches!(c, '/' | '\\' | '{' | '}' | '*' | '?' | '#' | '%') || c.is_whitespace() || c.is_control()
}

fn capability(ext: &mut DiscoveredExtension, phase: Phase) -> Option<Capability> {
    let declared = match phase {
        Phase::Server => ext.manifest.webapp.clone(),
        Phase::Background => ext.manifest.worker.clone(),
    };
    ext.entries
        .remove(&phase)
        .map(Capability::Resolved)
        .or_else(|| declared.map(Capability::Unresolved))
}
