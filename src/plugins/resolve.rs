//! Capability resolution - turning declared entry-point paths into loaded code

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::OnceCell;

use super::descriptor::{Descriptor, Phase};
use super::entry::{Capability, PluginEntry};
use crate::{Error, Result};

/// Loads plugin code from a path
///
/// Called at most once per absolute path for the lifetime of a [`Resolver`].
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    /// Load the entry point at `path`
    async fn load(&self, path: &Path) -> anyhow::Result<PluginEntry>;
}

/// Per-registry resolution cache
///
/// Keyed by absolute path, never invalidated: one load per path per registry.
pub struct Resolver {
    loader: Arc<dyn ModuleLoader>,
    cache: Mutex<HashMap<PathBuf, Arc<OnceCell<PluginEntry>>>>,
}

impl Resolver {
    /// Create a resolver backed by `loader`
    #[must_use]
    pub fn new(loader: Arc<dyn ModuleLoader>) -> Self {
        Self {
            loader,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve the entry point an extension declares for `phase`
    ///
    /// Returns `None` when the extension has no capability for the phase. A
    /// path-valued capability is loaded (or taken from the cache) and the
    /// descriptor's slot is promoted to the loaded entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Resolve`] carrying the extension id and the loader's error.
    pub async fn resolve(&self, descriptor: &Descriptor, phase: Phase) -> Result<Option<PluginEntry>> {
        let Some(slot) = descriptor.capability(phase) else {
            return Ok(None);
        };

        let path = match slot.get() {
            Capability::Resolved(entry) => return Ok(Some(entry)),
            Capability::Unresolved(relative) => absolute_entry_path(&descriptor.dir, &relative),
        };

        let cell = {
            let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(cache.entry(path.clone()).or_default())
        };

        let entry = cell
            .get_or_try_init(|| async {
                tracing::debug!(
                    extension = %descriptor.id,
                    phase = %phase,
                    path = %path.display(),
                    "loading plugin entry"
                );
                self.loader.load(&path).await
            })
            .await
            .map_err(|source| Error::Resolve {
                id: descriptor.id.clone(),
                phase,
                path: path.clone(),
                source,
            })?
            .clone();

        Ok(Some(slot.promote(entry)))
    }

    /// Number of distinct paths loaded so far
    #[must_use]
    pub fn loaded(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }
}

/// Join a declared path onto the extension directory, dropping `.` components
fn absolute_entry_path(dir: &Path, relative: &str) -> PathBuf {
    dir.join(relative).components().collect()
}

/// In-process module table
///
/// For extensions whose code is compiled into the host. Lookups try the full
/// absolute path first, then the bare file stem (`webapp.sh` matches `webapp`).
#[derive(Clone, Default)]
pub struct StaticModules {
    entries: HashMap<PathBuf, PluginEntry>,
}

impl StaticModules {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entry under a path or stem
    #[must_use]
    pub fn with(mut self, key: impl Into<PathBuf>, entry: PluginEntry) -> Self {
        self.entries.insert(key.into(), entry);
        self
    }

    /// Register an entry under a path or stem
    pub fn insert(&mut self, key: impl Into<PathBuf>, entry: PluginEntry) {
        self.entries.insert(key.into(), entry);
    }
}

#[async_trait]
impl ModuleLoader for StaticModules {
    async fn load(&self, path: &Path) -> anyhow::Result<PluginEntry> {
        if let Some(entry) = self.entries.get(path) {
            return Ok(entry.clone());
        }
        path.file_stem()
            .and_then(|stem| self.entries.get(Path::new(stem)))
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no module registered for {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::plugins::{DiscoveredExtension, ExtensionManifest, ExtensionRegistry};

    struct Counting {
        loads: AtomicUsize,
    }

    #[async_trait]
    impl ModuleLoader for Counting {
        async fn load(&self, path: &Path) -> anyhow::Result<PluginEntry> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if path.ends_with("broken.sh") {
                anyhow::bail!("syntax error in {}", path.display());
            }
            Ok(PluginEntry::function(|_| async { Ok(serde_json::json!("ok")) }))
        }
    }

    fn registry_with(webapp: &str) -> ExtensionRegistry {
        let mut registry = ExtensionRegistry::new();
        let ext = DiscoveredExtension::inline("demo", "/srv/ext/demo").with_manifest(
            ExtensionManifest {
                webapp: Some(webapp.into()),
                worker: Some(format!("./{webapp}")),
                ..ExtensionManifest::default()
            },
        );
        registry.register(vec![ext]).unwrap();
        registry
    }

    #[tokio::test]
    async fn resolves_once_and_promotes_slot() {
        let loader = Arc::new(Counting {
            loads: AtomicUsize::new(0),
        });
        let resolver = Resolver::new(loader.clone());
        let registry = registry_with("webapp.sh");
        let descriptor = registry.get("demo").unwrap();

        let first = resolver.resolve(descriptor, Phase::Server).await.unwrap();
        assert!(first.unwrap().is_callable());
        assert!(descriptor.capability(Phase::Server).unwrap().resolved().is_some());

        // Same path through the other phase (spelled `./webapp.sh`) hits the cache
        resolver.resolve(descriptor, Phase::Background).await.unwrap();
        resolver.resolve(descriptor, Phase::Server).await.unwrap();

        assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
        assert_eq!(resolver.loaded(), 1);
    }

    #[tokio::test]
    async fn failure_names_the_extension() {
        let resolver = Resolver::new(Arc::new(Counting {
            loads: AtomicUsize::new(0),
        }));
        let registry = registry_with("broken.sh");
        let descriptor = registry.get("demo").unwrap();

        let err = resolver.resolve(descriptor, Phase::Server).await.unwrap_err();
        assert_eq!(err.extension_id(), Some("demo"));
        let message = err.to_string();
        assert!(message.contains("demo"));
        assert!(message.contains("syntax error"));
        assert!(descriptor.capability(Phase::Server).unwrap().resolved().is_none());
    }

    #[tokio::test]
    async fn static_modules_match_by_stem() {
        let modules = StaticModules::new()
            .with("webapp", PluginEntry::function(|_| async { Ok(serde_json::Value::Null) }));

        assert!(modules.load(Path::new("/srv/ext/demo/webapp.sh")).await.is_ok());
        assert!(modules.load(Path::new("/srv/ext/demo/worker.sh")).await.is_err());
    }
}
