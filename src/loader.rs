//! Initialization orchestrator
//!
//! Sequences discovery, registration and the two initialization phases, and
//! gives access to the asset passes (templates, static dirs, config bundles).

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;
use tokio::task::{Id, JoinSet};

use crate::assets::{self, Aggregator, Bundle, BundleOutputs, ConfigKind};
use crate::dispatch::Initialized;
use crate::host::{HostContext, RouteTable};
use crate::plugins::{
    Category, Descriptor, DiscoveredExtension, ExtensionRegistry, ModuleLoader, Phase, Resolver,
    discover_extensions,
};
use crate::{Error, Result};

/// Results of one phase, by category then id, in registry order
pub type PhaseResults = BTreeMap<Category, IndexMap<String, Initialized>>;

/// Owns the registry and resolution cache for one run
pub struct Loader {
    registry: ExtensionRegistry,
    resolver: Arc<Resolver>,
}

impl Loader {
    /// Create a loader resolving entry paths with `modules`
    #[must_use]
    pub fn new(modules: Arc<dyn ModuleLoader>) -> Self {
        Self {
            registry: ExtensionRegistry::new(),
            resolver: Arc::new(Resolver::new(modules)),
        }
    }

    /// Registered extensions
    #[must_use]
    pub const fn registry(&self) -> &ExtensionRegistry {
        &self.registry
    }

    /// Resolution cache shared by both phases
    #[must_use]
    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Discover extensions under `dirs` and register them
    ///
    /// Returns the registered ids.
    ///
    /// # Errors
    ///
    /// Returns the first discovery or registration error; the registry is left
    /// unchanged in that case.
    pub async fn collect_extensions(&mut self, dirs: &[PathBuf]) -> Result<Vec<String>> {
        let discovered = discover_extensions(dirs).await?;
        tracing::debug!(roots = dirs.len(), found = discovered.len(), "discovered extensions");
        self.register(discovered)
    }

    /// Register extensions declared in code or discovered elsewhere
    ///
    /// # Errors
    ///
    /// Returns the registry's validation error
    pub fn register(&mut self, extensions: Vec<DiscoveredExtension>) -> Result<Vec<String>> {
        let ids = self.registry.register(extensions)?;
        tracing::info!(registered = ids.len(), total = self.registry.len(), "registered extensions");
        Ok(ids)
    }

    /// Server-side setup for every extension declaring a `webapp` entry
    ///
    /// # Errors
    ///
    /// See [`Loader::run_phase`]
    pub async fn init_webapp_extensions(&self, host: &HostContext) -> Result<PhaseResults> {
        self.run_phase(Phase::Server, host).await
    }

    /// Background setup for every extension declaring a `worker` entry
    ///
    /// # Errors
    ///
    /// See [`Loader::run_phase`]
    pub async fn init_worker_extensions(&self, host: &HostContext) -> Result<PhaseResults> {
        self.run_phase(Phase::Background, host).await
    }

    /// Run one phase across all extensions concurrently
    ///
    /// Extensions without an entry for the phase are skipped. The first failure
    /// ends the phase: tasks still running are detached and their results
    /// dropped, and no partial map is returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Resolve`] or [`Error::Dispatch`] for the first extension
    /// that fails.
    pub async fn run_phase(&self, phase: Phase, host: &HostContext) -> Result<PhaseResults> {
        let mut tasks = JoinSet::new();
        let mut owners: HashMap<Id, Arc<Descriptor>> = HashMap::new();

        for descriptor in self.registry.iter() {
            if descriptor.capability(phase).is_none() {
                continue;
            }
            let task_descriptor = Arc::clone(descriptor);
            let resolver = Arc::clone(&self.resolver);
            let host = host.clone();
            let handle = tasks.spawn(async move {
                initialize(&resolver, &task_descriptor, phase, &host).await
            });
            owners.insert(handle.id(), Arc::clone(descriptor));
        }

        tracing::info!(phase = %phase, extensions = owners.len(), "starting phase");

        let mut completed: HashMap<String, Initialized> = HashMap::new();
        while let Some(joined) = tasks.join_next_with_id().await {
            let outcome = match joined {
                Ok((id, result)) => result.map(|init| (id, init)),
                Err(e) => Err(task_failure(&owners, phase, &e)),
            };

            match outcome {
                Ok((task, Some(init))) => {
                    if let Some(descriptor) = owners.get(&task) {
                        completed.insert(descriptor.id.clone(), init);
                    }
                }
                Ok((_, None)) => {}
                Err(e) => {
                    tracing::error!(phase = %phase, error = %e, "phase aborted");
                    tasks.detach_all();
                    return Err(e);
                }
            }
        }

        let mut results = PhaseResults::new();
        for descriptor in self.registry.iter() {
            if let Some(init) = completed.remove(&descriptor.id) {
                results
                    .entry(descriptor.category)
                    .or_default()
                    .insert(descriptor.id.clone(), init);
            }
        }

        tracing::info!(
            phase = %phase,
            initialized = results.values().map(IndexMap::len).sum::<usize>(),
            "phase complete"
        );
        Ok(results)
    }

    /// Collect declared templates by name
    ///
    /// # Errors
    ///
    /// Returns error if a declared `.html` template can't be read
    pub async fn init_templates(&self) -> Result<IndexMap<String, String>> {
        assets::collect_templates(&self.registry).await
    }

    /// Serve each extension's `static` directory under `/ext/{id}`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Mount`] when a directory can't be mounted
    pub async fn init_static_dirs(&self, routes: &RouteTable) -> Result<Vec<String>> {
        let mounted = assets::mount_static_dirs(&self.registry, routes).await?;
        tracing::debug!(count = mounted.len(), "mounted static dirs");
        Ok(mounted)
    }

    /// Build the configuration bundle for `kind`
    ///
    /// # Errors
    ///
    /// See [`Aggregator::aggregate`]
    pub async fn init_config(
        &self,
        aggregator: &Aggregator,
        kind: ConfigKind,
        outputs: &BundleOutputs,
    ) -> Result<Bundle> {
        aggregator.aggregate(&self.registry, kind, outputs).await
    }
}

/// Resolve and dispatch one extension for one phase
async fn initialize(
    resolver: &Resolver,
    descriptor: &Descriptor,
    phase: Phase,
    host: &HostContext,
) -> Result<Option<Initialized>> {
    let Some(entry) = resolver.resolve(descriptor, phase).await? else {
        return Ok(None);
    };

    tracing::debug!(
        extension = %descriptor.id,
        category = %descriptor.category,
        phase = %phase,
        entry = entry.kind(),
        "dispatching"
    );

    descriptor
        .category
        .dispatcher()
        .setup(phase, descriptor, entry, host)
        .await
        .map(Some)
        .map_err(|source| Error::Dispatch {
            id: descriptor.id.clone(),
            phase,
            dir: descriptor.dir.clone(),
            source,
        })
}

/// Turn a panicked or cancelled task into an error naming its extension
fn task_failure(
    owners: &HashMap<Id, Arc<Descriptor>>,
    phase: Phase,
    error: &tokio::task::JoinError,
) -> Error {
    let reason = if error.is_panic() {
        "plugin panicked"
    } else {
        "plugin task was cancelled"
    };
    match owners.get(&error.id()) {
        Some(descriptor) => Error::Dispatch {
            id: descriptor.id.clone(),
            phase,
            dir: descriptor.dir.clone(),
            source: anyhow::anyhow!(reason),
        },
        None => Error::Dispatch {
            id: String::from("<unknown>"),
            phase,
            dir: PathBuf::new(),
            source: anyhow::anyhow!(reason),
        },
    }
}
