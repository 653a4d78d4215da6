//! Authentication strategy registry

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;

/// A way to authenticate a user, e.g. OAuth against a provider
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    /// Verify credentials, returning the user identifier on success
    async fn authenticate(&self, credentials: &Value) -> anyhow::Result<Option<String>>;
}

/// Named authentication strategies installed by extensions
#[derive(Default)]
pub struct AuthRegistry {
    strategies: RwLock<IndexMap<String, Arc<dyn AuthStrategy>>>,
}

impl fmt::Debug for AuthRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthRegistry")
            .field("strategies", &self.names())
            .finish()
    }
}

impl AuthRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a strategy, returning the one it replaced
    pub fn register(
        &self,
        name: impl Into<String>,
        strategy: Arc<dyn AuthStrategy>,
    ) -> Option<Arc<dyn AuthStrategy>> {
        let name = name.into();
        tracing::debug!(strategy = %name, "registered auth strategy");
        self.strategies
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, strategy)
    }

    /// Look up a strategy by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn AuthStrategy>> {
        self.strategies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Installed strategy names, in registration order
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.strategies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Authenticate with a named strategy
    ///
    /// # Errors
    ///
    /// Returns error if the strategy is unknown or fails
    pub async fn authenticate(&self, name: &str, credentials: &Value) -> anyhow::Result<Option<String>> {
        let strategy = self
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("unknown auth strategy: {name}"))?;
        strategy.authenticate(credentials).await
    }
}
