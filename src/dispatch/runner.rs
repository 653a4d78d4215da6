//! Background worker (`runner`) extensions

use async_trait::async_trait;

use super::{Dispatcher, Initialized};
use crate::host::HostContext;
use crate::plugins::{Descriptor, PluginEntry};

/// Schema path a runner's configuration fragment is registered under
#[must_use]
pub fn schema_path(id: &str) -> String {
    format!("runners.{id}")
}

/// Creates runner workers against the event bus
#[derive(Debug, Clone, Copy)]
pub struct RunnerDispatcher;

#[async_trait]
impl Dispatcher for RunnerDispatcher {
    async fn background_setup(
        &self,
        descriptor: &Descriptor,
        entry: PluginEntry,
        host: &HostContext,
    ) -> anyhow::Result<Initialized> {
        let module = match entry {
            PluginEntry::Module(module) => module,
            // Process-backed workers: run the program against the host snapshot
            PluginEntry::Function(function) => {
                let worker = function.call(host.clone()).await?;
                tracing::debug!(extension = %descriptor.id, "runner process finished");
                return Ok(Initialized::Value(worker));
            }
        };

        if let Some(fragment) = module.app_config() {
            host.schema.extend(&schema_path(&descriptor.id), fragment);
        }

        let config = host.config.runner_config(&descriptor.id).cloned();
        let worker = module.create(host.events.clone(), config).await?;

        tracing::debug!(extension = %descriptor.id, "runner created");
        Ok(Initialized::Value(worker))
    }
}
