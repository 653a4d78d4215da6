//! Request-routing (`job`) extensions

use async_trait::async_trait;

use super::{Dispatcher, Initialized, legacy_passthrough, merge_truthy, mount_namespaces};
use crate::host::HostContext;
use crate::plugins::{Descriptor, PluginEntry};

/// Wires routes, event listeners and auth for job extensions
#[derive(Debug, Clone, Copy)]
pub struct JobDispatcher;

#[async_trait]
impl Dispatcher for JobDispatcher {
    async fn server_setup(
        &self,
        descriptor: &Descriptor,
        entry: PluginEntry,
        host: &HostContext,
    ) -> anyhow::Result<Initialized> {
        let PluginEntry::Module(module) = entry else {
            return Ok(legacy_passthrough(descriptor, entry));
        };

        let guards = vec![
            host.middleware.resource.clone(),
            host.middleware.plugin_resource.clone(),
        ];
        mount_namespaces(descriptor, module.as_ref(), host, guards)?;

        module.listen(&host.events)?;

        let config = merge_truthy(
            module.config_defaults(),
            host.config.plugin_config(&descriptor.id),
        );
        module.auth(&host.auth, &config)?;

        tracing::debug!(extension = %descriptor.id, "job extension wired");
        Ok(Initialized::Module(module))
    }
}
