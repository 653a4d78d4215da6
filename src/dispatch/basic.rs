//! Generic (`basic`) extensions: a single exported function

use async_trait::async_trait;

use super::{Dispatcher, Initialized};
use crate::host::HostContext;
use crate::plugins::{Descriptor, PluginEntry};

/// Calls the extension's function with the host context
#[derive(Debug, Clone, Copy)]
pub struct BasicDispatcher;

#[async_trait]
impl Dispatcher for BasicDispatcher {
    async fn server_setup(
        &self,
        descriptor: &Descriptor,
        entry: PluginEntry,
        host: &HostContext,
    ) -> anyhow::Result<Initialized> {
        let PluginEntry::Function(function) = entry else {
            anyhow::bail!("invalid basic plugin `{}`: entry is not callable", descriptor.id);
        };
        let value = function.call(host.clone()).await?;
        Ok(Initialized::Value(value))
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use serde_json::json;

    use super::*;
    use crate::plugins::{Category, ExtensionManifest, ManifestSource, PluginModule};

    fn descriptor() -> Descriptor {
        Descriptor::new(
            "hello".into(),
            Category::Basic,
            PathBuf::from("/ext/hello"),
            ManifestSource::Inline,
            ExtensionManifest::default(),
            None,
            None,
            None,
        )
    }

    #[tokio::test]
    async fn calls_function_with_host() {
        let entry = PluginEntry::function(|host: HostContext| async move {
            Ok(json!({"hosted": host.config.hosted}))
        });
        let result = BasicDispatcher
            .server_setup(&descriptor(), entry, &HostContext::default())
            .await
            .unwrap();
        assert_eq!(result.value(), Some(&json!({"hosted": false})));
    }

    #[tokio::test]
    async fn module_is_rejected() {
        struct NotCallable;
        impl PluginModule for NotCallable {}

        let err = BasicDispatcher
            .server_setup(&descriptor(), PluginEntry::module(NotCallable), &HostContext::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("hello"));
    }

    #[tokio::test]
    async fn function_errors_propagate() {
        let entry = PluginEntry::function(|_| async { anyhow::bail!("boom") });
        let err = BasicDispatcher
            .server_setup(&descriptor(), entry, &HostContext::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}
