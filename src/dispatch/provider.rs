//! External service provider extensions
//!
//! Same dual namespace as job extensions, but the per-resource routes are
//! guarded by provider association instead of the plugin-enabled check.

use async_trait::async_trait;

use super::{Dispatcher, Initialized, global_prefix, legacy_passthrough, mount_namespaces};
use crate::host::{HostContext, Namespace};
use crate::plugins::{Descriptor, PluginEntry};

/// Path of the "new account" link under the global namespace
pub const NEW_ACCOUNT_PATH: &str = "/new";

/// Wires routes and the new-account link for provider extensions
#[derive(Debug, Clone, Copy)]
pub struct ProviderDispatcher;

#[async_trait]
impl Dispatcher for ProviderDispatcher {
    async fn server_setup(
        &self,
        descriptor: &Descriptor,
        entry: PluginEntry,
        host: &HostContext,
    ) -> anyhow::Result<Initialized> {
        let PluginEntry::Module(module) = entry else {
            return Ok(legacy_passthrough(descriptor, entry));
        };

        let guards = vec![host.middleware.resource.clone(), host.middleware.provider.clone()];
        mount_namespaces(descriptor, module.as_ref(), host, guards)?;

        if let Some(handler) = module.new_account() {
            let mut account = Namespace::new(
                &descriptor.id,
                global_prefix(&descriptor.id),
                vec![host.middleware.login_required.clone()],
            );
            account.route(NEW_ACCOUNT_PATH, handler);
            host.routes.mount(account)?;
        }

        let hosted = host.config.hosted;
        tracing::debug!(extension = %descriptor.id, hosted, "provider extension wired");
        Ok(Initialized::Provider { module, hosted })
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::extract::Request;
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use axum::routing::{MethodRouter, get};
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::host::{Middleware, RouteGuard};
    use crate::plugins::{Category, ExtensionManifest, ManifestSource, PluginModule};

    struct Github;

    impl PluginModule for Github {
        fn routes(&self, routes: &mut Namespace, _host: &HostContext) -> anyhow::Result<()> {
            routes.route("/hooks", get(|| async { "hooks" }));
            Ok(())
        }

        fn new_account(&self) -> Option<MethodRouter> {
            Some(get(|| async { "connect" }))
        }
    }

    struct LoggedOut;

    #[async_trait]
    impl RouteGuard for LoggedOut {
        async fn check(&self, _extension: &str, _request: &mut Request) -> Result<(), Response> {
            Err(StatusCode::UNAUTHORIZED.into_response())
        }
    }

    fn descriptor() -> Descriptor {
        Descriptor::new(
            "github".into(),
            Category::Provider,
            PathBuf::from("/ext/github"),
            ManifestSource::Inline,
            ExtensionManifest::default(),
            None,
            None,
            None,
        )
    }

    #[tokio::test]
    async fn tags_hosted_flag() {
        let host = HostContext::new(Config {
            hosted: true,
            ..Config::default()
        });
        let result = ProviderDispatcher
            .server_setup(&descriptor(), PluginEntry::module(Github), &host)
            .await
            .unwrap();
        assert_eq!(result.hosted(), Some(true));
    }

    #[tokio::test]
    async fn new_account_requires_login() {
        let host = HostContext::default().with_middleware(Middleware {
            login_required: Arc::new(LoggedOut),
            ..Middleware::default()
        });
        ProviderDispatcher
            .server_setup(&descriptor(), PluginEntry::module(Github), &host)
            .await
            .unwrap();

        let paths: Vec<String> = host.routes.records().into_iter().map(|r| r.path).collect();
        assert!(paths.contains(&"/{org}/{repo}/api/github/hooks".to_string()));
        assert!(paths.contains(&"/ext/github/new".to_string()));

        let router = host.routes.take_router();
        let response = router
            .clone()
            .oneshot(Request::builder().uri("/ext/github/new").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        // Per-resource routes are not behind the login guard
        let response = router
            .oneshot(Request::builder().uri("/acme/widgets/api/github/hooks").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
