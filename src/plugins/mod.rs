//! Plugin host integration.
//!
//! The host owns a [`CacheRegistry`] and hands each plugin a
//! [`PluginContext`] while registering it. Through the context a plugin can
//! register extra cache clients and allocate segments; segments it does not
//! name explicitly are called `!<plugin name>`.
//!
//! Add new plugins by:
//! 1. Creating a new file in this directory
//! 2. Adding `pub mod your_plugin;` below
//! 3. Passing an instance to `PluginHost::register()`

pub mod uptime;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::info;

use crate::cache::{
    CacheClient, CacheRegistry, ClientConfig, Policy, PolicyOptions, SegmentScope, generate_fn,
};
use crate::config::Config;
use crate::error::Result;

/// An independently developed unit that the host registers in order.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Unique plugin name, also used to derive its default segment.
    fn name(&self) -> &str;

    /// Called once when the host registers the plugin.
    async fn register(&self, ctx: &PluginContext) -> anyhow::Result<()>;
}

/// Cache capabilities exposed to a plugin (or to the host itself).
#[derive(Debug, Clone)]
pub struct PluginContext {
    registry: CacheRegistry,
    scope: SegmentScope,
}

impl PluginContext {
    /// Context for the host itself: segments must be named explicitly.
    pub fn root(registry: CacheRegistry) -> Self {
        Self {
            registry,
            scope: SegmentScope::root(),
        }
    }

    pub fn for_plugin(registry: CacheRegistry, plugin: &str) -> Self {
        Self {
            registry,
            scope: SegmentScope::plugin(plugin),
        }
    }

    /// Name of the plugin this context belongs to, if any.
    pub fn plugin(&self) -> Option<&str> {
        self.scope.plugin.as_deref()
    }

    pub fn registry(&self) -> &CacheRegistry {
        &self.registry
    }

    /// Register and start an additional cache client.
    pub async fn cache_client(&self, name: &str, config: ClientConfig) -> Result<Arc<CacheClient>> {
        self.registry.register_client(name, config).await
    }

    /// Allocate a segment, named by `options.segment` or derived from the plugin.
    pub fn cache<T>(&self, options: &PolicyOptions) -> Result<Policy<T>>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    {
        self.registry.allocate_in(options, &self.scope, None)
    }

    /// Like [`cache`](Self::cache), with `segment` used when the options name none.
    pub fn cache_in<T>(&self, options: &PolicyOptions, segment: &str) -> Result<Policy<T>>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    {
        let scope = self.scope.clone().with_fallback(segment);
        self.registry.allocate_in(options, &scope, None)
    }

    /// Allocate a segment whose misses are filled by `generate`.
    pub fn cache_with_generate<T, F, Fut>(&self, options: &PolicyOptions, generate: F) -> Result<Policy<T>>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        self.registry
            .allocate_in(options, &self.scope, Some(generate_fn(generate)))
    }
}

/// Owns the cache registry and registers plugins against it.
pub struct PluginHost {
    registry: CacheRegistry,
    plugins: Vec<String>,
}

impl PluginHost {
    /// Create a host and start its default cache client.
    pub async fn new(config: &Config) -> Result<Self> {
        Self::with_registry(CacheRegistry::new(), config).await
    }

    /// Create a host around an existing registry (e.g. one with a test clock).
    pub async fn with_registry(registry: CacheRegistry, config: &Config) -> Result<Self> {
        let registry = registry.default_client_name(config.default_client.as_str());
        registry
            .register_client(&config.default_client, config.default_client_config.clone())
            .await?;

        Ok(Self {
            registry,
            plugins: Vec::new(),
        })
    }

    pub fn registry(&self) -> &CacheRegistry {
        &self.registry
    }

    /// The host's own cache context.
    pub fn context(&self) -> PluginContext {
        PluginContext::root(self.registry.clone())
    }

    /// Register a plugin. Plugins are registered in call order.
    pub async fn register(&mut self, plugin: &dyn Plugin) -> anyhow::Result<()> {
        let name = plugin.name();
        if self.plugins.iter().any(|p| p == name) {
            anyhow::bail!("plugin {name} already registered");
        }

        let ctx = PluginContext::for_plugin(self.registry.clone(), name);
        plugin.register(&ctx).await?;

        self.plugins.push(name.to_string());
        info!("Registered plugin: {}", name);
        Ok(())
    }

    /// Names of registered plugins, in registration order.
    pub fn plugins(&self) -> &[String] {
        &self.plugins
    }

    /// Stop every cache client.
    pub async fn shutdown(self) {
        self.registry.stop().await;
    }
}

impl std::fmt::Debug for PluginHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginHost")
            .field("registry", &self.registry)
            .field("plugins", &self.plugins)
            .finish()
    }
}
