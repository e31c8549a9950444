//! Cache registry - named cache clients and segment allocation.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use super::adapter::StorageAdapter;
use super::client::CacheClient;
use super::clock::{Clock, SystemClock};
use super::config::{ClientConfig, PolicyOptions};
use super::policy::{GenerateFn, Policy};
use super::segment::SegmentScope;
use crate::error::{CacheError, Result};

/// Name of the client used when allocation options do not name one.
pub const DEFAULT_CLIENT: &str = "_default";

/// Registry of named cache clients.
///
/// The registry is an explicit handle rather than global state: clone it
/// and hand it to whatever needs to register clients or allocate segments.
/// Registration and allocation are serialized through the client table
/// lock and each client's segment lock.
///
/// ## Example
///
/// ```rust,no_run
/// # use segment_cache::cache::{CacheRegistry, ClientConfig, PolicyOptions};
/// # use std::time::Duration;
/// # async fn demo() -> segment_cache::Result<()> {
/// let registry = CacheRegistry::new();
/// registry.register_client("_default", ClientConfig::default()).await?;
///
/// let cache = registry.allocate::<String>(
///     &PolicyOptions::segment("sessions").expires_in(Duration::from_secs(60)),
/// )?;
/// cache.set("a", &"going in".to_owned(), None).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct CacheRegistry {
    clients: Arc<RwLock<HashMap<String, Arc<CacheClient>>>>,
    default_client: Arc<str>,
    clock: Arc<dyn Clock>,
}

impl CacheRegistry {
    /// Create a new empty registry using the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a registry with a custom time source.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        info!("Cache registry initialized");
        Self {
            clients: Arc::new(RwLock::new(HashMap::new())),
            default_client: Arc::from(DEFAULT_CLIENT),
            clock,
        }
    }

    /// Use a different name for the default client.
    #[must_use]
    pub fn default_client_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.default_client = name.into();
        self
    }

    /// Name of the client used when options don't specify one.
    pub fn default_client(&self) -> &str {
        &self.default_client
    }

    /// Register a client built from configuration and start its adapter.
    pub async fn register_client(&self, name: &str, config: ClientConfig) -> Result<Arc<CacheClient>> {
        self.register_adapter(name, config.adapter.build(), config.shared)
            .await
    }

    /// Register a client around an existing adapter and start it.
    ///
    /// Returns once the adapter has started. A client whose adapter fails to
    /// start stays registered in the `Failed` state; its name cannot be reused.
    pub async fn register_adapter(
        &self,
        name: &str,
        adapter: Arc<dyn StorageAdapter>,
        shared: bool,
    ) -> Result<Arc<CacheClient>> {
        let client = {
            let mut clients = self.clients.write();
            if clients.contains_key(name) {
                return Err(CacheError::DuplicateClient(name.to_owned()));
            }

            debug!("Registering cache client: {}", name);
            let client = Arc::new(CacheClient::new(name, adapter, shared));
            clients.insert(name.to_owned(), Arc::clone(&client));
            client
        };

        client.start().await?;
        Ok(client)
    }

    /// Get a registered client by name.
    pub fn client(&self, name: &str) -> Result<Arc<CacheClient>> {
        self.clients
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| CacheError::UnknownClient(name.to_owned()))
    }

    /// Allocate a segment from the host's own scope.
    ///
    /// The segment name must come from `options.segment`.
    pub fn allocate<T>(&self, options: &PolicyOptions) -> Result<Policy<T>>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    {
        self.allocate_in(options, &SegmentScope::root(), None)
    }

    /// Allocate a segment with full control over naming and generation.
    ///
    /// Fails if the client is unknown, the segment name cannot be resolved,
    /// the TTL options are invalid, or the segment is already provisioned
    /// and neither side asked for sharing.
    pub fn allocate_in<T>(
        &self,
        options: &PolicyOptions,
        scope: &SegmentScope,
        generate: Option<GenerateFn<T>>,
    ) -> Result<Policy<T>>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    {
        let segment = scope.resolve(options.segment.as_deref())?;
        let client_name = options.cache.as_deref().unwrap_or(self.default_client());
        let client = self.client(client_name)?;
        let rules = options.rules()?;

        client.provision(&segment, options.shared)?;
        debug!("Allocated segment {}/{}", client_name, segment);

        Ok(Policy::new(
            client,
            segment,
            rules,
            Arc::clone(&self.clock),
            generate,
        ))
    }

    /// Check if a client with the given name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.clients.read().contains_key(name)
    }

    /// Get the number of registered clients.
    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.clients.read().is_empty()
    }

    /// Get a list of all registered client names.
    pub fn client_names(&self) -> Vec<String> {
        self.clients.read().keys().cloned().collect()
    }

    /// Stop every client's adapter.
    pub async fn stop(&self) {
        let clients: Vec<_> = self.clients.read().values().cloned().collect();
        for client in clients {
            client.stop().await;
        }
        info!("Cache registry stopped");
    }
}

impl Default for CacheRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let clients = self.clients.read();
        f.debug_struct("CacheRegistry")
            .field("default_client", &self.default_client)
            .field("client_count", &clients.len())
            .field("client_names", &clients.keys().collect::<Vec<_>>())
            .finish()
    }
}
