//! Cache policy - the per-segment view of a client.
//!
//! A policy namespaces every key under its segment, stamps writes with a
//! TTL, classifies reads as fresh / stale / expired, and optionally fills
//! misses through a generate function.
//!
//! ## Entry lifecycle
//!
//! ```text
//! absent --set--> fresh --stale_in--> stale --ttl--> expired (reads as a miss)
//! ```
//!
//! Concurrent reads of the same missing or stale key share one in-flight
//! generation; every waiter receives its result.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::adapter::{Envelope, StorageKey};
use super::client::CacheClient;
use super::clock::{Clock, elapsed};
use super::config::Rules;
use crate::error::{CacheError, Result};

/// Produces a value for a key on a miss or when a stale entry is refreshed.
pub type GenerateFn<T> = Arc<dyn Fn(String) -> BoxFuture<'static, anyhow::Result<T>> + Send + Sync>;

/// Wrap an async closure as a [`GenerateFn`].
pub fn generate_fn<T, F, Fut>(f: F) -> GenerateFn<T>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
{
    Arc::new(move |id| f(id).boxed())
}

type Pending<T> = Shared<BoxFuture<'static, Result<T>>>;

/// Metadata of a value served from storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cached {
    pub stored_at: DateTime<Utc>,
    /// TTL recorded when the entry was written.
    pub ttl: Option<Duration>,
    /// Past `stale_in` but not yet expired.
    pub is_stale: bool,
}

/// Outcome of [`Policy::get`].
///
/// A miss is `value: None`. A value produced by the generate function has
/// no `cached` metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup<T> {
    pub value: Option<T>,
    pub cached: Option<Cached>,
}

impl<T> Lookup<T> {
    fn miss() -> Self {
        Self {
            value: None,
            cached: None,
        }
    }

    fn hit(value: T, cached: Cached) -> Self {
        Self {
            value: Some(value),
            cached: Some(cached),
        }
    }

    fn generated(value: T) -> Self {
        Self {
            value: Some(value),
            cached: None,
        }
    }

    pub fn is_miss(&self) -> bool {
        self.value.is_none()
    }

    pub fn is_stale(&self) -> bool {
        self.cached.is_some_and(|c| c.is_stale)
    }

    pub fn into_value(self) -> Option<T> {
        self.value
    }
}

/// Snapshot of a policy's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PolicyStats {
    pub sets: u64,
    pub gets: u64,
    pub hits: u64,
    pub stales: u64,
    pub generates: u64,
    pub errors: u64,
}

impl PolicyStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        if self.gets == 0 {
            0.0
        } else {
            self.hits as f64 / self.gets as f64
        }
    }
}

#[derive(Default)]
struct Counters {
    sets: AtomicU64,
    gets: AtomicU64,
    hits: AtomicU64,
    stales: AtomicU64,
    generates: AtomicU64,
    errors: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> PolicyStats {
        PolicyStats {
            sets: self.sets.load(Ordering::Relaxed),
            gets: self.gets.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            stales: self.stales.load(Ordering::Relaxed),
            generates: self.generates.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Segment-scoped cache handle returned by segment allocation.
///
/// Cloning is cheap and clones share counters and in-flight generations.
pub struct Policy<T> {
    inner: Arc<PolicyInner<T>>,
}

struct PolicyInner<T> {
    segment: String,
    client: Arc<CacheClient>,
    rules: Rules,
    clock: Arc<dyn Clock>,
    generate: Option<GenerateFn<T>>,
    pending: DashMap<String, Pending<T>>,
    stats: Counters,
}

impl<T> Clone for Policy<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Policy<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub(crate) fn new(
        client: Arc<CacheClient>,
        segment: String,
        rules: Rules,
        clock: Arc<dyn Clock>,
        generate: Option<GenerateFn<T>>,
    ) -> Self {
        Self {
            inner: Arc::new(PolicyInner {
                segment,
                client,
                rules,
                clock,
                generate,
                pending: DashMap::new(),
                stats: Counters::default(),
            }),
        }
    }

    pub fn segment(&self) -> &str {
        &self.inner.segment
    }

    pub fn client_name(&self) -> &str {
        self.inner.client.name()
    }

    pub fn rules(&self) -> &Rules {
        &self.inner.rules
    }

    pub fn is_ready(&self) -> bool {
        self.inner.client.is_ready()
    }

    pub fn stats(&self) -> PolicyStats {
        self.inner.stats.snapshot()
    }

    /// Remaining TTL for an entry created at `created`, per this policy's rules.
    pub fn ttl(&self, created: DateTime<Utc>) -> Option<Duration> {
        self.inner.rules.ttl(created, self.inner.clock.now())
    }

    /// Store a value.
    ///
    /// `ttl` overrides the policy TTL; `None` or zero uses the policy default.
    pub async fn set(&self, id: &str, value: &T, ttl: Option<Duration>) -> Result<()> {
        self.inner
            .write(id, value, ttl)
            .await
            .inspect_err(|_| Counters::bump(&self.inner.stats.errors))
    }

    /// Read a value.
    ///
    /// Misses and expired entries return an empty [`Lookup`] unless a generate
    /// function is configured. Stale entries are returned immediately with the
    /// stale flag set, while a refresh runs in the background.
    pub async fn get(&self, id: &str) -> Result<Lookup<T>> {
        let inner = &self.inner;
        Counters::bump(&inner.stats.gets);

        let read = match inner.client.ensure_ready() {
            Ok(()) => inner.read(id).await,
            Err(err) => Err(err),
        };

        let cached = match read {
            Ok(cached) => cached,
            Err(err) => {
                Counters::bump(&inner.stats.errors);
                if inner.generate.is_some() && inner.rules.generate_on_read_error {
                    warn!(
                        "Read of {}:{} failed, generating instead: {}",
                        inner.segment, id, err
                    );
                    None
                } else {
                    return Err(err);
                }
            }
        };

        match cached {
            None if inner.generate.is_none() => Ok(Lookup::miss()),
            None => self.pending_generation(id).await.map(Lookup::generated),
            Some((value, meta)) if !meta.is_stale => {
                Counters::bump(&inner.stats.hits);
                Ok(Lookup::hit(value, meta))
            }
            Some((value, meta)) => {
                Counters::bump(&inner.stats.hits);
                Counters::bump(&inner.stats.stales);
                if inner.generate.is_none() {
                    return Ok(Lookup::hit(value, meta));
                }

                let refresh = self.pending_generation(id);

                if let Some(wait) = inner.rules.stale_timeout {
                    match tokio::time::timeout(wait, refresh).await {
                        Ok(Ok(fresh)) => return Ok(Lookup::generated(fresh)),
                        Ok(Err(err)) if inner.rules.drop_on_error => return Err(err),
                        Ok(Err(_)) | Err(_) => {}
                    }
                }

                Ok(Lookup::hit(value, meta))
            }
        }
    }

    /// Remove a value. Removing a missing key succeeds.
    #[doc(alias = "drop")]
    pub async fn remove(&self, id: &str) -> Result<()> {
        self.inner
            .remove(id)
            .await
            .inspect_err(|_| Counters::bump(&self.inner.stats.errors))
    }

    /// Join the in-flight generation for `id`, starting one if needed.
    ///
    /// A new generation is spawned so it runs to completion and leaves
    /// `pending` even if every caller stops waiting.
    fn pending_generation(&self, id: &str) -> Pending<T> {
        let generation = match self.inner.pending.entry(id.to_owned()) {
            Entry::Occupied(entry) => return entry.get().clone(),
            Entry::Vacant(entry) => {
                let inner = Arc::clone(&self.inner);
                let id = id.to_owned();
                let generation = async move {
                    let result = inner.generate(&id).await;
                    inner.pending.remove(&id);
                    result
                }
                .boxed()
                .shared();
                entry.insert(generation.clone());
                generation
            }
        };

        tokio::spawn(generation.clone().map(|_| ()));
        generation
    }
}

impl<T> PolicyInner<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    fn key(&self, id: &str) -> StorageKey {
        StorageKey::new(self.segment.as_str(), id)
    }

    async fn read(&self, id: &str) -> Result<Option<(T, Cached)>> {
        let envelope = self
            .client
            .adapter()
            .get(&self.key(id))
            .await
            .map_err(CacheError::storage)?;

        let Some(envelope) = envelope else {
            return Ok(None);
        };

        let now = self.clock.now();
        if envelope.is_expired(now) {
            return Ok(None);
        }

        let cached = Cached {
            stored_at: envelope.stored_at,
            ttl: envelope.ttl(),
            is_stale: self.rules.is_stale(elapsed(envelope.stored_at, now)),
        };
        let value = serde_json::from_value(envelope.item)?;
        Ok(Some((value, cached)))
    }

    async fn write(&self, id: &str, value: &T, ttl: Option<Duration>) -> Result<()> {
        self.client.ensure_ready()?;

        let now = self.clock.now();
        let ttl = match ttl.filter(|ttl| !ttl.is_zero()) {
            Some(ttl) => Some(ttl),
            None => self.rules.ttl(now, now),
        };
        if ttl.is_some_and(|ttl| ttl.is_zero()) {
            // Already past expiry, nothing worth storing
            return Ok(());
        }

        let envelope = Envelope::new(serde_json::to_value(value)?, now, ttl);
        self.client
            .adapter()
            .set(&self.key(id), envelope)
            .await
            .map_err(CacheError::storage)?;

        Counters::bump(&self.stats.sets);
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<()> {
        self.client.ensure_ready()?;
        self.client
            .adapter()
            .remove(&self.key(id))
            .await
            .map_err(CacheError::storage)
    }

    /// Run the generate function once and store its result.
    async fn generate(&self, id: &str) -> Result<T> {
        let Some(generate) = &self.generate else {
            return Err(CacheError::generate(anyhow::anyhow!(
                "no generate function configured"
            )));
        };

        Counters::bump(&self.stats.generates);
        debug!("Generating {}:{}", self.segment, id);

        let produced = match self.rules.generate_timeout {
            Some(limit) => match tokio::time::timeout(limit, generate(id.to_owned())).await {
                Ok(result) => result.map_err(CacheError::generate),
                Err(_) => Err(CacheError::GenerateTimeout(limit)),
            },
            None => generate(id.to_owned()).await.map_err(CacheError::generate),
        };

        let value = match produced {
            Ok(value) => value,
            Err(err) => {
                Counters::bump(&self.stats.errors);
                warn!("Generation of {}:{} failed: {}", self.segment, id, err);
                if self.rules.drop_on_error
                    && let Err(drop_err) = self.remove(id).await
                {
                    warn!("Could not drop {}:{}: {}", self.segment, id, drop_err);
                }
                return Err(err);
            }
        };

        if let Err(err) = self.write(id, &value, None).await {
            Counters::bump(&self.stats.errors);
            if !self.rules.generate_ignore_write_error {
                return Err(err);
            }
            warn!("Storing generated {}:{} failed: {}", self.segment, id, err);
        }

        Ok(value)
    }
}

impl<T> std::fmt::Debug for Policy<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Policy")
            .field("client", &self.inner.client.name())
            .field("segment", &self.inner.segment)
            .field("rules", &self.inner.rules)
            .field("generate", &self.inner.generate.is_some())
            .field("pending", &self.inner.pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::clock::ManualClock;
    use crate::cache::config::PolicyOptions;
    use crate::cache::memory::MemoryAdapter;
    use crate::cache::testing::FaultyAdapter;
    use std::sync::atomic::AtomicUsize;

    async fn started_client(adapter: Arc<dyn crate::cache::StorageAdapter>) -> Arc<CacheClient> {
        let client = Arc::new(CacheClient::new("_default", adapter, false));
        client.start().await.unwrap();
        client
    }

    async fn policy<T>(
        segment: &str,
        options: PolicyOptions,
        clock: &ManualClock,
        generate: Option<GenerateFn<T>>,
    ) -> Policy<T>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    {
        let client = started_client(Arc::new(MemoryAdapter::default())).await;
        Policy::new(
            client,
            segment.to_owned(),
            options.rules().unwrap(),
            Arc::new(clock.clone()),
            generate,
        )
    }

    fn one_second() -> PolicyOptions {
        PolicyOptions::segment("test").expires_in(Duration::from_millis(1000))
    }

    #[tokio::test]
    async fn test_set_then_get_round_trip() {
        let clock = ManualClock::default();
        let cache = policy::<String>("test", one_second(), &clock, None).await;

        cache.set("a", &"going in".to_owned(), None).await.unwrap();
        let lookup = cache.get("a").await.unwrap();

        assert_eq!(lookup.value.as_deref(), Some("going in"));
        let cached = lookup.cached.unwrap();
        assert!(!cached.is_stale);
        assert_eq!(cached.ttl, Some(Duration::from_millis(1000)));
        assert_eq!(cached.stored_at, clock.now());
    }

    #[tokio::test]
    async fn test_missing_key_is_not_an_error() {
        let clock = ManualClock::default();
        let cache = policy::<String>("test", one_second(), &clock, None).await;

        let lookup = cache.get("nope").await.unwrap();
        assert!(lookup.is_miss());
        assert!(lookup.cached.is_none());
    }

    #[tokio::test]
    async fn test_entries_expire_after_ttl() {
        let clock = ManualClock::default();
        let cache = policy::<u32>("test", one_second(), &clock, None).await;

        cache.set("a", &7, None).await.unwrap();
        clock.advance(Duration::from_millis(999));
        assert_eq!(cache.get("a").await.unwrap().value, Some(7));

        clock.advance(Duration::from_millis(1));
        assert!(cache.get("a").await.unwrap().is_miss());
    }

    #[tokio::test]
    async fn test_ttl_override() {
        let clock = ManualClock::default();
        let cache = policy::<u32>("test", one_second(), &clock, None).await;

        cache.set("short", &1, Some(Duration::from_millis(100))).await.unwrap();
        cache.set("default", &2, Some(Duration::ZERO)).await.unwrap();
        clock.advance(Duration::from_millis(100));

        assert!(cache.get("short").await.unwrap().is_miss());
        let lookup = cache.get("default").await.unwrap();
        assert_eq!(lookup.cached.unwrap().ttl, Some(Duration::from_millis(1000)));
    }

    #[tokio::test]
    async fn test_stale_window() {
        let clock = ManualClock::default();
        let options = one_second().stale_in(Duration::from_millis(500));
        let cache = policy::<String>("test", options, &clock, None).await;

        cache.set("a", &"v".to_owned(), None).await.unwrap();

        clock.advance(Duration::from_millis(499));
        assert!(!cache.get("a").await.unwrap().is_stale());

        clock.advance(Duration::from_millis(1));
        let lookup = cache.get("a").await.unwrap();
        assert!(lookup.is_stale());
        assert_eq!(lookup.value.as_deref(), Some("v"));

        clock.advance(Duration::from_millis(500));
        assert!(cache.get("a").await.unwrap().is_miss());

        let stats = cache.stats();
        assert_eq!(stats.gets, 3);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.stales, 1);
    }

    #[tokio::test]
    async fn test_no_expiry_configured_keeps_entries() {
        let clock = ManualClock::default();
        let cache = policy::<u32>("test", PolicyOptions::segment("test"), &clock, None).await;

        cache.set("a", &1, None).await.unwrap();
        clock.advance(Duration::from_secs(30 * 24 * 3600));

        let lookup = cache.get("a").await.unwrap();
        assert_eq!(lookup.value, Some(1));
        assert_eq!(lookup.cached.unwrap().ttl, None);
    }

    #[tokio::test]
    async fn test_remove() {
        let clock = ManualClock::default();
        let cache = policy::<u32>("test", one_second(), &clock, None).await;

        cache.set("a", &1, None).await.unwrap();
        cache.remove("a").await.unwrap();
        assert!(cache.get("a").await.unwrap().is_miss());
        cache.remove("a").await.unwrap();
    }

    #[tokio::test]
    async fn test_generate_on_miss_stores_value() {
        let clock = ManualClock::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let generate = generate_fn(move |id: String| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(format!("generated {id}"))
            }
        });
        let cache = policy("test", one_second(), &clock, Some(generate)).await;

        let first = cache.get("a").await.unwrap();
        assert_eq!(first.value.as_deref(), Some("generated a"));
        assert!(first.cached.is_none());

        let second = cache.get("a").await.unwrap();
        assert!(second.cached.is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().generates, 1);
    }

    #[tokio::test]
    async fn test_concurrent_misses_share_one_generation() {
        let clock = ManualClock::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let generate = generate_fn(move |_id: String| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(42u64)
            }
        });
        let cache = policy("test", one_second(), &clock, Some(generate)).await;

        let lookups = futures::future::join_all((0..8).map(|_| cache.get("k"))).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for lookup in lookups {
            assert_eq!(lookup.unwrap().value, Some(42));
        }
    }

    #[tokio::test]
    async fn test_concurrent_stale_reads_share_one_refresh() {
        let clock = ManualClock::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let generate = generate_fn(move |_id: String| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(2u64)
            }
        });
        let options = one_second()
            .stale_in(Duration::from_millis(500))
            .stale_timeout(Duration::from_millis(300));
        let cache = policy("test", options, &clock, Some(generate)).await;

        cache.set("k", &1, None).await.unwrap();
        clock.advance(Duration::from_millis(600));

        let lookups = futures::future::join_all((0..8).map(|_| cache.get("k"))).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for lookup in lookups {
            assert_eq!(lookup.unwrap().value, Some(2));
        }
        assert!(cache.inner.pending.is_empty());
    }

    #[tokio::test]
    async fn test_abandoned_generation_still_completes() {
        let clock = ManualClock::default();
        let generate = generate_fn(|_id: String| async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(3u8)
        });
        let cache = policy("test", one_second(), &clock, Some(generate)).await;

        let abandoned = tokio::time::timeout(Duration::from_millis(10), cache.get("k")).await;
        assert!(abandoned.is_err());
        assert_eq!(cache.inner.pending.len(), 1);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(cache.inner.pending.is_empty());
        assert_eq!(cache.inner.read("k").await.unwrap().map(|(v, _)| v), Some(3));

        let inner = Arc::downgrade(&cache.inner);
        drop(cache);
        assert!(inner.upgrade().is_none());
    }

    #[tokio::test]
    async fn test_stale_read_returns_immediately_and_refreshes() {
        let clock = ManualClock::default();
        let version = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&version);
        let generate = generate_fn(move |_id: String| {
            let counter = Arc::clone(&counter);
            async move { Ok(counter.fetch_add(1, Ordering::SeqCst) as u64) }
        });
        let options = one_second().stale_in(Duration::from_millis(500));
        let cache = policy("test", options, &clock, Some(generate)).await;

        assert_eq!(cache.get("k").await.unwrap().value, Some(0));
        clock.advance(Duration::from_millis(600));

        let stale = cache.get("k").await.unwrap();
        assert!(stale.is_stale());
        assert_eq!(stale.value, Some(0));

        // Let the background refresh land
        for _ in 0..50 {
            if cache.stats().generates == 2 && cache.inner.pending.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let fresh = cache.get("k").await.unwrap();
        assert!(!fresh.is_stale());
        assert_eq!(fresh.value, Some(1));
    }

    #[tokio::test]
    async fn test_stale_timeout_waits_for_refresh() {
        let clock = ManualClock::default();
        let version = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&version);
        let generate = generate_fn(move |_id: String| {
            let counter = Arc::clone(&counter);
            async move { Ok(counter.fetch_add(1, Ordering::SeqCst) as u64) }
        });
        let options = one_second()
            .stale_in(Duration::from_millis(500))
            .stale_timeout(Duration::from_millis(200));
        let cache = policy("test", options, &clock, Some(generate)).await;

        cache.get("k").await.unwrap();
        clock.advance(Duration::from_millis(600));

        let lookup = cache.get("k").await.unwrap();
        assert_eq!(lookup.value, Some(1));
        assert!(lookup.cached.is_none());
    }

    #[tokio::test]
    async fn test_generate_timeout() {
        let clock = ManualClock::default();
        let generate = generate_fn(|_id: String| async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(1u8)
        });
        let options = one_second().generate_timeout(Duration::from_millis(10));
        let cache = policy("test", options, &clock, Some(generate)).await;

        let err = cache.get("k").await.unwrap_err();
        assert!(matches!(err, CacheError::GenerateTimeout(_)));
    }

    #[tokio::test]
    async fn test_generate_error_drops_entry() {
        let clock = ManualClock::default();
        let generate =
            generate_fn(|_id: String| async { Err::<u8, _>(anyhow::anyhow!("upstream down")) });
        let options = one_second()
            .stale_in(Duration::from_millis(100))
            .stale_timeout(Duration::from_millis(50));
        let cache = policy("test", options, &clock, Some(generate)).await;

        cache.set("k", &9, None).await.unwrap();
        clock.advance(Duration::from_millis(200));

        let err = cache.get("k").await.unwrap_err();
        assert!(matches!(err, CacheError::Generate(_)));
        assert!(cache.inner.read("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_storage_errors_surface() {
        let clock = ManualClock::default();
        let adapter = Arc::new(FaultyAdapter::default());
        let client = started_client(adapter.clone()).await;
        let cache: Policy<u8> = Policy::new(
            client,
            "test".into(),
            one_second().rules().unwrap(),
            Arc::new(clock),
            None,
        );

        adapter.fail_writes.store(true, Ordering::SeqCst);
        assert!(matches!(cache.set("a", &1, None).await, Err(CacheError::Storage(_))));
        assert!(matches!(cache.remove("a").await, Err(CacheError::Storage(_))));

        adapter.fail_reads.store(true, Ordering::SeqCst);
        assert!(matches!(cache.get("a").await, Err(CacheError::Storage(_))));
        assert_eq!(cache.stats().errors, 3);
    }

    #[tokio::test]
    async fn test_generate_on_read_error() {
        let clock = ManualClock::default();
        let adapter = Arc::new(FaultyAdapter::default());
        let client = started_client(adapter.clone()).await;
        let cache = Policy::new(
            client,
            "test".into(),
            one_second().generate_on_read_error(true).rules().unwrap(),
            Arc::new(clock),
            Some(generate_fn(|_id: String| async { Ok(5u8) })),
        );

        adapter.fail_reads.store(true, Ordering::SeqCst);
        assert_eq!(cache.get("a").await.unwrap().value, Some(5));
    }

    #[tokio::test]
    async fn test_generate_ignore_write_error() {
        let clock = ManualClock::default();
        let adapter = Arc::new(FaultyAdapter::default());
        let client = started_client(adapter.clone()).await;
        let generate = generate_fn(|_id: String| async { Ok(5u8) });
        let strict = Policy::new(
            Arc::clone(&client),
            "strict".into(),
            one_second().rules().unwrap(),
            Arc::new(clock.clone()),
            Some(generate.clone()),
        );
        let lenient = Policy::new(
            client,
            "lenient".into(),
            one_second().generate_ignore_write_error(true).rules().unwrap(),
            Arc::new(clock),
            Some(generate),
        );

        adapter.fail_writes.store(true, Ordering::SeqCst);
        assert!(matches!(strict.get("a").await, Err(CacheError::Storage(_))));
        assert_eq!(lenient.get("a").await.unwrap().value, Some(5));
    }

    #[tokio::test]
    async fn test_not_ready_after_stop() {
        let clock = ManualClock::default();
        let client = started_client(Arc::new(MemoryAdapter::default())).await;
        let cache: Policy<u8> = Policy::new(
            Arc::clone(&client),
            "test".into(),
            one_second().rules().unwrap(),
            Arc::new(clock),
            None,
        );

        client.stop().await;
        assert!(!cache.is_ready());
        assert!(matches!(cache.get("a").await, Err(CacheError::NotReady(_))));
        assert!(matches!(cache.set("a", &1, None).await, Err(CacheError::NotReady(_))));
    }
}
