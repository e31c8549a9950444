//! In-memory storage adapter on top of Moka.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::bail;
use async_trait::async_trait;
use moka::Expiry;
use moka::sync::Cache;
use tracing::debug;

use super::adapter::{Envelope, StorageAdapter, StorageKey};

/// Evicts each entry after the TTL recorded in its envelope.
struct EnvelopeExpiry;

impl Expiry<StorageKey, Envelope> for EnvelopeExpiry {
    fn expire_after_create(
        &self,
        _key: &StorageKey,
        value: &Envelope,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.ttl()
    }

    fn expire_after_update(
        &self,
        _key: &StorageKey,
        value: &Envelope,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl()
    }
}

/// Process-local adapter.
///
/// This adapter is:
/// - Thread-safe (Moka handles its own locking)
/// - Bounded by entry count, evicting least-recently-used entries
/// - Self-expiring, using the TTL stored with each entry
pub struct MemoryAdapter {
    entries: Cache<StorageKey, Envelope>,
    max_capacity: u64,
    started: AtomicBool,
}

impl MemoryAdapter {
    pub fn new(max_capacity: u64) -> Self {
        let entries = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(EnvelopeExpiry)
            .build();

        Self {
            entries,
            max_capacity,
            started: AtomicBool::new(false),
        }
    }

    pub fn max_capacity(&self) -> u64 {
        self.max_capacity
    }

    /// Get the number of entries in the cache.
    ///
    /// Note: This may not be perfectly accurate due to concurrent operations.
    pub fn entry_count(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }

    fn ensure_started(&self) -> anyhow::Result<()> {
        if !self.is_ready() {
            bail!("memory adapter is not started");
        }
        Ok(())
    }
}

impl Default for MemoryAdapter {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl StorageAdapter for MemoryAdapter {
    fn name(&self) -> &str {
        "memory"
    }

    async fn start(&self) -> anyhow::Result<()> {
        if !self.started.swap(true, Ordering::AcqRel) {
            debug!("Memory adapter started (capacity {})", self.max_capacity);
        }
        Ok(())
    }

    async fn stop(&self) {
        self.started.store(false, Ordering::Release);
        self.entries.invalidate_all();
        debug!("Memory adapter stopped");
    }

    fn is_ready(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    async fn get(&self, key: &StorageKey) -> anyhow::Result<Option<Envelope>> {
        self.ensure_started()?;
        Ok(self.entries.get(key))
    }

    async fn set(&self, key: &StorageKey, envelope: Envelope) -> anyhow::Result<()> {
        self.ensure_started()?;
        self.entries.insert(key.clone(), envelope);
        Ok(())
    }

    async fn remove(&self, key: &StorageKey) -> anyhow::Result<()> {
        self.ensure_started()?;
        self.entries.invalidate(key);
        Ok(())
    }
}

impl std::fmt::Debug for MemoryAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryAdapter")
            .field("max_capacity", &self.max_capacity)
            .field("entry_count", &self.entries.entry_count())
            .field("started", &self.is_ready())
            .finish()
    }
}
