//! Storage adapter contract.
//!
//! A storage adapter is the raw key/value backend behind a cache client
//! (in-memory, Redis, Memcached, ...). The cache layer only needs start/stop
//! and get/set/remove by key; expiry and staleness are enforced above it.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Physical key of an entry: the segment plus the caller's id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey {
    pub segment: String,
    pub id: String,
}

impl StorageKey {
    pub fn new(segment: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            segment: segment.into(),
            id: id.into(),
        }
    }
}

/// Renders as `segment:id` for logs. Adapters key on the pair, not this string.
impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.segment, self.id)
    }
}

/// What an adapter physically stores for one entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// The cached payload.
    pub item: serde_json::Value,
    /// When the entry was written.
    pub stored_at: DateTime<Utc>,
    /// TTL recorded at write time. `None` means the entry never expires.
    pub ttl_ms: Option<u64>,
}

impl Envelope {
    pub fn new(item: serde_json::Value, stored_at: DateTime<Utc>, ttl: Option<Duration>) -> Self {
        Self {
            item,
            stored_at,
            ttl_ms: ttl.map(|ttl| u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)),
        }
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_ms.map(Duration::from_millis)
    }

    /// Whether the entry is past its TTL at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.ttl() {
            Some(ttl) => super::clock::elapsed(self.stored_at, now) >= ttl,
            None => false,
        }
    }
}

/// Backend contract consumed by [`CacheClient`](super::CacheClient).
///
/// Implementations must be thread-safe; every method may be called
/// concurrently once `start` has returned.
#[async_trait]
pub trait StorageAdapter: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Connect / allocate resources. Called once by the owning client.
    async fn start(&self) -> anyhow::Result<()>;

    /// Release resources. Entries may be discarded.
    async fn stop(&self);

    fn is_ready(&self) -> bool;

    async fn get(&self, key: &StorageKey) -> anyhow::Result<Option<Envelope>>;

    async fn set(&self, key: &StorageKey, envelope: Envelope) -> anyhow::Result<()>;

    /// Remove an entry. Removing a missing key is not an error.
    async fn remove(&self, key: &StorageKey) -> anyhow::Result<()>;
}
