//! Adapters for exercising failure paths in tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::bail;
use async_trait::async_trait;

use super::adapter::{Envelope, StorageAdapter, StorageKey};
use super::memory::MemoryAdapter;

/// Memory adapter whose operations can be made to fail on demand.
#[derive(Default)]
pub(crate) struct FaultyAdapter {
    inner: MemoryAdapter,
    pub fail_start: AtomicBool,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
}

impl FaultyAdapter {
    pub fn failing_start() -> Self {
        let adapter = Self::default();
        adapter.fail_start.store(true, Ordering::SeqCst);
        adapter
    }
}

#[async_trait]
impl StorageAdapter for FaultyAdapter {
    fn name(&self) -> &str {
        "faulty"
    }

    async fn start(&self) -> anyhow::Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if self.fail_start.load(Ordering::SeqCst) {
            bail!("connection refused");
        }
        self.inner.start().await
    }

    async fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.inner.stop().await;
    }

    fn is_ready(&self) -> bool {
        self.inner.is_ready()
    }

    async fn get(&self, key: &StorageKey) -> anyhow::Result<Option<Envelope>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            bail!("read timed out");
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &StorageKey, envelope: Envelope) -> anyhow::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("write rejected");
        }
        self.inner.set(key, envelope).await
    }

    async fn remove(&self, key: &StorageKey) -> anyhow::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("write rejected");
        }
        self.inner.remove(key).await
    }
}
