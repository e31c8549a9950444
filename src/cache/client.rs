//! Cache client - one running storage adapter plus its provisioned segments.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use super::adapter::StorageAdapter;
use super::segment::{SegmentInfo, SegmentTable};
use crate::error::{CacheError, Result};

/// Adapter lifecycle as seen by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Starting,
    Ready,
    Failed,
    Stopped,
}

/// A registered storage backend.
///
/// The client owns its adapter exclusively; policies hold an `Arc` to the
/// client and go through it for every call.
pub struct CacheClient {
    name: String,
    adapter: Arc<dyn StorageAdapter>,
    shared: bool,
    state: Mutex<ClientState>,
    segments: Mutex<SegmentTable>,
}

impl CacheClient {
    pub(crate) fn new(name: impl Into<String>, adapter: Arc<dyn StorageAdapter>, shared: bool) -> Self {
        Self {
            name: name.into(),
            adapter,
            shared,
            state: Mutex::new(ClientState::Starting),
            segments: Mutex::new(SegmentTable::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether every segment on this client may be provisioned repeatedly.
    pub fn is_shared(&self) -> bool {
        self.shared
    }

    pub fn state(&self) -> ClientState {
        *self.state.lock()
    }

    /// Ready to serve reads and writes.
    pub fn is_ready(&self) -> bool {
        self.state() == ClientState::Ready && self.adapter.is_ready()
    }

    pub(crate) fn adapter(&self) -> &Arc<dyn StorageAdapter> {
        &self.adapter
    }

    /// Fail with `NotReady` unless the adapter is running.
    pub(crate) fn ensure_ready(&self) -> Result<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(CacheError::NotReady(self.name.clone()))
        }
    }

    pub(crate) async fn start(&self) -> Result<()> {
        match self.adapter.start().await {
            Ok(()) => {
                *self.state.lock() = ClientState::Ready;
                info!(
                    "Cache client {} started ({} adapter)",
                    self.name,
                    self.adapter.name()
                );
                Ok(())
            }
            Err(err) => {
                *self.state.lock() = ClientState::Failed;
                warn!("Cache client {} failed to start: {:#}", self.name, err);
                Err(CacheError::storage(err))
            }
        }
    }

    pub(crate) async fn stop(&self) {
        if self.state() == ClientState::Stopped {
            return;
        }
        self.adapter.stop().await;
        *self.state.lock() = ClientState::Stopped;
        info!("Cache client {} stopped", self.name);
    }

    pub(crate) fn provision(&self, segment: &str, shared: bool) -> Result<()> {
        self.segments
            .lock()
            .provision(&self.name, self.shared, segment, shared)
    }

    /// Provisioning state of a segment, if it has been allocated.
    pub fn segment(&self, name: &str) -> Option<SegmentInfo> {
        self.segments.lock().get(name)
    }

    /// Names of all provisioned segments.
    pub fn segment_names(&self) -> Vec<String> {
        self.segments.lock().names()
    }
}

impl std::fmt::Debug for CacheClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheClient")
            .field("name", &self.name)
            .field("adapter", &self.adapter.name())
            .field("shared", &self.shared)
            .field("state", &self.state())
            .field("segment_count", &self.segments.lock().len())
            .finish()
    }
}
