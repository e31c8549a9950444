//! Error types for the cache layer.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = CacheError> = std::result::Result<T, E>;

/// Errors raised by the registry, the segment allocator and cache policies.
///
/// The type is `Clone` so that a single generation outcome can be handed to
/// every caller waiting on the same key.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("{0} cache client already registered")]
    DuplicateClient(String),

    #[error("Unknown cache {0}")]
    UnknownClient(String),

    #[error("Missing cache segment name")]
    MissingSegmentName,

    #[error("Invalid cache segment name {segment:?}: {reason}")]
    InvalidSegmentName {
        segment: String,
        reason: &'static str,
    },

    #[error("Cannot provision the same cache segment more than once: {client}/{segment}")]
    DuplicateSegment { client: String, segment: String },

    #[error("Invalid cache policy options: {0}")]
    InvalidTtlConfig(String),

    #[error("Cache client {0} is not ready")]
    NotReady(String),

    #[error("Storage adapter failed: {0:#}")]
    Storage(Arc<anyhow::Error>),

    #[error("Cached value could not be encoded: {0}")]
    Serialization(#[source] Arc<serde_json::Error>),

    #[error("Value generation failed: {0:#}")]
    Generate(Arc<anyhow::Error>),

    #[error("Value generation timed out after {0:?}")]
    GenerateTimeout(Duration),
}

impl CacheError {
    pub(crate) fn storage(err: anyhow::Error) -> Self {
        Self::Storage(Arc::new(err))
    }

    pub(crate) fn generate(err: anyhow::Error) -> Self {
        Self::Generate(Arc::new(err))
    }

    /// Returns true for errors raised at registration or allocation time.
    ///
    /// These are programmer errors and should not be retried.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::DuplicateClient(_)
                | Self::UnknownClient(_)
                | Self::MissingSegmentName
                | Self::InvalidSegmentName { .. }
                | Self::DuplicateSegment { .. }
                | Self::InvalidTtlConfig(_)
        )
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(Arc::new(err))
    }
}
