//! Cache module - named cache clients partitioned into segments.
//!
//! This module lets independently written plugins carve isolated, named
//! regions out of a shared storage backend, and layers expiry, staleness and
//! value generation on top of raw key/value storage.
//!
//! ## Architecture
//!
//! - `StorageAdapter` - Pluggable raw backend (get/set/remove + start/stop)
//! - `CacheClient` - One running adapter plus the segments provisioned on it
//! - `CacheRegistry` - Named clients and the segment allocator
//! - `Policy` - Per-segment handle enforcing TTL, staleness and generation
//!
//! ## Usage
//!
//! ```rust,no_run
//! # use segment_cache::cache::{CacheRegistry, ClientConfig, PolicyOptions};
//! # use std::time::Duration;
//! # async fn demo(registry: CacheRegistry) -> segment_cache::Result<()> {
//! let users = registry.allocate::<String>(
//!     &PolicyOptions::segment("users")
//!         .expires_in(Duration::from_secs(300))
//!         .stale_in(Duration::from_secs(240)),
//! )?;
//!
//! users.set("42", &"alice".to_owned(), None).await?;
//! let lookup = users.get("42").await?;
//! # Ok(())
//! # }
//! ```

mod adapter;
mod client;
mod clock;
mod config;
mod memory;
mod policy;
mod registry;
mod segment;
#[cfg(test)]
mod testing;

pub use adapter::{Envelope, StorageAdapter, StorageKey};
pub use client::{CacheClient, ClientState};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AdapterConfig, ClientConfig, Expiry, PolicyOptions, Rules, TimeOfDay};
pub use memory::MemoryAdapter;
pub use policy::{Cached, GenerateFn, Lookup, Policy, PolicyStats, generate_fn};
pub use registry::{CacheRegistry, DEFAULT_CLIENT};
pub use segment::{PLUGIN_SEGMENT_PREFIX, SegmentInfo, SegmentScope, validate_segment_name};
