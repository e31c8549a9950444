//! Segment Cache - named cache clients for plugin hosts.
//!
//! Lets independently developed plugins obtain isolated, named regions of a
//! shared cache backend, and wraps raw key/value storage with expiry,
//! staleness and value generation.
//!
//! ## Architecture
//!
//! - `cache` - Storage adapters, clients, the registry and per-segment policies
//! - `config` - Environment configuration
//! - `plugins` - Host integration (plugin trait, contexts, bundled plugins)
//! - `error` - Error taxonomy

pub mod cache;
pub mod config;
pub mod error;
pub mod plugins;

pub use cache::{CacheRegistry, Policy, PolicyOptions};
pub use error::{CacheError, Result};
