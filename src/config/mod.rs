//! Configuration module for the cache host.
//!
//! Loads configuration from environment variables.

use std::env;
use std::str::FromStr;

use tracing::warn;

use crate::cache::{ClientConfig, DEFAULT_CLIENT};

/// Host configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Name of the client allocations fall back to.
    pub default_client: String,

    /// Settings for the default client, registered at startup.
    pub default_client_config: ClientConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_client: DEFAULT_CLIENT.to_string(),
            default_client_config: ClientConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Every variable is optional; malformed values fall back to defaults.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let default_client = lookup("CACHE_DEFAULT_CLIENT")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.default_client);

        let max_capacity = parse_or(&lookup, "CACHE_DEFAULT_MAX_CAPACITY", 10_000u64);
        let shared = parse_or(&lookup, "CACHE_DEFAULT_SHARED", false);

        Self {
            default_client,
            default_client_config: ClientConfig::memory(max_capacity).shared(shared),
        }
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => raw.trim().to_lowercase().parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid {}={:?}", key, raw);
            default
        }),
        None => default,
    }
}
