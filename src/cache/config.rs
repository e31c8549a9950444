//! Cache configuration: client/adapter settings and per-segment policy options.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};

use super::adapter::StorageAdapter;
use super::clock::elapsed;
use super::memory::MemoryAdapter;
use crate::error::{CacheError, Result};

const ONE_DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Which storage adapter a client is built on.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "engine", rename_all = "lowercase")]
pub enum AdapterConfig {
    /// Process-local Moka cache.
    Memory { max_capacity: u64 },
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self::Memory {
            max_capacity: 10_000,
        }
    }
}

impl AdapterConfig {
    /// Construct a fresh, unstarted adapter.
    pub fn build(&self) -> Arc<dyn StorageAdapter> {
        match self {
            Self::Memory { max_capacity } => Arc::new(MemoryAdapter::new(*max_capacity)),
        }
    }
}

/// Configuration for a cache client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
    #[serde(flatten)]
    pub adapter: AdapterConfig,

    /// Allow every segment on this client to be provisioned more than once.
    #[serde(default)]
    pub shared: bool,
}

impl ClientConfig {
    pub fn memory(max_capacity: u64) -> Self {
        Self {
            adapter: AdapterConfig::Memory { max_capacity },
            shared: false,
        }
    }

    #[must_use]
    pub fn shared(mut self, shared: bool) -> Self {
        self.shared = shared;
        self
    }
}

/// Time of day (UTC) at which entries expire, parsed from `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeOfDay {
    hours: u32,
    minutes: u32,
}

impl TimeOfDay {
    pub fn new(hours: u32, minutes: u32) -> Result<Self> {
        if hours > 23 || minutes > 59 {
            return Err(CacheError::InvalidTtlConfig(format!(
                "expires_at out of range: {hours:02}:{minutes:02}"
            )));
        }
        Ok(Self { hours, minutes })
    }

    /// The first occurrence of this time of day strictly after `created`.
    fn next_after(&self, created: DateTime<Utc>) -> DateTime<Utc> {
        let time = NaiveTime::from_hms_opt(self.hours, self.minutes, 0).unwrap_or(NaiveTime::MIN);
        let candidate = Utc.from_utc_datetime(&created.date_naive().and_time(time));
        if candidate <= created {
            candidate + chrono::Duration::days(1)
        } else {
            candidate
        }
    }
}

impl FromStr for TimeOfDay {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || CacheError::InvalidTtlConfig(format!("expires_at must be HH:MM, got {s:?}"));

        let (hours, minutes) = s.split_once(':').ok_or_else(invalid)?;
        if hours.is_empty() || hours.len() > 2 || minutes.len() != 2 {
            return Err(invalid());
        }
        let hours = hours.parse().map_err(|_| invalid())?;
        let minutes = minutes.parse().map_err(|_| invalid())?;
        Self::new(hours, minutes)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hours, self.minutes)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Options for allocating a cache segment.
///
/// Durations are given in milliseconds when deserialized
/// (`expires_in_ms`, `stale_in_ms`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PolicyOptions {
    /// Segment name. Falls back to the caller's scope when absent.
    pub segment: Option<String>,

    /// Client to allocate against. Defaults to the registry's default client.
    pub cache: Option<String>,

    /// Allow this segment to be provisioned again.
    pub shared: bool,

    /// Relative TTL. Mutually exclusive with `expires_at`.
    #[serde(rename = "expires_in_ms", with = "millis")]
    pub expires_in: Option<Duration>,

    /// Absolute daily expiry. Mutually exclusive with `expires_in`.
    pub expires_at: Option<TimeOfDay>,

    /// Age after which entries are reported stale.
    #[serde(rename = "stale_in_ms", with = "millis")]
    pub stale_in: Option<Duration>,

    /// How long a stale read waits for a refresh before returning the stale value.
    #[serde(rename = "stale_timeout_ms", with = "millis")]
    pub stale_timeout: Option<Duration>,

    /// Upper bound on a single generation.
    #[serde(rename = "generate_timeout_ms", with = "millis")]
    pub generate_timeout: Option<Duration>,

    /// Drop the cached entry when generation fails.
    pub drop_on_error: bool,

    /// Generate instead of failing when the adapter read fails.
    pub generate_on_read_error: bool,

    /// Return a generated value even if storing it failed.
    pub generate_ignore_write_error: bool,
}

impl Default for PolicyOptions {
    fn default() -> Self {
        Self {
            segment: None,
            cache: None,
            shared: false,
            expires_in: None,
            expires_at: None,
            stale_in: None,
            stale_timeout: None,
            generate_timeout: None,
            drop_on_error: true,
            generate_on_read_error: false,
            generate_ignore_write_error: false,
        }
    }
}

impl PolicyOptions {
    /// Options for a named segment.
    pub fn segment(name: impl Into<String>) -> Self {
        Self {
            segment: Some(name.into()),
            ..Default::default()
        }
    }

    /// Allocate against a client other than the default one.
    #[must_use]
    pub fn cache(mut self, client: impl Into<String>) -> Self {
        self.cache = Some(client.into());
        self
    }

    #[must_use]
    pub fn shared(mut self, shared: bool) -> Self {
        self.shared = shared;
        self
    }

    #[must_use]
    pub fn expires_in(mut self, ttl: Duration) -> Self {
        self.expires_in = Some(ttl);
        self
    }

    #[must_use]
    pub fn expires_at(mut self, at: TimeOfDay) -> Self {
        self.expires_at = Some(at);
        self
    }

    #[must_use]
    pub fn stale_in(mut self, after: Duration) -> Self {
        self.stale_in = Some(after);
        self
    }

    #[must_use]
    pub fn stale_timeout(mut self, wait: Duration) -> Self {
        self.stale_timeout = Some(wait);
        self
    }

    #[must_use]
    pub fn generate_timeout(mut self, limit: Duration) -> Self {
        self.generate_timeout = Some(limit);
        self
    }

    #[must_use]
    pub fn drop_on_error(mut self, drop: bool) -> Self {
        self.drop_on_error = drop;
        self
    }

    #[must_use]
    pub fn generate_on_read_error(mut self, generate: bool) -> Self {
        self.generate_on_read_error = generate;
        self
    }

    #[must_use]
    pub fn generate_ignore_write_error(mut self, ignore: bool) -> Self {
        self.generate_ignore_write_error = ignore;
        self
    }

    /// Validate the expiry settings and compile them into [`Rules`].
    pub fn rules(&self) -> Result<Rules> {
        let expiry = match (self.expires_in, self.expires_at) {
            (Some(_), Some(_)) => {
                return Err(CacheError::InvalidTtlConfig(
                    "expires_in and expires_at cannot both be set".into(),
                ));
            }
            (Some(ttl), None) if ttl.is_zero() => {
                return Err(CacheError::InvalidTtlConfig(
                    "expires_in must be greater than zero".into(),
                ));
            }
            (Some(ttl), None) => Expiry::In(ttl),
            (None, Some(at)) => Expiry::At(at),
            (None, None) => Expiry::Never,
        };

        if let Some(stale_in) = self.stale_in {
            let limit = match expiry {
                Expiry::In(ttl) => ttl,
                Expiry::At(_) => ONE_DAY,
                Expiry::Never => {
                    return Err(CacheError::InvalidTtlConfig(
                        "stale_in requires expires_in or expires_at".into(),
                    ));
                }
            };
            if stale_in >= limit {
                return Err(CacheError::InvalidTtlConfig(format!(
                    "stale_in ({stale_in:?}) must be less than the ttl ({limit:?})"
                )));
            }
        }

        if let Some(stale_timeout) = self.stale_timeout {
            if self.stale_in.is_none() {
                return Err(CacheError::InvalidTtlConfig(
                    "stale_timeout requires stale_in".into(),
                ));
            }
            let limit = match expiry {
                Expiry::In(ttl) => ttl,
                Expiry::At(_) | Expiry::Never => ONE_DAY,
            };
            if stale_timeout >= limit {
                return Err(CacheError::InvalidTtlConfig(format!(
                    "stale_timeout ({stale_timeout:?}) must be less than the ttl ({limit:?})"
                )));
            }
        }

        Ok(Rules {
            expiry,
            stale_in: self.stale_in,
            stale_timeout: self.stale_timeout,
            generate_timeout: self.generate_timeout,
            drop_on_error: self.drop_on_error,
            generate_on_read_error: self.generate_on_read_error,
            generate_ignore_write_error: self.generate_ignore_write_error,
        })
    }
}

/// How entries written through a policy expire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Entries never expire.
    Never,
    /// Entries expire a fixed duration after being written.
    In(Duration),
    /// Entries expire at the next occurrence of a time of day.
    At(TimeOfDay),
}

/// Validated policy rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rules {
    pub expiry: Expiry,
    pub stale_in: Option<Duration>,
    pub stale_timeout: Option<Duration>,
    pub generate_timeout: Option<Duration>,
    pub drop_on_error: bool,
    pub generate_on_read_error: bool,
    pub generate_ignore_write_error: bool,
}

impl Rules {
    /// Remaining TTL at `now` for an entry created at `created`.
    ///
    /// `None` means no expiry; `Some(ZERO)` means already expired.
    pub fn ttl(&self, created: DateTime<Utc>, now: DateTime<Utc>) -> Option<Duration> {
        let age = elapsed(created, now);
        match self.expiry {
            Expiry::Never => None,
            Expiry::In(ttl) => Some(ttl.saturating_sub(age)),
            Expiry::At(at) => {
                if age > ONE_DAY {
                    return Some(Duration::ZERO);
                }
                let expires = at.next_after(created);
                Some(elapsed(now, expires))
            }
        }
    }

    /// Whether an entry of this age should be flagged stale.
    pub fn is_stale(&self, age: Duration) -> bool {
        self.stale_in.is_some_and(|stale_in| age >= stale_in)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}
