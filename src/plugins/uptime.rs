//! Uptime plugin - caches a short-lived report of how long the host has run.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Plugin, PluginContext};
use crate::cache::{Lookup, Policy, PolicyOptions};

const REPORT_KEY: &str = "report";

/// Snapshot of host uptime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UptimeReport {
    pub started_at: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
    pub uptime_secs: i64,
}

pub struct UptimePlugin {
    started_at: DateTime<Utc>,
    refresh: Duration,
    cache: OnceCell<Policy<UptimeReport>>,
}

impl UptimePlugin {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            refresh: Duration::from_secs(30),
            cache: OnceCell::new(),
        }
    }

    /// How long a report is served before it goes stale.
    #[must_use]
    pub fn refresh_every(mut self, refresh: Duration) -> Self {
        self.refresh = refresh;
        self
    }

    /// Current report, served from the cache when possible.
    pub async fn report(&self) -> anyhow::Result<Lookup<UptimeReport>> {
        let cache = self
            .cache
            .get()
            .ok_or_else(|| anyhow::anyhow!("uptime plugin is not registered"))?;
        Ok(cache.get(REPORT_KEY).await?)
    }
}

#[async_trait]
impl Plugin for UptimePlugin {
    fn name(&self) -> &str {
        "uptime"
    }

    async fn register(&self, ctx: &PluginContext) -> anyhow::Result<()> {
        let started_at = self.started_at;
        let options = PolicyOptions::default()
            .expires_in(self.refresh * 2)
            .stale_in(self.refresh);

        let cache = ctx.cache_with_generate(&options, move |_key: String| async move {
            let now = Utc::now();
            debug!("Generating uptime report");
            Ok(UptimeReport {
                started_at,
                generated_at: now,
                uptime_secs: (now - started_at).num_seconds(),
            })
        })?;

        self.cache
            .set(cache)
            .map_err(|_| anyhow::anyhow!("uptime plugin registered twice"))?;
        Ok(())
    }
}
