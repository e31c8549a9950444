//! Segment allocation rules.
//!
//! A segment is a named partition of one client's keyspace. Each segment may
//! be provisioned once, unless the first allocation marked it shared, the
//! current allocation asks for sharing, or the whole client is shared.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{CacheError, Result};

/// Prefix for segment names derived from a plugin's identity.
pub const PLUGIN_SEGMENT_PREFIX: char = '!';

/// Where an allocation request comes from.
///
/// Used to resolve a segment name when the options do not carry one:
/// first the explicit fallback, then a name derived from the plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentScope {
    pub fallback: Option<String>,
    pub plugin: Option<String>,
}

impl SegmentScope {
    /// Scope of the host itself: no derived name.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn plugin(name: impl Into<String>) -> Self {
        Self {
            fallback: None,
            plugin: Some(name.into()),
        }
    }

    #[must_use]
    pub fn with_fallback(mut self, segment: impl Into<String>) -> Self {
        self.fallback = Some(segment.into());
        self
    }

    /// Pick the segment name: explicit, then fallback, then `!plugin`.
    pub fn resolve(&self, explicit: Option<&str>) -> Result<String> {
        let name = explicit
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .or_else(|| self.fallback.clone().filter(|s| !s.is_empty()))
            .or_else(|| {
                self.plugin
                    .as_deref()
                    .filter(|p| !p.is_empty())
                    .map(|p| format!("{PLUGIN_SEGMENT_PREFIX}{p}"))
            })
            .ok_or(CacheError::MissingSegmentName)?;

        validate_segment_name(&name)?;
        Ok(name)
    }
}

/// Reject names adapters cannot store safely.
pub fn validate_segment_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        "empty string"
    } else if name.contains('\0') {
        "contains a null character"
    } else {
        return Ok(());
    };

    Err(CacheError::InvalidSegmentName {
        segment: name.to_owned(),
        reason,
    })
}

/// Provisioning state of one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentInfo {
    /// The first allocation of this segment opted into sharing.
    pub shared: bool,
    /// Number of successful allocations.
    pub allocations: u32,
}

/// Segments provisioned against one client.
#[derive(Debug, Default)]
pub(crate) struct SegmentTable {
    entries: HashMap<String, SegmentInfo>,
}

impl SegmentTable {
    /// Record an allocation, enforcing the no-duplicate rule.
    pub(crate) fn provision(
        &mut self,
        client: &str,
        client_shared: bool,
        segment: &str,
        shared: bool,
    ) -> Result<()> {
        match self.entries.get_mut(segment) {
            Some(info) if !(info.shared || shared || client_shared) => {
                Err(CacheError::DuplicateSegment {
                    client: client.to_owned(),
                    segment: segment.to_owned(),
                })
            }
            Some(info) => {
                info.allocations += 1;
                debug!("Reusing shared segment {}/{}", client, segment);
                Ok(())
            }
            None => {
                self.entries.insert(
                    segment.to_owned(),
                    SegmentInfo {
                        shared,
                        allocations: 1,
                    },
                );
                debug!("Provisioned segment {}/{}", client, segment);
                Ok(())
            }
        }
    }

    pub(crate) fn get(&self, segment: &str) -> Option<SegmentInfo> {
        self.entries.get(segment).copied()
    }

    pub(crate) fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
