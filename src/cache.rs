//! Process-wide cache of device configuration fetches.
//!
//! Fetching `show running-config` is the most expensive round-trip the
//! modules make, and a single run may want the same text several times. The
//! cache is keyed by the exact flag string used to request the fetch (an
//! empty string for a plain fetch, `with-default` for a defaults fetch, and
//! so on), populated lazily on first fetch, and never invalidated on its own
//! within a run.
//!
//! That last property is a deliberate trade-off favoring fewer round-trips
//! over absolute freshness: a caller that mutates the device and then reads
//! through the cache sees the pre-mutation text. Callers needing fresh data
//! after a push must go through the uncached command path or call
//! [`DeviceConfigCache::invalidate`] / [`DeviceConfigCache::clear`]
//! explicitly.
//!
//! The cache is an owned object handed to the module context rather than
//! module-level global state, so tests get isolation for free and future
//! invalidation-on-mutation has a place to live.

use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

/// Cache of fetched configuration text, keyed by fetch flag string.
#[derive(Debug, Default)]
pub struct DeviceConfigCache {
    entries: RwLock<HashMap<String, String>>,
}

impl DeviceConfigCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a previous fetch by its flag string.
    pub fn get(&self, flag_str: &str) -> Option<String> {
        let entries = self.entries.read();
        let hit = entries.get(flag_str).cloned();
        if hit.is_some() {
            debug!(flags = %flag_str, "serving device config from cache");
        }
        hit
    }

    /// Record a fetch result.
    pub fn insert(&self, flag_str: impl Into<String>, contents: impl Into<String>) {
        self.entries.write().insert(flag_str.into(), contents.into());
    }

    /// Drop one entry, forcing the next fetch with these flags to hit the
    /// device.
    pub fn invalidate(&self, flag_str: &str) -> bool {
        self.entries.write().remove(flag_str).is_some()
    }

    /// Drop everything.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
