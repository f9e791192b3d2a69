//! Cache Tier
//!
//! One named key → view map guarded by a reader/writer lock.
//!
//! # Design
//!
//! - Concurrent `get`s share the read lock; `put`, `put_if` and `clear` take the write lock
//! - Locks are held for the map operation only, never while a view is built
//! - Entries are immutable `Arc`s; a `put` replaces, a `clear` swaps in a fresh map

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use super::metrics::{TierMetrics, TierSnapshot};
use crate::platform::PlatformData;
use crate::selector::{CacheKey, TierKind};

/// A single cache tier
pub struct CacheTier {
    kind: TierKind,
    entries: RwLock<HashMap<CacheKey, Arc<PlatformData>>>,
    metrics: TierMetrics,
}

impl CacheTier {
    /// Create an empty tier
    pub fn new(kind: TierKind) -> Self {
        Self {
            kind,
            entries: RwLock::new(HashMap::new()),
            metrics: TierMetrics::new(),
        }
    }

    pub fn kind(&self) -> TierKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.as_str()
    }

    /// Look up a view
    pub fn get(&self, key: &CacheKey) -> Option<Arc<PlatformData>> {
        let found = self.entries.read().get(key).cloned();

        if found.is_some() {
            self.metrics.record_hit();
            trace!(tier = %self.kind, key = %key, "cache hit");
        } else {
            self.metrics.record_miss();
            trace!(tier = %self.kind, key = %key, "cache miss");
        }

        found
    }

    /// Insert a view; the last writer wins
    pub fn put(&self, key: CacheKey, view: Arc<PlatformData>) {
        self.put_if(key, view, || true);
    }

    /// Insert a view only if `current` still holds once the write lock is
    /// taken. Returns whether the view was stored.
    pub fn put_if(
        &self,
        key: CacheKey,
        view: Arc<PlatformData>,
        current: impl FnOnce() -> bool,
    ) -> bool {
        let mut entries = self.entries.write();
        if !current() {
            debug!(tier = %self.kind, key = %key, view = %view, "stale put discarded");
            return false;
        }
        debug!(tier = %self.kind, key = %key, view = %view, "cache put");
        entries.insert(key, view);
        drop(entries);
        self.metrics.record_put();
        true
    }

    /// Drop every entry
    pub fn clear(&self) {
        let previous = std::mem::take(&mut *self.entries.write());
        self.metrics.record_clear();
        debug!(tier = %self.kind, dropped = previous.len(), "cache cleared");
    }

    /// Look up a view without touching the hit/miss counters
    pub fn peek(&self, key: &CacheKey) -> Option<Arc<PlatformData>> {
        self.entries.read().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Sorted keys, for diagnostics
    pub fn keys(&self) -> Vec<CacheKey> {
        let mut keys: Vec<CacheKey> = self.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn metrics(&self) -> &TierMetrics {
        &self.metrics
    }

    pub fn snapshot(&self) -> TierSnapshot {
        self.metrics.snapshot(self.len())
    }
}

impl std::fmt::Debug for CacheTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheTier")
            .field("kind", &self.kind)
            .field("entries", &self.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
