//! Cache Tier Metrics
//!
//! Lock-free counters for monitoring a tier's effectiveness.

use std::sync::atomic::{AtomicU64, Ordering};

/// Per-tier counters
#[derive(Debug, Default)]
pub struct TierMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    puts: AtomicU64,
    clears: AtomicU64,
}

impl TierMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_put(&self) {
        self.puts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_clear(&self) {
        self.clears.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn puts(&self) -> u64 {
        self.puts.load(Ordering::Relaxed)
    }

    pub fn clears(&self) -> u64 {
        self.clears.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self, entries: usize) -> TierSnapshot {
        TierSnapshot {
            entries,
            hits: self.hits(),
            misses: self.misses(),
            puts: self.puts(),
            clears: self.clears(),
        }
    }
}

/// Point-in-time tier statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct TierSnapshot {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub puts: u64,
    pub clears: u64,
}
