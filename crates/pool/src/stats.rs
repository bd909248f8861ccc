//! Pool statistics and metrics tracking
//!
//! Counters are plain atomics shared between the pool and its removal hook,
//! so recording never takes the map's lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::bounded::RemovalCause;

/// Statistics snapshot for a client pool
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Current number of cached clients
    pub size: usize,

    /// Maximum number of cached clients
    pub capacity: usize,

    /// Lookups answered by an open cached client
    pub hits: u64,

    /// Lookups that had to build a client (including stale replacements)
    pub misses: u64,

    /// Clients successfully built by the factory
    pub creations: u64,

    /// Factory calls that failed
    pub construction_failures: u64,

    /// Cached clients found not open and replaced
    pub stale_replacements: u64,

    /// Clients dropped to make room for another config
    pub evictions: u64,

    /// Clients removed for any other reason (invalidate, stale, clear, race)
    pub removals: u64,

    /// Successful `close()` calls on removed clients
    pub closes: u64,

    /// Failed `close()` calls on removed clients
    pub close_failures: u64,
}

impl PoolStats {
    /// Calculate hit rate (hits / total lookups)
    pub fn hit_rate(&self) -> f64 {
        let total = self.total_lookups();
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Total number of lookups (hits + misses)
    pub fn total_lookups(&self) -> u64 {
        self.hits + self.misses
    }

    /// Calculate fill percentage (size / capacity)
    pub fn fill_percentage(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.size as f64 / self.capacity as f64
        }
    }

    /// Number of clients that left the pool, whatever the cause
    pub fn total_removed(&self) -> u64 {
        self.evictions + self.removals
    }
}

/// Thread-safe metrics collector for pool operations
///
/// Clones share the same counters. A disabled collector records nothing.
#[derive(Debug, Clone)]
pub(crate) struct MetricsCollector {
    enabled: bool,
    counters: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    creations: AtomicU64,
    construction_failures: AtomicU64,
    stale_replacements: AtomicU64,
    evictions: AtomicU64,
    removals: AtomicU64,
    closes: AtomicU64,
    close_failures: AtomicU64,
}

impl MetricsCollector {
    pub(crate) fn new(enabled: bool) -> Self {
        Self { enabled, counters: Arc::new(Counters::default()) }
    }

    fn bump(&self, counter: impl Fn(&Counters) -> &AtomicU64) {
        if self.enabled {
            counter(&self.counters).fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_hit(&self) {
        self.bump(|c| &c.hits);
    }

    pub(crate) fn record_miss(&self) {
        self.bump(|c| &c.misses);
    }

    pub(crate) fn record_creation(&self) {
        self.bump(|c| &c.creations);
    }

    pub(crate) fn record_construction_failure(&self) {
        self.bump(|c| &c.construction_failures);
    }

    pub(crate) fn record_stale_replacement(&self) {
        self.bump(|c| &c.stale_replacements);
    }

    pub(crate) fn record_removal(&self, cause: RemovalCause) {
        if cause.was_evicted() {
            self.bump(|c| &c.evictions);
        } else {
            self.bump(|c| &c.removals);
        }
    }

    pub(crate) fn record_close(&self, ok: bool) {
        if ok {
            self.bump(|c| &c.closes);
        } else {
            self.bump(|c| &c.close_failures);
        }
    }

    /// Get current statistics snapshot
    pub(crate) fn snapshot(&self, size: usize, capacity: usize) -> PoolStats {
        let c = &self.counters;
        PoolStats {
            size,
            capacity,
            hits: c.hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            creations: c.creations.load(Ordering::Relaxed),
            construction_failures: c.construction_failures.load(Ordering::Relaxed),
            stale_replacements: c.stale_replacements.load(Ordering::Relaxed),
            evictions: c.evictions.load(Ordering::Relaxed),
            removals: c.removals.load(Ordering::Relaxed),
            closes: c.closes.load(Ordering::Relaxed),
            close_failures: c.close_failures.load(Ordering::Relaxed),
        }
    }
}
