use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Snapshot of a repository's process-local counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RepositoryStats {
    /// Full scans of the primary index performed by `find`/`find_one`.
    pub full_scans: u64,
    /// Queries answered from a valid cache entry.
    pub cache_hits: u64,
    /// Queries that found no valid cache entry.
    pub cache_misses: u64,
    /// Stale references removed from the primary index or a cache entry.
    pub pruned_references: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    full_scans: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    pruned_references: AtomicU64,
}

impl StatsRecorder {
    pub(crate) fn full_scan(&self) {
        self.full_scans.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn pruned(&self, count: u64) {
        self.pruned_references.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> RepositoryStats {
        RepositoryStats {
            full_scans: self.full_scans.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            pruned_references: self.pruned_references.load(Ordering::Relaxed),
        }
    }
}
