use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Counters shared by every worker of a search. Counters are never reset, so
/// a searcher reused across calls reports running totals.
#[derive(Debug, Clone)]
pub struct SearchMetrics {
    resources_searched: Arc<AtomicU64>,
    resources_failed: Arc<AtomicU64>,
    items_evaluated: Arc<AtomicU64>,
    matches: Arc<AtomicU64>,
    decode_failures: Arc<AtomicU64>,
    pages_fetched: Arc<AtomicU64>,
    invalid_names: Arc<AtomicU64>,
}

impl SearchMetrics {
    pub fn new() -> Self {
        Self {
            resources_searched: Arc::new(AtomicU64::new(0)),
            resources_failed: Arc::new(AtomicU64::new(0)),
            items_evaluated: Arc::new(AtomicU64::new(0)),
            matches: Arc::new(AtomicU64::new(0)),
            decode_failures: Arc::new(AtomicU64::new(0)),
            pages_fetched: Arc::new(AtomicU64::new(0)),
            invalid_names: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Records a resource (bucket, table, subtree) that was searched to the end
    pub fn record_resource(&self) {
        self.resources_searched.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a resource skipped or aborted after a backend error
    pub fn record_resource_failure(&self) {
        let total = self.resources_failed.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("Resource failures so far: {}", total);
    }

    pub fn record_items(&self, count: u64) {
        self.items_evaluated.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_matches(&self, count: u64) {
        self.matches.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_page(&self) {
        self.pages_fetched.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an attribute name that could not be used as a pattern
    pub fn record_invalid_name(&self) {
        self.invalid_names.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_stats(&self) -> SearchStats {
        SearchStats {
            resources_searched: self.resources_searched.load(Ordering::Relaxed),
            resources_failed: self.resources_failed.load(Ordering::Relaxed),
            items_evaluated: self.items_evaluated.load(Ordering::Relaxed),
            matches: self.matches.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            pages_fetched: self.pages_fetched.load(Ordering::Relaxed),
            invalid_names: self.invalid_names.load(Ordering::Relaxed),
        }
    }

    /// Logs current search statistics
    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Search stats:\n\
             Resources searched/failed: {}/{}\n\
             Items evaluated: {}\n\
             Matches: {}\n\
             Decode failures: {}\n\
             Invalid attribute names: {}\n\
             Pages fetched: {}",
            stats.resources_searched,
            stats.resources_failed,
            stats.items_evaluated,
            stats.matches,
            stats.decode_failures,
            stats.invalid_names,
            stats.pages_fetched
        );
    }
}

impl Default for SearchMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub resources_searched: u64,
    pub resources_failed: u64,
    pub items_evaluated: u64,
    pub matches: u64,
    pub decode_failures: u64,
    pub pages_fetched: u64,
    pub invalid_names: u64,
}
