// Router counters: how each intercepted fetch was answered.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouterStats {
    /// Answered with a live network response.
    pub network_responses: u64,
    /// Answered from the cached copy of the same request.
    pub cache_hits: u64,
    /// Answered with the cached root document.
    pub shell_fallbacks: u64,
    /// No response could be produced.
    pub failed: u64,
    /// Not intercepted.
    pub passthrough: u64,
    /// Cache writes that failed and were swallowed.
    pub cache_write_failures: u64,
}

pub struct StatsCollector {
    network_responses: AtomicU64,
    cache_hits: AtomicU64,
    shell_fallbacks: AtomicU64,
    failed: AtomicU64,
    passthrough: AtomicU64,
    cache_write_failures: AtomicU64,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self {
            network_responses: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            shell_fallbacks: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            passthrough: AtomicU64::new(0),
            cache_write_failures: AtomicU64::new(0),
        }
    }

    pub fn record_network(&self) {
        self.network_responses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_shell_fallback(&self) {
        self.shell_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_passthrough(&self) {
        self.passthrough.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_write_failure(&self) {
        self.cache_write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RouterStats {
        RouterStats {
            network_responses: self.network_responses.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            shell_fallbacks: self.shell_fallbacks.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            passthrough: self.passthrough.load(Ordering::Relaxed),
            cache_write_failures: self.cache_write_failures.load(Ordering::Relaxed),
        }
    }
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new()
    }
}
