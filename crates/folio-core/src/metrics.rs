//! Process-wide counters for a notebook run.
//!
//! Incremented silently at the call site; [`Metrics::flush`] emits the
//! current values as a single `tracing::info!` event at the end of a run.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    modules_executed: AtomicU64,
    modules_failed: AtomicU64,
    assets_downloaded: AtomicU64,
    asset_cache_hits: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            modules_executed: AtomicU64::new(0),
            modules_failed: AtomicU64::new(0),
            assets_downloaded: AtomicU64::new(0),
            asset_cache_hits: AtomicU64::new(0),
        }
    }

    /// Count one executed module, and one failure when `success` is false.
    pub fn record_module(&self, success: bool) {
        self.modules_executed.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.modules_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn inc_assets_downloaded(&self) {
        self.assets_downloaded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_asset_cache_hits(&self) {
        self.asset_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            modules_executed = self.modules_executed(),
            modules_failed = self.modules_failed(),
            assets_downloaded = self.assets_downloaded(),
            asset_cache_hits = self.asset_cache_hits(),
        );
    }

    pub fn modules_executed(&self) -> u64 {
        self.modules_executed.load(Ordering::Relaxed)
    }

    pub fn modules_failed(&self) -> u64 {
        self.modules_failed.load(Ordering::Relaxed)
    }

    pub fn assets_downloaded(&self) -> u64 {
        self.assets_downloaded.load(Ordering::Relaxed)
    }

    pub fn asset_cache_hits(&self) -> u64 {
        self.asset_cache_hits.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_module_counts_failures_separately() {
        let metrics = Metrics::new();
        metrics.record_module(true);
        metrics.record_module(false);
        metrics.record_module(false);
        assert_eq!(metrics.modules_executed(), 3);
        assert_eq!(metrics.modules_failed(), 2);
    }

    #[test]
    fn asset_counters_are_independent() {
        let metrics = Metrics::new();
        metrics.inc_assets_downloaded();
        metrics.inc_asset_cache_hits();
        metrics.inc_asset_cache_hits();
        assert_eq!(metrics.assets_downloaded(), 1);
        assert_eq!(metrics.asset_cache_hits(), 2);
        metrics.flush();
    }
}
