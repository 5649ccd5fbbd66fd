//! Counters for resolution, definition and index activity.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Loader metrics (thread-safe counters, cheap to clone and share).
#[derive(Debug, Clone, Default)]
pub struct LoaderMetrics {
    /// Lookups answered by the positive cache
    pub positive_hits: Arc<AtomicU64>,
    /// Lookups answered by the global negative cache
    pub negative_hits: Arc<AtomicU64>,
    /// Candidate sets taken from a package index bucket
    pub index_lookups: Arc<AtomicU64>,
    /// Candidate sets that fell back to the full container list
    pub full_list_fallbacks: Arc<AtomicU64>,
    /// Individual `get_resource` calls made against containers
    pub container_probes: Arc<AtomicU64>,
    /// Units defined locally
    pub definitions: Arc<AtomicU64>,
    /// Units that went through a non-empty transformer chain
    pub transforms: Arc<AtomicU64>,
    /// Unit bytes served by the precompiled-artifact cache
    pub precompiled_hits: Arc<AtomicU64>,
    /// Definitions written back to the precompiled-artifact cache
    pub precompiled_stores: Arc<AtomicU64>,
    /// Requests rejected by the deny-list
    pub forbidden_rejections: Arc<AtomicU64>,
    /// Completed package index builds
    pub index_builds: Arc<AtomicU64>,
    /// Package index builds that failed
    pub index_build_failures: Arc<AtomicU64>,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl LoaderMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_positive_hit(&self) {
        bump(&self.positive_hits);
    }

    pub fn record_negative_hit(&self) {
        bump(&self.negative_hits);
    }

    pub fn record_index_lookup(&self) {
        bump(&self.index_lookups);
    }

    pub fn record_full_list_fallback(&self) {
        bump(&self.full_list_fallbacks);
    }

    pub fn record_container_probe(&self) {
        bump(&self.container_probes);
    }

    pub fn record_definition(&self) {
        bump(&self.definitions);
    }

    pub fn record_transform(&self) {
        bump(&self.transforms);
    }

    pub fn record_precompiled_hit(&self) {
        bump(&self.precompiled_hits);
    }

    pub fn record_precompiled_store(&self) {
        bump(&self.precompiled_stores);
    }

    pub fn record_forbidden(&self) {
        bump(&self.forbidden_rejections);
    }

    pub fn record_index_build(&self) {
        bump(&self.index_builds);
    }

    pub fn record_index_build_failure(&self) {
        bump(&self.index_build_failures);
    }

    /// Get a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |c: &Arc<AtomicU64>| c.load(Ordering::Relaxed);
        MetricsSnapshot {
            positive_hits: load(&self.positive_hits),
            negative_hits: load(&self.negative_hits),
            index_lookups: load(&self.index_lookups),
            full_list_fallbacks: load(&self.full_list_fallbacks),
            container_probes: load(&self.container_probes),
            definitions: load(&self.definitions),
            transforms: load(&self.transforms),
            precompiled_hits: load(&self.precompiled_hits),
            precompiled_stores: load(&self.precompiled_stores),
            forbidden_rejections: load(&self.forbidden_rejections),
            index_builds: load(&self.index_builds),
            index_build_failures: load(&self.index_build_failures),
        }
    }

    /// Reset all counters.
    pub fn reset(&self) {
        for counter in [
            &self.positive_hits,
            &self.negative_hits,
            &self.index_lookups,
            &self.full_list_fallbacks,
            &self.container_probes,
            &self.definitions,
            &self.transforms,
            &self.precompiled_hits,
            &self.precompiled_stores,
            &self.forbidden_rejections,
            &self.index_builds,
            &self.index_build_failures,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Snapshot of metrics (for reporting).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub positive_hits: u64,
    pub negative_hits: u64,
    pub index_lookups: u64,
    pub full_list_fallbacks: u64,
    pub container_probes: u64,
    pub definitions: u64,
    pub transforms: u64,
    pub precompiled_hits: u64,
    pub precompiled_stores: u64,
    pub forbidden_rejections: u64,
    pub index_builds: u64,
    pub index_build_failures: u64,
}

impl MetricsSnapshot {
    /// Lookups that reached the container scan or one of the two caches.
    pub fn total_lookups(&self) -> u64 {
        self.positive_hits + self.negative_hits + self.index_lookups + self.full_list_fallbacks
    }

    /// Share of lookups answered by either cache.
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.total_lookups();
        if total == 0 {
            return 0.0;
        }
        (self.positive_hits + self.negative_hits) as f64 / total as f64
    }

    /// Share of scans that could use the package index.
    pub fn index_use_rate(&self) -> f64 {
        let scans = self.index_lookups + self.full_list_fallbacks;
        if scans == 0 {
            return 0.0;
        }
        self.index_lookups as f64 / scans as f64
    }

    /// Format a human-readable report.
    pub fn format_report(&self) -> String {
        let mut lines = Vec::new();
        lines.push("Loader Metrics Report".to_string());
        lines.push("=".repeat(50));
        lines.push("Resolution:".to_string());
        lines.push(format!("  Positive Hits:   {}", self.positive_hits));
        lines.push(format!("  Negative Hits:   {}", self.negative_hits));
        lines.push(format!("  Index Scans:     {}", self.index_lookups));
        lines.push(format!("  Full Scans:      {}", self.full_list_fallbacks));
        lines.push(format!("  Probes:          {}", self.container_probes));
        lines.push(format!(
            "  Cache Hit Rate:  {:.1}%",
            self.cache_hit_rate() * 100.0
        ));
        lines.push(format!(
            "  Index Use Rate:  {:.1}%",
            self.index_use_rate() * 100.0
        ));
        lines.push(String::new());
        lines.push("Definition:".to_string());
        lines.push(format!("  Defined:         {}", self.definitions));
        lines.push(format!("  Transformed:     {}", self.transforms));
        lines.push(format!("  Forbidden:       {}", self.forbidden_rejections));
        lines.push(format!("  Precompiled Hit: {}", self.precompiled_hits));
        lines.push(format!("  Precompiled Put: {}", self.precompiled_stores));
        lines.push(String::new());
        lines.push("Package Index:".to_string());
        lines.push(format!("  Builds:          {}", self.index_builds));
        lines.push(format!("  Failures:        {}", self.index_build_failures));
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_and_reset() {
        let metrics = LoaderMetrics::new();
        let shared = metrics.clone();
        shared.record_positive_hit();
        shared.record_positive_hit();
        shared.record_full_list_fallback();
        metrics.record_index_lookup();

        let snap = metrics.snapshot();
        assert_eq!(snap.positive_hits, 2);
        assert_eq!(snap.total_lookups(), 4);
        assert!((snap.cache_hit_rate() - 0.5).abs() < f64::EPSILON);
        assert!((snap.index_use_rate() - 0.5).abs() < f64::EPSILON);

        metrics.reset();
        assert_eq!(shared.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_report_mentions_sections() {
        let report = LoaderMetrics::new().snapshot().format_report();
        assert!(report.contains("Resolution:"));
        assert!(report.contains("Package Index:"));
        assert!(report.contains("0.0%"));
    }
}
