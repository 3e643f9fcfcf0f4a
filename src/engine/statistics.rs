//! Engine-wide execution counters.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;

#[derive(Debug, Default)]
struct PluginCounters {
    executions: AtomicU64,
    total_time: AtomicU64,
    errors: AtomicU64,
}

/// Per-plugin view of the engine counters
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginExecutionStats {
    pub plugin_type: String,
    pub execution_count: u64,
    /// Milliseconds
    pub average_execution_time: f64,
    pub error_count: u64,
    pub error_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatisticsSnapshot {
    pub total_collections: u64,
    pub successful_collections: u64,
    pub failed_collections: u64,
    pub active_collections: i64,
    pub success_rate: f64,
    pub plugins: Vec<PluginExecutionStats>,
    pub last_cleanup_time: Option<DateTime<Utc>>,
    pub timestamp: DateTime<Utc>,
}

/// Marks a collection in flight
pub struct ActiveCollection<'a> {
    statistics: &'a EngineStatistics,
}

impl Drop for ActiveCollection<'_> {
    fn drop(&mut self) {
        self.statistics.active.fetch_sub(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Default)]
pub struct EngineStatistics {
    total: AtomicU64,
    successful: AtomicU64,
    failed: AtomicU64,
    active: AtomicI64,
    plugins: DashMap<String, PluginCounters>,
    last_cleanup: Mutex<Option<DateTime<Utc>>>,
}

impl EngineStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a new collection; it stays active until the guard drops
    pub fn begin(&self) -> ActiveCollection<'_> {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.active.fetch_add(1, Ordering::Relaxed);
        ActiveCollection { statistics: self }
    }

    pub fn finish(&self, plugin_type: Option<&str>, elapsed_ms: u64, success: bool) {
        if success {
            self.successful.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        if let Some(plugin_type) = plugin_type {
            let counters = self.plugins.entry(plugin_type.to_string()).or_default();
            counters.executions.fetch_add(1, Ordering::Relaxed);
            counters.total_time.fetch_add(elapsed_ms, Ordering::Relaxed);
            if !success {
                counters.errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn mark_cleanup(&self) {
        *self.last_cleanup.lock() = Some(Utc::now());
    }

    pub fn active(&self) -> i64 {
        self.active.load(Ordering::Relaxed)
    }

    /// Percentage of successful collections; 100 when nothing has run yet
    pub fn success_rate(&self) -> f64 {
        let total = self.successful.load(Ordering::Relaxed) + self.failed.load(Ordering::Relaxed);
        if total == 0 {
            return 100.0;
        }
        self.successful.load(Ordering::Relaxed) as f64 / total as f64 * 100.0
    }

    /// Per-plugin stats, fastest average first
    pub fn plugin_ranking(&self) -> Vec<PluginExecutionStats> {
        let mut ranking: Vec<PluginExecutionStats> = self
            .plugins
            .iter()
            .map(|entry| {
                let executions = entry.executions.load(Ordering::Relaxed);
                let errors = entry.errors.load(Ordering::Relaxed);
                let (average, error_rate) = if executions == 0 {
                    (0.0, 0.0)
                } else {
                    (
                        entry.total_time.load(Ordering::Relaxed) as f64 / executions as f64,
                        errors as f64 / executions as f64 * 100.0,
                    )
                };
                PluginExecutionStats {
                    plugin_type: entry.key().clone(),
                    execution_count: executions,
                    average_execution_time: average,
                    error_count: errors,
                    error_rate,
                }
            })
            .collect();
        ranking.sort_by(|a, b| {
            a.average_execution_time
                .total_cmp(&b.average_execution_time)
                .then_with(|| a.plugin_type.cmp(&b.plugin_type))
        });
        ranking
    }

    pub fn snapshot(&self) -> EngineStatisticsSnapshot {
        EngineStatisticsSnapshot {
            total_collections: self.total.load(Ordering::Relaxed),
            successful_collections: self.successful.load(Ordering::Relaxed),
            failed_collections: self.failed.load(Ordering::Relaxed),
            active_collections: self.active(),
            success_rate: self.success_rate(),
            plugins: self.plugin_ranking(),
            last_cleanup_time: *self.last_cleanup.lock(),
            timestamp: Utc::now(),
        }
    }

    /// Execution counts keyed by plugin type
    pub fn plugin_execution_counts(&self) -> HashMap<String, u64> {
        self.plugins
            .iter()
            .map(|entry| (entry.key().clone(), entry.executions.load(Ordering::Relaxed)))
            .collect()
    }

    /// Zero every counter except the active count
    pub fn reset(&self) {
        self.total.store(0, Ordering::Relaxed);
        self.successful.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
        self.plugins.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_success_rate() {
        let stats = EngineStatistics::new();
        assert_eq!(stats.success_rate(), 100.0);
        assert!(stats.plugin_ranking().is_empty());
    }

    #[test]
    fn test_counters() {
        let stats = EngineStatistics::new();
        let first = stats.begin();
        let second = stats.begin();
        assert_eq!(stats.active(), 2);
        stats.finish(Some("snmp"), 30, true);
        stats.finish(Some("snmp"), 10, false);
        drop(first);
        drop(second);
        let third = stats.begin();
        stats.finish(None, 1, false);
        drop(third);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_collections, 3);
        assert_eq!(snapshot.successful_collections, 1);
        assert_eq!(snapshot.failed_collections, 2);
        assert_eq!(snapshot.active_collections, 0);
        assert_eq!(snapshot.plugins.len(), 1);
        assert_eq!(snapshot.plugins[0].average_execution_time, 20.0);
        assert_eq!(snapshot.plugins[0].error_rate, 50.0);

        stats.reset();
        assert_eq!(stats.success_rate(), 100.0);
        assert!(stats.plugin_execution_counts().is_empty());
    }
}
