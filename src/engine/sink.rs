//! Downstream sinks for collection records and log entries.
//!
//! The engine only depends on the traits; the in-memory implementations back
//! the daemon when no external store is configured, and the tests.

use std::collections::HashMap;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::error::EngineResult;
use super::record::{CollectionData, CollectionLogEntry};

/// Accepts persisted metric records
#[async_trait]
pub trait DataSink: Send + Sync {
    async fn save(&self, records: Vec<CollectionData>) -> EngineResult<()>;

    /// Delete records whose expiry is at or before `now`, returning how many were removed
    async fn delete_expired(&self, now: DateTime<Utc>) -> EngineResult<usize>;

    /// Records collected within `[start, end]`
    async fn count_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> EngineResult<u64>;

    /// Records collected within `[start, end]`, by plugin type
    async fn count_by_plugin_type(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> EngineResult<HashMap<String, u64>>;
}

/// Accepts structured collection log entries
#[async_trait]
pub trait LogSink: Send + Sync {
    async fn log_collection(&self, entry: CollectionLogEntry) -> EngineResult<()>;

    /// Delete entries logged before `cutoff`, returning how many were removed
    async fn cleanup_before(&self, cutoff: DateTime<Utc>) -> EngineResult<usize>;
}

#[derive(Debug, Default)]
pub struct MemoryDataSink {
    records: RwLock<Vec<CollectionData>>,
}

impl MemoryDataSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<CollectionData> {
        self.records.read().clone()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn within(record: &CollectionData, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        record.collected_at >= start && record.collected_at <= end
    }
}

#[async_trait]
impl DataSink for MemoryDataSink {
    async fn save(&self, records: Vec<CollectionData>) -> EngineResult<()> {
        self.records.write().extend(records);
        Ok(())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> EngineResult<usize> {
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|record| !record.is_expired(now));
        Ok(before - records.len())
    }

    async fn count_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> EngineResult<u64> {
        Ok(self
            .records
            .read()
            .iter()
            .filter(|record| Self::within(record, start, end))
            .count() as u64)
    }

    async fn count_by_plugin_type(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> EngineResult<HashMap<String, u64>> {
        let mut counts = HashMap::new();
        for record in self.records.read().iter().filter(|record| Self::within(record, start, end)) {
            let plugin_type = record.plugin_type.clone().unwrap_or_else(|| "unknown".to_string());
            *counts.entry(plugin_type).or_insert(0) += 1;
        }
        Ok(counts)
    }
}

#[derive(Debug, Default)]
pub struct MemoryLogSink {
    entries: RwLock<Vec<CollectionLogEntry>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<CollectionLogEntry> {
        self.entries.read().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl LogSink for MemoryLogSink {
    async fn log_collection(&self, entry: CollectionLogEntry) -> EngineResult<()> {
        self.entries.write().push(entry);
        Ok(())
    }

    async fn cleanup_before(&self, cutoff: DateTime<Utc>) -> EngineResult<usize> {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|entry| entry.logged_at >= cutoff);
        Ok(before - entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CollectionResult, MetricConfig};
    use chrono::Duration;
    use serde_json::json;

    fn records(plugin_type: &str) -> Vec<CollectionData> {
        let mut result = CollectionResult::success(HashMap::new()).with_metric("cpu", json!(12));
        result.plugin_type = Some(plugin_type.to_string());
        CollectionData::from_result(1, &MetricConfig::new("cpu", "gauge"), &result)
    }

    #[tokio::test]
    async fn test_memory_data_sink_counts_and_expiry() {
        let sink = MemoryDataSink::new();
        sink.save(records("snmp")).await.unwrap();
        sink.save(records("snmp")).await.unwrap();
        sink.save(records("http")).await.unwrap();

        let start = Utc::now() - Duration::hours(1);
        let end = Utc::now() + Duration::hours(1);
        assert_eq!(sink.count_between(start, end).await.unwrap(), 3);
        let by_type = sink.count_by_plugin_type(start, end).await.unwrap();
        assert_eq!(by_type.get("snmp"), Some(&2));
        assert_eq!(by_type.get("http"), Some(&1));

        assert_eq!(sink.delete_expired(Utc::now()).await.unwrap(), 0);
        assert_eq!(sink.delete_expired(Utc::now() + Duration::days(31)).await.unwrap(), 3);
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_memory_log_sink_cleanup() {
        let sink = MemoryLogSink::new();
        let result = CollectionResult::failure("TIMEOUT", "slow");
        sink.log_collection(CollectionLogEntry::from_result(1, "cpu", &result)).await.unwrap();

        assert_eq!(sink.cleanup_before(Utc::now() - Duration::days(30)).await.unwrap(), 0);
        assert_eq!(sink.cleanup_before(Utc::now() + Duration::seconds(1)).await.unwrap(), 1);
        assert!(sink.is_empty());
    }
}
