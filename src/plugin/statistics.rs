//! Rolling per-plugin collection statistics.

use std::collections::HashMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginStatistics {
    pub total_collections: u64,
    pub successful_collections: u64,
    pub failed_collections: u64,
    /// Milliseconds
    pub total_collection_time: u64,
    pub average_response_time: f64,
    pub min_response_time: Option<u64>,
    pub max_response_time: Option<u64>,
    pub last_collection_time: Option<DateTime<Utc>>,
    pub last_success_time: Option<DateTime<Utc>>,
    pub last_failure_time: Option<DateTime<Utc>>,
    pub statistics_start_time: DateTime<Utc>,
    /// Failure count per error code
    pub error_counts: HashMap<String, u64>,
}

impl Default for PluginStatistics {
    fn default() -> Self {
        Self {
            total_collections: 0,
            successful_collections: 0,
            failed_collections: 0,
            total_collection_time: 0,
            average_response_time: 0.0,
            min_response_time: None,
            max_response_time: None,
            last_collection_time: None,
            last_success_time: None,
            last_failure_time: None,
            statistics_start_time: Utc::now(),
            error_counts: HashMap::new(),
        }
    }
}

impl PluginStatistics {
    pub fn record_success(&mut self, response_time: u64) {
        self.successful_collections += 1;
        let now = self.record(response_time);
        self.last_success_time = Some(now);
    }

    pub fn record_failure(&mut self, response_time: u64, error_code: Option<&str>) {
        self.failed_collections += 1;
        if let Some(code) = error_code {
            *self.error_counts.entry(code.to_string()).or_insert(0) += 1;
        }
        let now = self.record(response_time);
        self.last_failure_time = Some(now);
    }

    fn record(&mut self, response_time: u64) -> DateTime<Utc> {
        let now = Utc::now();
        self.total_collections += 1;
        self.total_collection_time += response_time;
        self.average_response_time = self.total_collection_time as f64 / self.total_collections as f64;
        self.min_response_time = Some(self.min_response_time.map_or(response_time, |m| m.min(response_time)));
        self.max_response_time = Some(self.max_response_time.map_or(response_time, |m| m.max(response_time)));
        self.last_collection_time = Some(now);
        now
    }

    /// Percentage of successful collections; 100 when nothing has run yet
    pub fn success_rate(&self) -> f64 {
        if self.total_collections == 0 {
            return 100.0;
        }
        self.successful_collections as f64 / self.total_collections as f64 * 100.0
    }

    pub fn failure_rate(&self) -> f64 {
        if self.total_collections == 0 {
            return 0.0;
        }
        self.failed_collections as f64 / self.total_collections as f64 * 100.0
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
