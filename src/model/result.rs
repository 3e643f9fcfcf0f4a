//! Collection results
//!
//! A collection never surfaces as an `Err`: every outcome, including missing
//! plugins and plugin panics, is a `CollectionResult` carrying an error code.

use std::collections::HashMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stable error codes carried by failed results
pub mod error_codes {
    pub const PLUGIN_NOT_INITIALIZED: &str = "PLUGIN_NOT_INITIALIZED";
    pub const PLUGIN_DESTROYED: &str = "PLUGIN_DESTROYED";
    pub const COLLECTION_ERROR: &str = "COLLECTION_ERROR";
    pub const NO_PLUGIN_FOUND: &str = "NO_PLUGIN_FOUND";
    pub const EXECUTION_ERROR: &str = "EXECUTION_ERROR";
    pub const TIMEOUT: &str = "TIMEOUT";
    pub const CONNECTION_FAILED: &str = "CONNECTION_FAILED";
    pub const INVALID_CONFIG: &str = "INVALID_CONFIG";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CollectionStatus {
    Success,
    Failed,
    Timeout,
    Cancelled,
    Partial,
}

impl std::fmt::Display for CollectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CollectionStatus::Success => "SUCCESS",
            CollectionStatus::Failed => "FAILED",
            CollectionStatus::Timeout => "TIMEOUT",
            CollectionStatus::Cancelled => "CANCELLED",
            CollectionStatus::Partial => "PARTIAL",
        };
        write!(f, "{}", s)
    }
}

/// Outcome of one metric collection against one device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionResult {
    pub success: bool,
    pub status: CollectionStatus,
    pub metrics: HashMap<String, Value>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    /// Milliseconds since the epoch at creation
    pub timestamp: i64,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Milliseconds between start and end
    pub duration: u64,
    /// 0-100
    pub quality_score: u8,
    pub plugin_type: Option<String>,
    pub device_id: Option<u64>,
    pub metric_name: Option<String>,
    pub session_id: Option<String>,
    pub task_id: Option<u64>,
    pub retry_count: u32,
    pub raw_data: Option<String>,
    pub metadata: HashMap<String, Value>,
}

impl CollectionResult {
    fn base(success: bool, status: CollectionStatus) -> Self {
        Self {
            success,
            status,
            metrics: HashMap::new(),
            error_code: None,
            error_message: None,
            timestamp: Utc::now().timestamp_millis(),
            start_time: None,
            end_time: None,
            duration: 0,
            quality_score: if success { 100 } else { 0 },
            plugin_type: None,
            device_id: None,
            metric_name: None,
            session_id: None,
            task_id: None,
            retry_count: 0,
            raw_data: None,
            metadata: HashMap::new(),
        }
    }

    pub fn success(metrics: HashMap<String, Value>) -> Self {
        Self {
            metrics,
            ..Self::base(true, CollectionStatus::Success)
        }
    }

    pub fn failure(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: Some(code.into()),
            error_message: Some(message.into()),
            ..Self::base(false, CollectionStatus::Failed)
        }
    }

    pub fn timeout() -> Self {
        Self {
            error_code: Some(error_codes::TIMEOUT.to_string()),
            error_message: Some("Collection timed out".to_string()),
            ..Self::base(false, CollectionStatus::Timeout)
        }
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: Value) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }

    /// Record start and end times; duration is derived from the pair
    pub fn set_timing(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) {
        self.start_time = Some(start);
        self.end_time = Some(end);
        self.duration = (end - start).num_milliseconds().max(0) as u64;
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn error_code(&self) -> Option<&str> {
        self.error_code.as_deref()
    }
}
