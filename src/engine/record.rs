//! Persisted collection records
//!
//! A successful result is fanned out into one [`CollectionData`] record per
//! metric value. Every collection, successful or not, also produces a
//! [`CollectionLogEntry`].

use std::collections::HashMap;
use std::sync::OnceLock;
use chrono::{DateTime, Duration, TimeZone, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{CollectionResult, CollectionStatus, MetricConfig};

/// Days a record is kept for the given metric type
pub fn retention_days(metric_type: &str) -> i64 {
    match metric_type {
        "health_check" | "status_code" | "response_time" => 7,
        "system_info" | "interface_stats" => 30,
        "custom_oid" | "custom_endpoint" => 90,
        _ => 30,
    }
}

fn numeric_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^-?\d+(\.\d+)?$").expect("numeric pattern is valid"))
}

/// Numeric view of a metric value.
///
/// Numbers pass through, numeric-looking strings are parsed and booleans map
/// to 1/0. Anything else has no numeric value.
pub fn coerce_numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if numeric_pattern().is_match(s) => s.parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// One persisted metric value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionData {
    pub device_id: u64,
    pub task_id: Option<u64>,
    pub metric_name: String,
    pub metric_type: String,
    pub metric_value: Option<f64>,
    /// Raw value as collected
    pub metric_data: Value,
    pub collected_at: DateTime<Utc>,
    pub quality_score: u8,
    pub plugin_type: Option<String>,
    pub session_id: Option<String>,
    /// Milliseconds
    pub response_time: Option<u64>,
    pub success: bool,
    pub error_message: Option<String>,
    pub tags: HashMap<String, String>,
    pub expires_at: DateTime<Utc>,
}

impl CollectionData {
    /// Records for every metric value of a result
    pub fn from_result(device_id: u64, metric: &MetricConfig, result: &CollectionResult) -> Vec<CollectionData> {
        let collected_at = Utc
            .timestamp_millis_opt(result.timestamp)
            .single()
            .unwrap_or_else(Utc::now);
        let expires_at = Utc::now() + Duration::days(retention_days(&metric.metric_type));
        let response_time = match (result.start_time, result.end_time) {
            (Some(_), Some(_)) => Some(result.duration),
            _ => None,
        };

        result
            .metrics
            .iter()
            .map(|(name, value)| CollectionData {
                device_id,
                task_id: result.task_id,
                metric_name: name.clone(),
                metric_type: metric.metric_type.clone(),
                metric_value: coerce_numeric(value),
                metric_data: value.clone(),
                collected_at,
                quality_score: result.quality_score,
                plugin_type: result.plugin_type.clone(),
                session_id: result.session_id.clone(),
                response_time,
                success: result.success,
                error_message: if result.success { None } else { result.error_message.clone() },
                tags: metric.tags.clone(),
                expires_at,
            })
            .collect()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Structured log line for one collection attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionLogEntry {
    pub task_id: Option<u64>,
    pub device_id: u64,
    pub metric_name: String,
    pub plugin_type: Option<String>,
    pub session_id: Option<String>,
    pub status: CollectionStatus,
    pub success: bool,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Milliseconds
    pub duration: u64,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub logged_at: DateTime<Utc>,
}

impl CollectionLogEntry {
    pub fn from_result(device_id: u64, metric_name: &str, result: &CollectionResult) -> Self {
        Self {
            task_id: result.task_id,
            device_id,
            metric_name: metric_name.to_string(),
            plugin_type: result.plugin_type.clone(),
            session_id: result.session_id.clone(),
            status: result.status,
            success: result.success,
            start_time: result.start_time,
            end_time: result.end_time,
            duration: result.duration,
            error_code: result.error_code.clone(),
            error_message: result.error_message.clone(),
            logged_at: Utc::now(),
        }
    }
}
