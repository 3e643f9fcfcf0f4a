//! Metric configuration
//!
//! Describes one measurable value: which plugin should collect it, the opaque
//! protocol parameters the plugin needs, and the caching/retry policy around it.

use std::collections::HashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn default_timeout() -> u64 { 30 }
fn default_retry_times() -> u32 { 3 }
fn default_retry_interval() -> u64 { 1000 }
fn default_cache_ttl() -> u64 { 60 }
fn default_priority() -> i32 { 5 }
fn default_enabled() -> bool { true }

/// Configuration for a single metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricConfig {
    pub metric_name: String,
    #[serde(default)]
    pub metric_type: String,
    /// Preferred plugin type; used when it supports the target device
    #[serde(default)]
    pub plugin_type: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    /// Protocol specific parameters, interpreted only by the plugin
    #[serde(default)]
    pub parameters: HashMap<String, Value>,
    /// Timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_retry_times")]
    pub retry_times: u32,
    /// Retry interval in milliseconds
    #[serde(default = "default_retry_interval")]
    pub retry_interval: u64,
    #[serde(default)]
    pub cache_enabled: bool,
    /// Cache lifetime in seconds
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl: u64,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    #[serde(default)]
    pub transform: Option<DataTransform>,
    #[serde(default)]
    pub thresholds: Option<ThresholdConfig>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl MetricConfig {
    pub fn new(metric_name: impl Into<String>, metric_type: impl Into<String>) -> Self {
        Self {
            metric_name: metric_name.into(),
            metric_type: metric_type.into(),
            plugin_type: None,
            display_name: None,
            unit: None,
            parameters: HashMap::new(),
            timeout: default_timeout(),
            retry_times: default_retry_times(),
            retry_interval: default_retry_interval(),
            cache_enabled: false,
            cache_ttl: default_cache_ttl(),
            priority: default_priority(),
            enabled: true,
            tags: HashMap::new(),
            transform: None,
            thresholds: None,
            dependencies: Vec::new(),
        }
    }

    pub fn with_plugin_type(mut self, plugin_type: impl Into<String>) -> Self {
        self.plugin_type = Some(plugin_type.into());
        self
    }

    pub fn with_cache(mut self, ttl_seconds: u64) -> Self {
        self.cache_enabled = true;
        self.cache_ttl = ttl_seconds;
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    pub fn parameter_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(Value::as_str)
    }

    pub fn parameter_u64(&self, key: &str) -> Option<u64> {
        self.parameters.get(key).and_then(Value::as_u64)
    }
}

/// Linear transform applied to a raw numeric reading
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataTransform {
    #[serde(default)]
    pub expression: Option<String>,
    #[serde(default)]
    pub multiplier: Option<f64>,
    #[serde(default)]
    pub offset: Option<f64>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub value_mapping: HashMap<String, Value>,
}

impl DataTransform {
    pub fn apply(&self, value: f64) -> f64 {
        value * self.multiplier.unwrap_or(1.0) + self.offset.unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComparisonOperator {
    #[default]
    GreaterThan,
    LessThan,
    Equals,
}

/// Warning / critical bounds for a metric value
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdConfig {
    #[serde(default)]
    pub warning_threshold: Option<f64>,
    #[serde(default)]
    pub critical_threshold: Option<f64>,
    #[serde(default)]
    pub min_value: Option<f64>,
    #[serde(default)]
    pub max_value: Option<f64>,
    #[serde(default)]
    pub operator: ComparisonOperator,
}

impl ThresholdConfig {
    fn breaches(&self, value: f64, limit: f64) -> bool {
        match self.operator {
            ComparisonOperator::GreaterThan => value > limit,
            ComparisonOperator::LessThan => value < limit,
            ComparisonOperator::Equals => (value - limit).abs() < f64::EPSILON,
        }
    }

    pub fn is_critical(&self, value: f64) -> bool {
        self.critical_threshold.is_some_and(|limit| self.breaches(value, limit))
    }

    pub fn is_warning(&self, value: f64) -> bool {
        self.warning_threshold.is_some_and(|limit| self.breaches(value, limit))
    }
}
