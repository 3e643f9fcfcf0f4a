//! Core Plugin Traits
//!
//! The contract every collector plugin fulfils, plus the descriptor and
//! report types exchanged across it. Concrete plugins normally implement
//! [`CollectorDriver`](super::base::CollectorDriver) and are wrapped in a
//! [`ManagedCollector`](super::base::ManagedCollector), which supplies the
//! shared caching, statistics and initialize/destroy guards.

use std::collections::HashMap;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use super::error::PluginResult;
use super::statistics::PluginStatistics;
use crate::model::{CollectionContext, CollectionResult, CollectorConfig, Device, MetricConfig};

/// Core interface for collector plugins
#[async_trait]
pub trait CollectorPlugin: Send + Sync {
    /// Get plugin identity and capabilities
    fn descriptor(&self) -> &PluginDescriptor;

    fn plugin_type(&self) -> &str {
        &self.descriptor().plugin_type
    }

    fn name(&self) -> &str {
        &self.descriptor().name
    }

    fn version(&self) -> &str {
        &self.descriptor().version
    }

    /// Lower values start earlier and stop later
    fn priority(&self) -> i32 {
        self.descriptor().priority
    }

    /// Whether this plugin can collect from the given device type
    fn supports(&self, device_type: &str) -> bool {
        self.descriptor().supports_device_type(device_type)
    }

    fn supports_protocol(&self, protocol: &str) -> bool {
        self.descriptor().supports_protocol(protocol)
    }

    fn supports_concurrent_collection(&self) -> bool {
        self.descriptor().supports_concurrent
    }

    fn recommended_concurrency(&self) -> usize {
        self.descriptor().recommended_concurrency
    }

    async fn initialize(&self, config: CollectorConfig) -> PluginResult<()>;

    async fn destroy(&self) -> PluginResult<()>;

    /// Collect one metric. Failures are reported in the result, never as a panic or error.
    async fn collect(&self, device: &Device, metric: &MetricConfig, context: &CollectionContext) -> CollectionResult;

    /// Collect several metrics from one device, sequentially
    async fn collect_batch(&self, device: &Device, metrics: &[MetricConfig], context: &CollectionContext) -> Vec<CollectionResult>;

    async fn health_status(&self) -> PluginHealthStatus;

    fn statistics(&self) -> PluginStatistics;

    async fn test_connection(&self, device: &Device, context: &CollectionContext) -> ConnectionTestResult;

    async fn discover_metrics(&self, device: &Device, context: &CollectionContext) -> Vec<AvailableMetric>;

    fn validate_config(&self, metric: &MetricConfig) -> ConfigValidationResult;

    fn config_template(&self) -> HashMap<String, Value>;
}

fn default_priority() -> i32 { 5 }
fn default_concurrency() -> usize { 5 }
fn default_true() -> bool { true }

/// Plugin metadata and capabilities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginDescriptor {
    /// Unique registry key
    pub plugin_type: String,
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    /// API version this plugin targets (YYYYMMDD)
    pub api_version: u32,
    #[serde(default)]
    pub supported_device_types: Vec<String>,
    #[serde(default)]
    pub supported_protocols: Vec<String>,
    #[serde(default)]
    pub supported_metric_types: Vec<String>,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default = "default_true")]
    pub supports_concurrent: bool,
    #[serde(default = "default_concurrency")]
    pub recommended_concurrency: usize,
}

impl PluginDescriptor {
    pub fn new(plugin_type: impl Into<String>, name: impl Into<String>, version: impl Into<String>, api_version: u32) -> Self {
        Self {
            plugin_type: plugin_type.into(),
            name: name.into(),
            version: version.into(),
            description: String::new(),
            api_version,
            supported_device_types: Vec::new(),
            supported_protocols: Vec::new(),
            supported_metric_types: Vec::new(),
            priority: default_priority(),
            supports_concurrent: true,
            recommended_concurrency: default_concurrency(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_device_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported_device_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_protocols<I, S>(mut self, protocols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported_protocols = protocols.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_metric_types<I, S>(mut self, metric_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported_metric_types = metric_types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Device type match is case-insensitive; `*` matches every device type
    pub fn supports_device_type(&self, device_type: &str) -> bool {
        self.supported_device_types
            .iter()
            .any(|t| t == "*" || t.eq_ignore_ascii_case(device_type))
    }

    pub fn supports_protocol(&self, protocol: &str) -> bool {
        self.supported_protocols
            .iter()
            .any(|p| p.eq_ignore_ascii_case(protocol))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    Unknown,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HealthStatus::Healthy => "HEALTHY",
            HealthStatus::Degraded => "DEGRADED",
            HealthStatus::Unhealthy => "UNHEALTHY",
            HealthStatus::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Health report returned by a plugin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginHealthStatus {
    pub status: HealthStatus,
    pub message: String,
    pub details: Option<String>,
    pub check_time: DateTime<Utc>,
    pub last_success_time: Option<DateTime<Utc>>,
    pub last_failure_time: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    /// Milliseconds
    pub response_time: u64,
    pub metrics: HashMap<String, Value>,
}

impl PluginHealthStatus {
    fn with_status(status: HealthStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
            check_time: Utc::now(),
            last_success_time: None,
            last_failure_time: None,
            consecutive_failures: 0,
            response_time: 0,
            metrics: HashMap::new(),
        }
    }

    pub fn healthy(message: impl Into<String>) -> Self {
        let mut status = Self::with_status(HealthStatus::Healthy, message);
        status.last_success_time = Some(status.check_time);
        status
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::with_status(HealthStatus::Degraded, message)
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        let mut status = Self::with_status(HealthStatus::Unhealthy, message);
        status.last_failure_time = Some(status.check_time);
        status.consecutive_failures = 1;
        status
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::with_status(HealthStatus::Unknown, message)
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

/// Outcome of a plugin connectivity probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionTestResult {
    pub success: bool,
    pub message: String,
    pub error_code: Option<String>,
    /// Milliseconds
    pub response_time: u64,
    pub test_time: DateTime<Utc>,
    pub details: HashMap<String, Value>,
}

impl ConnectionTestResult {
    pub fn success(message: impl Into<String>, response_time: u64) -> Self {
        Self {
            success: true,
            message: message.into(),
            error_code: None,
            response_time,
            test_time: Utc::now(),
            details: HashMap::new(),
        }
    }

    pub fn failure(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            error_code: Some(code.into()),
            response_time: 0,
            test_time: Utc::now(),
            details: HashMap::new(),
        }
    }
}

/// A metric a plugin reports as collectable from a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableMetric {
    pub metric_name: String,
    pub metric_type: String,
    pub description: String,
    pub unit: Option<String>,
    pub parameters: HashMap<String, Value>,
}

impl AvailableMetric {
    pub fn new(metric_name: impl Into<String>, metric_type: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            metric_name: metric_name.into(),
            metric_type: metric_type.into(),
            description: description.into(),
            unit: None,
            parameters: HashMap::new(),
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

/// Result of validating a metric configuration against a plugin
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigValidationResult {
    pub valid: bool,
    pub message: String,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ConfigValidationResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            valid: true,
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            valid: false,
            errors: vec![message.clone()],
            message,
            ..Default::default()
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_matching() {
        let descriptor = PluginDescriptor::new("snmp", "SNMP Collector", "1.0.0", 20250727)
            .with_device_types(["router", "Switch"])
            .with_protocols(["udp"]);

        assert!(descriptor.supports_device_type("ROUTER"));
        assert!(descriptor.supports_device_type("switch"));
        assert!(!descriptor.supports_device_type("server"));
        assert!(descriptor.supports_protocol("udp"));
        assert!(!descriptor.supports_protocol("tcp"));
        assert_eq!(descriptor.priority, 5);
        assert_eq!(descriptor.recommended_concurrency, 5);
    }

    #[test]
    fn test_wildcard_device_type() {
        let descriptor = PluginDescriptor::new("ping", "Ping", "1.0.0", 20250727).with_device_types(["*"]);
        assert!(descriptor.supports_device_type("anything"));
    }

    #[test]
    fn test_health_constructors() {
        assert!(PluginHealthStatus::healthy("ok").is_healthy());
        let unhealthy = PluginHealthStatus::unhealthy("down");
        assert_eq!(unhealthy.status, HealthStatus::Unhealthy);
        assert_eq!(unhealthy.consecutive_failures, 1);
        assert!(unhealthy.last_failure_time.is_some());
    }

    #[test]
    fn test_validation_result() {
        let failure = ConfigValidationResult::failure("metricName is required");
        assert!(!failure.valid);
        assert_eq!(failure.errors, vec!["metricName is required".to_string()]);
        assert!(ConfigValidationResult::success("ok").with_warning("unused key").valid);
    }
}
