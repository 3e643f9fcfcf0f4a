//! Collector plugin configuration supplied at initialize time.

use std::collections::HashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CollectorConfig {
    pub name: String,
    pub description: Option<String>,
    pub plugin_type: String,
    pub plugin_version: Option<String>,
    pub global_parameters: HashMap<String, Value>,
    pub connection_config: ConnectionConfig,
    pub performance_config: PerformanceConfig,
    pub security_config: SecurityConfig,
    pub retry_config: RetryConfig,
    pub cache_config: CacheConfig,
    pub monitoring_config: MonitoringConfig,
    pub logging_config: LoggingConfig,
    pub extension_config: HashMap<String, Value>,
    pub enabled: bool,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: None,
            plugin_type: String::new(),
            plugin_version: None,
            global_parameters: HashMap::new(),
            connection_config: ConnectionConfig::default(),
            performance_config: PerformanceConfig::default(),
            security_config: SecurityConfig::default(),
            retry_config: RetryConfig::default(),
            cache_config: CacheConfig::default(),
            monitoring_config: MonitoringConfig::default(),
            logging_config: LoggingConfig::default(),
            extension_config: HashMap::new(),
            enabled: true,
        }
    }
}

impl CollectorConfig {
    /// Default configuration for a plugin type, used when none was supplied
    pub fn for_plugin(plugin_type: impl Into<String>) -> Self {
        let plugin_type = plugin_type.into();
        Self {
            name: format!("{}-default", plugin_type),
            plugin_type,
            ..Default::default()
        }
    }

    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_config.enabled = enabled;
        self
    }
}

/// Connection settings; times are in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionConfig {
    pub connect_timeout: u64,
    pub read_timeout: u64,
    pub max_connections: u32,
    pub pool_size: u32,
    pub keep_alive_time: u64,
    pub reuse_connection: bool,
    pub validation_interval: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: 5000,
            read_timeout: 30_000,
            max_connections: 10,
            pool_size: 5,
            keep_alive_time: 60_000,
            reuse_connection: true,
            validation_interval: 30_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PerformanceConfig {
    pub max_concurrency: u32,
    pub queue_size: u32,
    pub batch_size: u32,
    pub batch_timeout: u64,
    pub batch_enabled: bool,
    /// Megabytes
    pub memory_limit: u32,
    /// Percent
    pub cpu_limit: u32,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 5,
            queue_size: 100,
            batch_size: 10,
            batch_timeout: 5000,
            batch_enabled: false,
            memory_limit: 256,
            cpu_limit: 80,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SecurityConfig {
    pub ssl_enabled: bool,
    pub ssl_version: String,
    pub trust_store_path: Option<String>,
    pub client_cert_path: Option<String>,
    pub client_key_path: Option<String>,
    pub hostname_verification: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            ssl_enabled: false,
            ssl_version: "TLSv1.2".to_string(),
            trust_store_path: None,
            client_cert_path: None,
            client_key_path: None,
            hostname_verification: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RetryStrategy {
    FixedInterval,
    #[default]
    ExponentialBackoff,
    Linear,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryConfig {
    pub default_retry_times: u32,
    pub retry_interval: u64,
    pub retry_strategy: RetryStrategy,
    pub max_retry_interval: u64,
    pub backoff_multiplier: f64,
    pub retryable_errors: Vec<String>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            default_retry_times: 3,
            retry_interval: 1000,
            retry_strategy: RetryStrategy::ExponentialBackoff,
            max_retry_interval: 60_000,
            backoff_multiplier: 2.0,
            retryable_errors: Vec::new(),
        }
    }
}

/// Plugin level cache switch; metrics opt in individually as well
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Seconds
    pub default_ttl: u64,
    pub max_cache_size: usize,
    /// Seconds
    pub cleanup_interval: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            default_ttl: 300,
            max_cache_size: 1000,
            cleanup_interval: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MonitoringConfig {
    pub metrics_enabled: bool,
    pub health_check_enabled: bool,
    /// Seconds
    pub health_check_interval: u64,
    /// Seconds
    pub statistics_interval: u64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            health_check_enabled: true,
            health_check_interval: 60,
            statistics_interval: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingConfig {
    pub log_level: String,
    pub verbose_logging: bool,
    pub log_raw_data: bool,
    pub log_retention_days: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            verbose_logging: false,
            log_raw_data: false,
            log_retention_days: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: CollectorConfig =
            serde_json::from_str(r#"{"pluginType":"tcp","cacheConfig":{"enabled":true}}"#).unwrap();
        assert_eq!(config.plugin_type, "tcp");
        assert!(config.cache_config.enabled);
        assert_eq!(config.cache_config.default_ttl, 300);
        assert_eq!(config.connection_config.connect_timeout, 5000);
        assert!(config.enabled);
    }

    #[test]
    fn test_for_plugin() {
        let config = CollectorConfig::for_plugin("snmp");
        assert_eq!(config.plugin_type, "snmp");
        assert!(!config.cache_config.enabled);
        assert!(config.with_cache_enabled(true).cache_config.enabled);
    }
}
