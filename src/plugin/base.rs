//! Collector Plugin Base
//!
//! Concrete plugins implement the small [`CollectorDriver`] trait and are
//! wrapped in a [`ManagedCollector`], which implements the full
//! [`CollectorPlugin`] contract around the driver:
//!
//! - `collect` is rejected with a structured failure before initialize or after destroy
//! - results are served from the per-plugin cache when both the metric and
//!   the plugin configuration enable caching
//! - every driver call is stamped with timing and identity, counted in the
//!   rolling statistics, and shielded from driver errors and panics

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use async_trait::async_trait;
use chrono::Utc;
use futures::FutureExt;
use log::{debug, error, info, warn};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use super::cache::{CacheKey, ResultCache};
use super::error::{PluginError, PluginResult};
use super::statistics::PluginStatistics;
use super::traits::{
    AvailableMetric, CollectorPlugin, ConfigValidationResult, ConnectionTestResult, PluginDescriptor,
    PluginHealthStatus,
};
use crate::model::{error_codes, CollectionContext, CollectionResult, CollectorConfig, Device, MetricConfig};

/// Protocol specific behaviour supplied by each concrete plugin
#[async_trait]
pub trait CollectorDriver: Send + Sync + 'static {
    fn descriptor(&self) -> PluginDescriptor;

    async fn on_initialize(&self, _config: &CollectorConfig) -> PluginResult<()> {
        Ok(())
    }

    async fn on_destroy(&self) -> PluginResult<()> {
        Ok(())
    }

    async fn do_collect(
        &self,
        device: &Device,
        metric: &MetricConfig,
        context: &CollectionContext,
    ) -> PluginResult<CollectionResult>;

    /// Only called once the plugin is initialized and not destroyed
    async fn do_health_check(&self) -> PluginResult<PluginHealthStatus> {
        Ok(PluginHealthStatus::healthy("Plugin is running normally"))
    }

    async fn do_test_connection(&self, _device: &Device, _context: &CollectionContext) -> PluginResult<ConnectionTestResult> {
        Ok(ConnectionTestResult::success("Connection test passed", 0))
    }

    async fn do_discover_metrics(&self, _device: &Device, _context: &CollectionContext) -> PluginResult<Vec<AvailableMetric>> {
        Ok(Vec::new())
    }

    fn do_validate_config(&self, _metric: &MetricConfig) -> ConfigValidationResult {
        ConfigValidationResult::success("Configuration is valid")
    }

    /// Add plugin specific keys to the default configuration template
    fn extend_config_template(&self, _template: &mut HashMap<String, Value>) {}
}

/// Wraps a [`CollectorDriver`] with the shared plugin behaviour
pub struct ManagedCollector<D: CollectorDriver> {
    driver: D,
    descriptor: PluginDescriptor,
    config: RwLock<Option<CollectorConfig>>,
    initialized: AtomicBool,
    destroyed: AtomicBool,
    cache: ResultCache,
    statistics: Mutex<PluginStatistics>,
    last_health: Mutex<Option<PluginHealthStatus>>,
}

impl<D: CollectorDriver> ManagedCollector<D> {
    pub fn new(driver: D) -> Self {
        let descriptor = driver.descriptor();
        Self {
            driver,
            descriptor,
            config: RwLock::new(None),
            initialized: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
            cache: ResultCache::new(),
            statistics: Mutex::new(PluginStatistics::default()),
            last_health: Mutex::new(None),
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn config(&self) -> Option<CollectorConfig> {
        self.config.read().clone()
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    pub fn reset_statistics(&self) {
        self.statistics.lock().reset();
    }

    fn cache_applies(&self, metric: &MetricConfig) -> bool {
        metric.cache_enabled
            && self.config.read().as_ref().is_some_and(|c| c.cache_config.enabled)
    }

    fn record(&self, result: &CollectionResult) {
        let mut stats = self.statistics.lock();
        if result.success {
            stats.record_success(result.duration);
        } else {
            stats.record_failure(result.duration, result.error_code());
        }
    }

    /// Remember the latest report, carrying the failure streak across checks
    fn remember_health(&self, mut status: PluginHealthStatus) -> PluginHealthStatus {
        let mut last = self.last_health.lock();
        if let Some(previous) = last.as_ref() {
            if status.is_healthy() {
                status.last_failure_time = status.last_failure_time.or(previous.last_failure_time);
            } else {
                status.consecutive_failures = previous.consecutive_failures + 1;
                status.last_success_time = status.last_success_time.or(previous.last_success_time);
            }
        }
        *last = Some(status.clone());
        status
    }
}

#[async_trait]
impl<D: CollectorDriver> CollectorPlugin for ManagedCollector<D> {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    async fn initialize(&self, config: CollectorConfig) -> PluginResult<()> {
        let plugin_type = &self.descriptor.plugin_type;
        if self.is_destroyed() {
            return Err(PluginError::plugin_destroyed(plugin_type));
        }
        if self.is_initialized() {
            return Err(PluginError::already_initialized(plugin_type));
        }

        *self.config.write() = Some(config.clone());
        match self.driver.on_initialize(&config).await {
            Ok(()) => {
                self.initialized.store(true, Ordering::SeqCst);
                info!("Plugin {} initialized", plugin_type);
                Ok(())
            }
            Err(e) => {
                *self.config.write() = None;
                error!("Plugin {} failed to initialize: {}", plugin_type, e);
                Err(PluginError::initialization_failed(plugin_type.clone(), e.to_string()))
            }
        }
    }

    async fn destroy(&self) -> PluginResult<()> {
        let plugin_type = &self.descriptor.plugin_type;
        if self.is_destroyed() {
            warn!("Plugin {} already destroyed", plugin_type);
            return Ok(());
        }

        if let Err(e) = self.driver.on_destroy().await {
            error!("Plugin {} failed to destroy: {}", plugin_type, e);
            return Err(e);
        }

        self.destroyed.store(true, Ordering::SeqCst);
        self.initialized.store(false, Ordering::SeqCst);
        self.cache.clear();
        info!("Plugin {} destroyed", plugin_type);
        Ok(())
    }

    async fn collect(&self, device: &Device, metric: &MetricConfig, context: &CollectionContext) -> CollectionResult {
        if self.is_destroyed() {
            return CollectionResult::failure(error_codes::PLUGIN_DESTROYED, "Plugin has been destroyed");
        }
        if !self.is_initialized() {
            return CollectionResult::failure(error_codes::PLUGIN_NOT_INITIALIZED, "Plugin is not initialized");
        }

        let use_cache = self.cache_applies(metric);
        let key = CacheKey::new(self.descriptor.plugin_type.clone(), device.id, metric.metric_name.clone());
        if use_cache {
            if let Some(cached) = self.cache.get(&key) {
                debug!("Cache hit for {}", key);
                return cached;
            }
        }

        let started = Utc::now();
        let outcome = AssertUnwindSafe(self.driver.do_collect(device, metric, context))
            .catch_unwind()
            .await;
        let mut result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                error!("Collection failed: device={}, metric={}: {}", device.id, metric.metric_name, e);
                CollectionResult::failure(error_codes::COLLECTION_ERROR, format!("Collection failed: {}", e))
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!("Collection panicked: device={}, metric={}: {}", device.id, metric.metric_name, message);
                CollectionResult::failure(error_codes::COLLECTION_ERROR, format!("Collection panicked: {}", message))
            }
        };

        result.set_timing(started, Utc::now());
        result.plugin_type = Some(self.descriptor.plugin_type.clone());
        result.device_id = Some(device.id);
        result.metric_name = Some(metric.metric_name.clone());
        result.session_id = context.session_id.clone();
        result.task_id = context.task_id;
        result.retry_count = context.current_retry;

        self.record(&result);

        if result.success && use_cache {
            self.cache.put(key, result.clone(), Duration::from_secs(metric.cache_ttl));
        }

        result
    }

    async fn collect_batch(&self, device: &Device, metrics: &[MetricConfig], context: &CollectionContext) -> Vec<CollectionResult> {
        let mut results = Vec::with_capacity(metrics.len());
        for metric in metrics {
            let result = self.collect(device, metric, context).await;
            let failed = !result.success;
            results.push(result);
            if context.test_mode && failed {
                break;
            }
        }
        results
    }

    async fn health_status(&self) -> PluginHealthStatus {
        let status = if self.is_destroyed() {
            PluginHealthStatus::unhealthy("Plugin has been destroyed")
        } else if !self.is_initialized() {
            PluginHealthStatus::unhealthy("Plugin is not initialized")
        } else {
            match AssertUnwindSafe(self.driver.do_health_check()).catch_unwind().await {
                Ok(Ok(status)) => status,
                Ok(Err(e)) => PluginHealthStatus::unhealthy(format!("Health check failed: {}", e)),
                Err(panic) => PluginHealthStatus::unhealthy(format!("Health check panicked: {}", panic_message(panic.as_ref()))),
            }
        };
        self.remember_health(status)
    }

    fn statistics(&self) -> PluginStatistics {
        self.statistics.lock().clone()
    }

    async fn test_connection(&self, device: &Device, context: &CollectionContext) -> ConnectionTestResult {
        let started = std::time::Instant::now();
        match AssertUnwindSafe(self.driver.do_test_connection(device, context)).catch_unwind().await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                error!("Connection test failed: device={}: {}", device.id, e);
                let mut result = ConnectionTestResult::failure("CONNECTION_TEST_ERROR", e.to_string());
                result.response_time = started.elapsed().as_millis() as u64;
                result
            }
            Err(panic) => ConnectionTestResult::failure("CONNECTION_TEST_ERROR", panic_message(panic.as_ref())),
        }
    }

    async fn discover_metrics(&self, device: &Device, context: &CollectionContext) -> Vec<AvailableMetric> {
        match self.driver.do_discover_metrics(device, context).await {
            Ok(metrics) => metrics,
            Err(e) => {
                error!("Metric discovery failed: device={}: {}", device.id, e);
                Vec::new()
            }
        }
    }

    fn validate_config(&self, metric: &MetricConfig) -> ConfigValidationResult {
        if metric.metric_name.trim().is_empty() {
            return ConfigValidationResult::failure("metricName must not be empty");
        }
        self.driver.do_validate_config(metric)
    }

    fn config_template(&self) -> HashMap<String, Value> {
        let mut template = HashMap::new();
        template.insert("pluginType".to_string(), Value::from(self.descriptor.plugin_type.clone()));
        template.insert("timeout".to_string(), Value::from(30));
        template.insert("retryTimes".to_string(), Value::from(3));
        template.insert("retryInterval".to_string(), Value::from(1000));
        template.insert("cacheEnabled".to_string(), Value::from(false));
        template.insert("cacheTtl".to_string(), Value::from(60));
        self.driver.extend_config_template(&mut template);
        template
    }
}

/// Best-effort text of a caught panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
