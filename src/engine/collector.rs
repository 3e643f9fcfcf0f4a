//! Collector Engine
//!
//! Runs collections against devices: picks an enabled plugin able to handle
//! the device, shields the caller from plugin panics, logs every attempt to
//! the log sink and persists successful metric values to the data sink.
//! Batches share one session id while each metric gets its own copy of the
//! context.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use futures::FutureExt;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::error::{EngineError, EngineResult};
use super::record::{CollectionData, CollectionLogEntry};
use super::sink::{DataSink, LogSink};
use super::statistics::{EngineStatistics, EngineStatisticsSnapshot};
use crate::model::context::generate_session_id;
use crate::model::{error_codes, CollectionContext, CollectionResult, Device, MetricConfig};
use crate::plugin::base::panic_message;
use crate::plugin::{CollectorPlugin, PluginHealthStatus, PluginRegistry, PluginStatistics};

/// Engine settings
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Concurrent collections per async batch
    pub max_concurrency: usize,
    pub cleanup_interval: Duration,
    pub log_retention_days: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 10,
            cleanup_interval: Duration::from_secs(60 * 60),
            log_retention_days: 30,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> EngineResult<()> {
        if self.max_concurrency == 0 {
            return Err(EngineError::configuration_error("max-concurrency must be at least 1"));
        }
        if self.cleanup_interval.is_zero() {
            return Err(EngineError::configuration_error("cleanup interval must be greater than zero"));
        }
        if self.log_retention_days <= 0 {
            return Err(EngineError::configuration_error("log retention must be at least one day"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginSummary {
    pub plugin_type: String,
    pub name: String,
    pub version: String,
    pub supported_protocols: Vec<String>,
    pub supported_metric_types: Vec<String>,
    pub health: PluginHealthStatus,
    pub statistics: PluginStatistics,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineReport {
    pub plugins: Vec<PluginSummary>,
    pub total_plugins: usize,
    pub executions: EngineStatisticsSnapshot,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionDataStatistics {
    pub total_count: u64,
    pub plugin_statistics: HashMap<String, u64>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub expired_data: usize,
    pub expired_logs: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineHealth {
    pub healthy: bool,
    pub issues: Vec<String>,
    pub active_collections: i64,
    pub success_rate: f64,
    pub check_time: DateTime<Utc>,
}

const ACTIVE_COLLECTION_WARNING: i64 = 100;
const MINIMUM_HEALTHY_SUCCESS_RATE: f64 = 80.0;

struct Maintenance {
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct CollectorEngine {
    registry: Arc<PluginRegistry>,
    data_sink: Arc<dyn DataSink>,
    log_sink: Arc<dyn LogSink>,
    statistics: EngineStatistics,
    dispatcher: Arc<Semaphore>,
    config: EngineConfig,
    maintenance: Mutex<Option<Maintenance>>,
}

impl CollectorEngine {
    pub fn new(
        registry: Arc<PluginRegistry>,
        data_sink: Arc<dyn DataSink>,
        log_sink: Arc<dyn LogSink>,
        config: EngineConfig,
    ) -> Self {
        Self {
            registry,
            data_sink,
            log_sink,
            statistics: EngineStatistics::new(),
            dispatcher: Arc::new(Semaphore::new(config.max_concurrency.max(1))),
            config,
            maintenance: Mutex::new(None),
        }
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The metric's plugin hint wins when it is enabled and supports the
    /// device; otherwise the first enabled supporting plugin by priority.
    pub fn select_plugin(&self, device: &Device, metric: &MetricConfig) -> Option<Arc<dyn CollectorPlugin>> {
        if let Some(hint) = metric.plugin_type.as_deref() {
            if self.registry.is_enabled(hint) {
                if let Some(plugin) = self.registry.get(hint).filter(|p| p.supports(&device.device_type)) {
                    return Some(plugin);
                }
            }
            debug!("Plugin hint {} not usable for device type {}", hint, device.device_type);
        }
        self.registry
            .get_enabled_for_device_type(&device.device_type)
            .into_iter()
            .next()
    }

    fn failure(
        device: &Device,
        metric: &MetricConfig,
        context: &CollectionContext,
        plugin_type: Option<&str>,
        code: &str,
        message: String,
    ) -> CollectionResult {
        let mut result = CollectionResult::failure(code, message);
        let now = Utc::now();
        result.set_timing(now, now);
        result.plugin_type = plugin_type.map(str::to_string);
        result.device_id = Some(device.id);
        result.metric_name = Some(metric.metric_name.clone());
        result.session_id = context.session_id.clone();
        result.task_id = context.task_id;
        result
    }

    /// Collect one metric. Never fails: every problem becomes a failed result.
    pub async fn execute_collection(&self, device: &Device, metric: &MetricConfig, context: &CollectionContext) -> CollectionResult {
        debug!("Starting collection: device={}, metric={}", device.id, metric.metric_name);
        let _active = self.statistics.begin();
        let started = Instant::now();

        let result = match self.select_plugin(device, metric) {
            None => {
                warn!("No plugin found: device={} ({}), metric={}", device.id, device.device_type, metric.metric_name);
                Self::failure(
                    device,
                    metric,
                    context,
                    None,
                    error_codes::NO_PLUGIN_FOUND,
                    format!("No suitable collector plugin for device type {}", device.device_type),
                )
            }
            Some(plugin) => match AssertUnwindSafe(plugin.collect(device, metric, context)).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    error!("Collection execution failed: device={}, metric={}: {}", device.id, metric.metric_name, message);
                    Self::failure(
                        device,
                        metric,
                        context,
                        Some(plugin.plugin_type()),
                        error_codes::EXECUTION_ERROR,
                        format!("Collection execution failed: {}", message),
                    )
                }
            },
        };

        self.record(device, metric, &result).await;
        self.statistics
            .finish(result.plugin_type.as_deref(), started.elapsed().as_millis() as u64, result.success);
        debug!(
            "Collection finished: device={}, metric={}, success={}",
            device.id, metric.metric_name, result.success
        );
        result
    }

    /// Log the attempt and persist successful values; sink failures are logged only
    async fn record(&self, device: &Device, metric: &MetricConfig, result: &CollectionResult) {
        let entry = CollectionLogEntry::from_result(device.id, &metric.metric_name, result);
        if let Err(e) = self.log_sink.log_collection(entry).await {
            warn!("Failed to write collection log: device={}, metric={}: {}", device.id, metric.metric_name, e);
        }

        if result.success && !result.metrics.is_empty() {
            let records = CollectionData::from_result(device.id, metric, result);
            let count = records.len();
            match self.data_sink.save(records).await {
                Ok(()) => debug!("Saved {} values: device={}, metric={}", count, device.id, metric.metric_name),
                Err(e) => error!("Failed to save collection data: device={}, metric={}: {}", device.id, metric.metric_name, e),
            }
        }
    }

    fn metric_context(context: &CollectionContext, session_id: &str) -> CollectionContext {
        let mut metric_context = context.clone();
        metric_context.session_id = Some(session_id.to_string());
        metric_context
    }

    /// Collect metrics one after another, in input order
    pub async fn execute_batch_collection(
        &self,
        device: &Device,
        metrics: &[MetricConfig],
        context: &CollectionContext,
    ) -> Vec<CollectionResult> {
        debug!("Starting batch collection: device={}, metrics={}", device.id, metrics.len());
        let session_id = context.session_id.clone().unwrap_or_else(generate_session_id);

        let mut results = Vec::with_capacity(metrics.len());
        for metric in metrics {
            let metric_context = Self::metric_context(context, &session_id);
            results.push(self.execute_collection(device, metric, &metric_context).await);
        }

        debug!(
            "Batch collection finished: device={}, total={}, successful={}",
            device.id,
            results.len(),
            results.iter().filter(|r| r.success).count()
        );
        results
    }

    /// Collect metrics concurrently, bounded by `max_concurrency`.
    ///
    /// Results are aligned with `metrics`. When the context has a deadline,
    /// collections still running at the deadline yield timeout results.
    pub async fn execute_batch_collection_async(
        &self,
        device: &Device,
        metrics: &[MetricConfig],
        context: &CollectionContext,
    ) -> Vec<CollectionResult> {
        debug!("Starting async batch collection: device={}, metrics={}", device.id, metrics.len());
        let session_id = context.session_id.clone().unwrap_or_else(generate_session_id);
        let deadline = context
            .remaining_time()
            .map(|remaining| tokio::time::Instant::now() + remaining);

        let collections = metrics.iter().map(|metric| {
            let metric_context = Self::metric_context(context, &session_id);
            let dispatcher = Arc::clone(&self.dispatcher);
            async move {
                let collection = async {
                    let _permit = dispatcher.acquire_owned().await.ok();
                    self.execute_collection(device, metric, &metric_context).await
                };
                let Some(deadline) = deadline else {
                    return collection.await;
                };
                match tokio::time::timeout_at(deadline, collection).await {
                    Ok(result) => result,
                    Err(_) => self.timed_out(device, metric, &metric_context).await,
                }
            }
        });

        join_all(collections).await
    }

    async fn timed_out(&self, device: &Device, metric: &MetricConfig, context: &CollectionContext) -> CollectionResult {
        warn!("Collection deadline passed: device={}, metric={}", device.id, metric.metric_name);
        let mut result = CollectionResult::timeout();
        let now = Utc::now();
        result.set_timing(now, now);
        result.device_id = Some(device.id);
        result.metric_name = Some(metric.metric_name.clone());
        result.session_id = context.session_id.clone();
        result.task_id = context.task_id;
        self.record(device, metric, &result).await;
        self.statistics.finish(None, 0, false);
        result
    }

    /// Delete persisted records past their expiry
    pub async fn cleanup_expired_data(&self) -> usize {
        match self.data_sink.delete_expired(Utc::now()).await {
            Ok(deleted) => {
                info!("Removed {} expired collection records", deleted);
                deleted
            }
            Err(e) => {
                error!("Failed to clean up expired data: {}", e);
                0
            }
        }
    }

    /// Expire data and old log entries
    pub async fn perform_scheduled_cleanup(&self) -> CleanupReport {
        debug!("Running scheduled cleanup");
        let expired_data = self.cleanup_expired_data().await;
        let cutoff = Utc::now() - chrono::Duration::days(self.config.log_retention_days);
        let expired_logs = match self.log_sink.cleanup_before(cutoff).await {
            Ok(count) => count,
            Err(e) => {
                error!("Failed to clean up collection logs: {}", e);
                0
            }
        };
        self.statistics.mark_cleanup();
        info!("Scheduled cleanup removed {} records and {} log entries", expired_data, expired_logs);
        CleanupReport { expired_data, expired_logs }
    }

    pub async fn get_engine_statistics(&self) -> EngineReport {
        let mut plugins = Vec::new();
        for plugin in self.registry.get_all() {
            let descriptor = plugin.descriptor();
            plugins.push(PluginSummary {
                plugin_type: descriptor.plugin_type.clone(),
                name: descriptor.name.clone(),
                version: descriptor.version.clone(),
                supported_protocols: descriptor.supported_protocols.clone(),
                supported_metric_types: descriptor.supported_metric_types.clone(),
                health: plugin.health_status().await,
                statistics: plugin.statistics(),
            });
        }
        plugins.sort_by(|a, b| a.plugin_type.cmp(&b.plugin_type));

        EngineReport {
            total_plugins: plugins.len(),
            plugins,
            executions: self.statistics.snapshot(),
            timestamp: Utc::now(),
        }
    }

    pub fn execution_statistics(&self) -> EngineStatisticsSnapshot {
        self.statistics.snapshot()
    }

    pub async fn get_collection_data_statistics(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> EngineResult<CollectionDataStatistics> {
        Ok(CollectionDataStatistics {
            total_count: self.data_sink.count_between(start, end).await?,
            plugin_statistics: self.data_sink.count_by_plugin_type(start, end).await?,
            start_time: start,
            end_time: end,
        })
    }

    pub fn reset_statistics(&self) {
        self.statistics.reset();
        info!("Engine statistics reset");
    }

    pub async fn perform_health_check(&self) -> EngineHealth {
        let mut healthy = true;
        let mut issues = Vec::new();

        for plugin in self.registry.get_all() {
            let status = plugin.health_status().await;
            if !status.is_healthy() {
                healthy = false;
                issues.push(format!("Plugin {} is {}: {}", plugin.plugin_type(), status.status, status.message));
            }
        }

        let active = self.statistics.active();
        if active > ACTIVE_COLLECTION_WARNING {
            issues.push(format!("Too many active collections: {}", active));
        }

        let success_rate = self.statistics.success_rate();
        if success_rate < MINIMUM_HEALTHY_SUCCESS_RATE {
            healthy = false;
            issues.push(format!("Collection success rate too low: {:.2}%", success_rate));
        }

        EngineHealth {
            healthy,
            issues,
            active_collections: active,
            success_rate,
            check_time: Utc::now(),
        }
    }

    /// Run `perform_scheduled_cleanup` every cleanup interval
    pub fn start_maintenance(self: &Arc<Self>) {
        let mut maintenance = self.maintenance.lock();
        if maintenance.is_some() {
            return;
        }

        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let engine: Weak<Self> = Arc::downgrade(self);
        let period = self.config.cleanup_interval;

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        let Some(engine) = engine.upgrade() else { break };
                        engine.perform_scheduled_cleanup().await;
                    }
                }
            }
        });

        *maintenance = Some(Maintenance { shutdown, handle });
        info!("Engine maintenance started (every {:?})", period);
    }

    pub async fn stop_maintenance(&self) {
        let maintenance = self.maintenance.lock().take();
        if let Some(maintenance) = maintenance {
            maintenance.shutdown.cancel();
            if maintenance.handle.await.is_err() {
                warn!("Engine maintenance task ended abnormally");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::sink::{MemoryDataSink, MemoryLogSink};
    use crate::model::CollectorConfig;
    use crate::plugin::tests::mock_plugins::{MockBehavior, MockDriver};
    use crate::plugin::{AvailableMetric, ConfigValidationResult, ConnectionTestResult, PluginDescriptor, PluginResult};
    use crate::plugin::compatibility::api_version;
    use async_trait::async_trait;
    use serde_json::Value;

    struct Harness {
        engine: Arc<CollectorEngine>,
        data: Arc<MemoryDataSink>,
        logs: Arc<MemoryLogSink>,
    }

    async fn harness(drivers: Vec<MockDriver>, config: EngineConfig) -> Harness {
        let registry = Arc::new(PluginRegistry::new());
        for driver in drivers {
            let plugin = driver.into_plugin();
            plugin
                .initialize(CollectorConfig::for_plugin(plugin.plugin_type().to_string()))
                .await
                .unwrap();
            registry.register(plugin).await.unwrap();
        }
        let data = Arc::new(MemoryDataSink::new());
        let logs = Arc::new(MemoryLogSink::new());
        let engine = Arc::new(CollectorEngine::new(registry, data.clone(), logs.clone(), config));
        Harness { engine, data, logs }
    }

    fn router() -> Device {
        Device::new(7, "edge", "router", "192.0.2.1")
    }

    /// A plugin that panics outside any managed wrapper
    struct RawPanickingPlugin {
        descriptor: PluginDescriptor,
    }

    impl RawPanickingPlugin {
        fn new() -> Self {
            Self {
                descriptor: PluginDescriptor::new("raw", "Raw", "1.0.0", api_version()).with_device_types(["router"]),
            }
        }
    }

    #[async_trait]
    impl CollectorPlugin for RawPanickingPlugin {
        fn descriptor(&self) -> &PluginDescriptor {
            &self.descriptor
        }

        async fn initialize(&self, _config: CollectorConfig) -> PluginResult<()> {
            Ok(())
        }

        async fn destroy(&self) -> PluginResult<()> {
            Ok(())
        }

        async fn collect(&self, _device: &Device, metric: &MetricConfig, _context: &CollectionContext) -> CollectionResult {
            panic!("raw plugin exploded on {}", metric.metric_name)
        }

        async fn collect_batch(&self, _device: &Device, _metrics: &[MetricConfig], _context: &CollectionContext) -> Vec<CollectionResult> {
            Vec::new()
        }

        async fn health_status(&self) -> PluginHealthStatus {
            PluginHealthStatus::healthy("ok")
        }

        fn statistics(&self) -> PluginStatistics {
            PluginStatistics::default()
        }

        async fn test_connection(&self, _device: &Device, _context: &CollectionContext) -> ConnectionTestResult {
            ConnectionTestResult::success("ok", 0)
        }

        async fn discover_metrics(&self, _device: &Device, _context: &CollectionContext) -> Vec<AvailableMetric> {
            Vec::new()
        }

        fn validate_config(&self, _metric: &MetricConfig) -> ConfigValidationResult {
            ConfigValidationResult::success("ok")
        }

        fn config_template(&self) -> HashMap<String, Value> {
            HashMap::new()
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(EngineConfig::default().validate().is_ok());
        let config = EngineConfig { max_concurrency: 0, ..EngineConfig::default() };
        assert!(config.validate().unwrap_err().is_configuration_error());
        let config = EngineConfig { log_retention_days: 0, ..EngineConfig::default() };
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_successful_collection_is_logged_and_persisted() {
        let h = harness(vec![MockDriver::new("snmp")], EngineConfig::default()).await;
        let context = CollectionContext::for_task(11);

        let result = h.engine.execute_collection(&router(), &MetricConfig::new("cpu", "gauge"), &context).await;

        assert!(result.success);
        assert_eq!(result.plugin_type.as_deref(), Some("snmp"));
        assert_eq!(result.task_id, Some(11));
        assert_eq!(h.logs.len(), 1);
        // mock reports value, device and source
        assert_eq!(h.data.len(), 3);
        assert!(h.data.records().iter().all(|r| r.task_id == Some(11) && r.device_id == 7));

        let stats = h.engine.execution_statistics();
        assert_eq!(stats.total_collections, 1);
        assert_eq!(stats.successful_collections, 1);
        assert_eq!(stats.active_collections, 0);
    }

    #[tokio::test]
    async fn test_no_plugin_for_device_type() {
        let h = harness(vec![MockDriver::new("snmp")], EngineConfig::default()).await;
        let printer = Device::new(3, "lobby", "printer", "192.0.2.9");
        let mut context = CollectionContext::create_default();
        context.session_id = Some("session-1".to_string());

        let result = h.engine.execute_collection(&printer, &MetricConfig::new("pages", "gauge"), &context).await;

        assert!(!result.success);
        assert_eq!(result.error_code(), Some(error_codes::NO_PLUGIN_FOUND));
        assert_eq!(result.device_id, Some(3));
        assert_eq!(result.metric_name.as_deref(), Some("pages"));
        assert_eq!(result.session_id.as_deref(), Some("session-1"));
        assert!(result.plugin_type.is_none());
        assert_eq!(h.logs.len(), 1);
        assert!(h.data.is_empty());
        assert_eq!(h.engine.execution_statistics().failed_collections, 1);
    }

    #[tokio::test]
    async fn test_plugin_hint_and_priority_selection() {
        let h = harness(
            vec![
                MockDriver::new("fast").with_priority(1),
                MockDriver::new("slow").with_priority(9),
            ],
            EngineConfig::default(),
        )
        .await;
        let device = router();

        let chosen = h.engine.select_plugin(&device, &MetricConfig::new("cpu", "gauge")).unwrap();
        assert_eq!(chosen.plugin_type(), "fast");

        let hinted = MetricConfig::new("cpu", "gauge").with_plugin_type("slow");
        assert_eq!(h.engine.select_plugin(&device, &hinted).unwrap().plugin_type(), "slow");

        h.engine.registry().disable("slow").unwrap();
        assert_eq!(h.engine.select_plugin(&device, &hinted).unwrap().plugin_type(), "fast");

        let unknown = MetricConfig::new("cpu", "gauge").with_plugin_type("missing");
        assert_eq!(h.engine.select_plugin(&device, &unknown).unwrap().plugin_type(), "fast");
    }

    #[tokio::test]
    async fn test_raw_plugin_panic_is_contained() {
        let h = harness(Vec::new(), EngineConfig::default()).await;
        h.engine.registry().register(Arc::new(RawPanickingPlugin::new())).await.unwrap();

        let result = h
            .engine
            .execute_collection(&router(), &MetricConfig::new("cpu", "gauge"), &CollectionContext::create_default())
            .await;

        assert!(!result.success);
        assert_eq!(result.error_code(), Some(error_codes::EXECUTION_ERROR));
        assert_eq!(result.plugin_type.as_deref(), Some("raw"));
        assert!(result.error_message.unwrap().contains("raw plugin exploded"));
        assert_eq!(h.engine.execution_statistics().active_collections, 0);
    }

    #[tokio::test]
    async fn test_batch_shares_session_and_preserves_order() {
        let h = harness(vec![MockDriver::new("snmp")], EngineConfig::default()).await;
        let metrics = vec![
            MetricConfig::new("a", "gauge"),
            MetricConfig::new("b", "gauge").with_plugin_type("nothing"),
            MetricConfig::new("c", "gauge"),
        ];

        let results = h
            .engine
            .execute_batch_collection(&router(), &metrics, &CollectionContext::create_default())
            .await;

        assert_eq!(results.len(), 3);
        let names: Vec<_> = results.iter().map(|r| r.metric_name.clone().unwrap()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        let session = results[0].session_id.clone();
        assert!(session.is_some());
        assert!(results.iter().all(|r| r.session_id == session));
    }

    #[tokio::test]
    async fn test_async_batch_with_failing_plugin() {
        let h = harness(
            vec![MockDriver::new("snmp").with_behavior(MockBehavior::Fail)],
            EngineConfig::default(),
        )
        .await;
        let metrics: Vec<_> = ["a", "b", "c", "d"].iter().map(|m| MetricConfig::new(*m, "gauge")).collect();

        let results = h
            .engine
            .execute_batch_collection_async(&router(), &metrics, &CollectionContext::create_default())
            .await;

        assert_eq!(results.len(), 4);
        assert!(results.iter().all(|r| !r.success));
        assert_eq!(results[3].metric_name.as_deref(), Some("d"));
        assert!(h.data.is_empty());
        assert_eq!(h.logs.len(), 4);
        assert_eq!(h.engine.execution_statistics().success_rate, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_async_batch_deadline_yields_timeouts() {
        let h = harness(
            vec![MockDriver::new("snmp").with_behavior(MockBehavior::Delay(Duration::from_secs(30)))],
            EngineConfig::default(),
        )
        .await;
        let metrics = vec![MetricConfig::new("a", "gauge"), MetricConfig::new("b", "gauge")];
        let context = CollectionContext::for_task(5).with_deadline(Duration::from_secs(2));

        let results = h.engine.execute_batch_collection_async(&router(), &metrics, &context).await;

        assert_eq!(results.len(), 2);
        for result in &results {
            assert_eq!(result.status, crate::model::CollectionStatus::Timeout);
            assert_eq!(result.task_id, Some(5));
        }
        let stats = h.engine.execution_statistics();
        assert_eq!(stats.failed_collections, 2);
        assert_eq!(stats.active_collections, 0);
    }

    #[tokio::test]
    async fn test_cleanup_and_data_statistics() {
        let h = harness(vec![MockDriver::new("snmp")], EngineConfig::default()).await;
        h.engine
            .execute_collection(&router(), &MetricConfig::new("cpu", "gauge"), &CollectionContext::create_default())
            .await;

        let start = Utc::now() - chrono::Duration::hours(1);
        let end = Utc::now() + chrono::Duration::hours(1);
        let stats = h.engine.get_collection_data_statistics(start, end).await.unwrap();
        assert_eq!(stats.total_count, 3);
        assert_eq!(stats.plugin_statistics.get("snmp"), Some(&3));

        let report = h.engine.perform_scheduled_cleanup().await;
        assert_eq!(report, CleanupReport::default());
        assert!(h.engine.execution_statistics().last_cleanup_time.is_some());
    }

    #[tokio::test]
    async fn test_health_and_report() {
        let h = harness(
            vec![MockDriver::new("snmp").with_behavior(MockBehavior::Fail)],
            EngineConfig::default(),
        )
        .await;
        let health = h.engine.perform_health_check().await;
        assert!(health.healthy);
        assert_eq!(health.success_rate, 100.0);

        for _ in 0..3 {
            h.engine
                .execute_collection(&router(), &MetricConfig::new("cpu", "gauge"), &CollectionContext::create_default())
                .await;
        }
        let health = h.engine.perform_health_check().await;
        assert!(!health.healthy);
        assert!(health.issues.iter().any(|i| i.contains("success rate")));

        let report = h.engine.get_engine_statistics().await;
        assert_eq!(report.total_plugins, 1);
        assert_eq!(report.plugins[0].plugin_type, "snmp");
        assert_eq!(report.executions.failed_collections, 3);

        h.engine.reset_statistics();
        assert!(h.engine.perform_health_check().await.healthy);
    }

    #[tokio::test(start_paused = true)]
    async fn test_maintenance_runs_cleanup() {
        let config = EngineConfig { cleanup_interval: Duration::from_secs(60), ..EngineConfig::default() };
        let h = harness(Vec::new(), config).await;
        h.engine.start_maintenance();

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(h.engine.execution_statistics().last_cleanup_time.is_some());

        h.engine.stop_maintenance().await;
    }
}
