//! Shared drivers and wiring for the integration suites

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use serde_json::Value;

use devcollect::engine::{CollectorEngine, EngineConfig, MemoryDataSink, MemoryLogSink};
use devcollect::model::{CollectionContext, CollectionResult, CollectorConfig, Device, MetricConfig};
use devcollect::plugin::{
    api_version, CollectorDriver, CollectorPlugin, ManagedCollector, PluginDescriptor, PluginError, PluginRegistry,
    PluginResult,
};

#[derive(Debug, Default)]
pub struct DriverCounters {
    pub collects: AtomicUsize,
    pub destroys: AtomicUsize,
}

impl DriverCounters {
    pub fn collects(&self) -> usize {
        self.collects.load(Ordering::SeqCst)
    }

    pub fn destroys(&self) -> usize {
        self.destroys.load(Ordering::SeqCst)
    }
}

/// Succeeds unless the metric name is listed as failing or panicking
pub struct ScriptedDriver {
    descriptor: PluginDescriptor,
    failing: HashSet<String>,
    panicking: HashSet<String>,
    delay: Option<Duration>,
    counters: Arc<DriverCounters>,
}

impl ScriptedDriver {
    pub fn new(plugin_type: &str) -> Self {
        Self {
            descriptor: PluginDescriptor::new(plugin_type, format!("{} collector", plugin_type), "1.0.0", api_version())
                .with_device_types(["router", "switch"])
                .with_protocols(["snmp"]),
            failing: HashSet::new(),
            panicking: HashSet::new(),
            delay: None,
            counters: Arc::new(DriverCounters::default()),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.descriptor = self.descriptor.with_priority(priority);
        self
    }

    pub fn failing_on(mut self, metric_name: &str) -> Self {
        self.failing.insert(metric_name.to_string());
        self
    }

    pub fn panicking_on(mut self, metric_name: &str) -> Self {
        self.panicking.insert(metric_name.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn counters(&self) -> Arc<DriverCounters> {
        Arc::clone(&self.counters)
    }

    pub fn into_plugin(self) -> Arc<ManagedCollector<ScriptedDriver>> {
        Arc::new(ManagedCollector::new(self))
    }
}

#[async_trait]
impl CollectorDriver for ScriptedDriver {
    fn descriptor(&self) -> PluginDescriptor {
        self.descriptor.clone()
    }

    async fn on_destroy(&self) -> PluginResult<()> {
        self.counters.destroys.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn do_collect(
        &self,
        device: &Device,
        metric: &MetricConfig,
        _context: &CollectionContext,
    ) -> PluginResult<CollectionResult> {
        let call = self.counters.collects.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.panicking.contains(&metric.metric_name) {
            panic!("driver crashed collecting {}", metric.metric_name);
        }
        if self.failing.contains(&metric.metric_name) {
            return Err(PluginError::execution_failed(format!("{} unreachable on {}", metric.metric_name, device.name)));
        }
        Ok(CollectionResult::success(Default::default()).with_metric(metric.metric_name.clone(), Value::from(call as u64)))
    }
}

pub async fn initialized(plugin: Arc<ManagedCollector<ScriptedDriver>>) -> Arc<ManagedCollector<ScriptedDriver>> {
    plugin
        .initialize(CollectorConfig::for_plugin(plugin.plugin_type().to_string()))
        .await
        .expect("initialize scripted plugin");
    plugin
}

pub struct EngineHarness {
    pub registry: Arc<PluginRegistry>,
    pub engine: Arc<CollectorEngine>,
    pub data: Arc<MemoryDataSink>,
    pub logs: Arc<MemoryLogSink>,
}

pub async fn engine_with(plugins: Vec<Arc<dyn CollectorPlugin>>) -> EngineHarness {
    let registry = Arc::new(PluginRegistry::new());
    for plugin in plugins {
        registry.register(plugin).await.expect("register plugin");
    }
    let data = Arc::new(MemoryDataSink::new());
    let logs = Arc::new(MemoryLogSink::new());
    let engine = Arc::new(CollectorEngine::new(
        Arc::clone(&registry),
        data.clone(),
        logs.clone(),
        EngineConfig::default(),
    ));
    EngineHarness { registry, engine, data, logs }
}

pub fn router(id: u64) -> Device {
    Device::new(id, format!("router-{}", id), "router", format!("192.0.2.{}", id)).with_protocol("snmp")
}

/// Route crate logging through the test harness; safe to call repeatedly
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
