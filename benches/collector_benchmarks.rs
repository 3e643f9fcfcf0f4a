//! Collector Performance Benchmarks
//!
//! Registry lookups with many plugins registered, cached versus uncached
//! collection through a managed plugin, and engine batch collection.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use async_trait::async_trait;
use serde_json::Value;
use tokio::runtime::Runtime;

use devcollect::engine::{CollectorEngine, EngineConfig, MemoryDataSink, MemoryLogSink};
use devcollect::model::{CollectionContext, CollectionResult, CollectorConfig, Device, MetricConfig};
use devcollect::plugin::{
    api_version, CollectorDriver, CollectorPlugin, ManagedCollector, PluginDescriptor, PluginRegistry, PluginResult,
};

/// Answers immediately with a constant gauge
struct ConstantDriver {
    plugin_type: String,
    device_type: String,
}

#[async_trait]
impl CollectorDriver for ConstantDriver {
    fn descriptor(&self) -> PluginDescriptor {
        PluginDescriptor::new(&self.plugin_type, "constant", "1.0.0", api_version())
            .with_device_types([self.device_type.clone()])
            .with_protocols(["snmp"])
    }

    async fn do_collect(
        &self,
        _device: &Device,
        metric: &MetricConfig,
        _context: &CollectionContext,
    ) -> PluginResult<CollectionResult> {
        Ok(CollectionResult::success(Default::default()).with_metric(metric.metric_name.clone(), Value::from(42)))
    }
}

fn constant_plugin(index: usize, device_type: &str) -> Arc<ManagedCollector<ConstantDriver>> {
    Arc::new(ManagedCollector::new(ConstantDriver {
        plugin_type: format!("constant-{}", index),
        device_type: device_type.to_string(),
    }))
}

fn populated_registry(runtime: &Runtime, count: usize) -> Arc<PluginRegistry> {
    let registry = Arc::new(PluginRegistry::new());
    runtime.block_on(async {
        for i in 0..count {
            let device_type = if i % 2 == 0 { "router" } else { "switch" };
            let plugin = constant_plugin(i, device_type);
            plugin.initialize(CollectorConfig::for_plugin(plugin.plugin_type().to_string())).await.ok();
            registry.register(plugin).await.ok();
        }
    });
    registry
}

fn device() -> Device {
    Device::new(1, "core", "router", "192.0.2.1").with_protocol("snmp")
}

/// Lookup by type and by device type as the registry grows
fn bench_registry_lookup(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let mut group = c.benchmark_group("registry_lookup");

    for count in [10, 100, 500] {
        let registry = populated_registry(&runtime, count);
        let wanted = format!("constant-{}", count / 2);

        group.bench_with_input(BenchmarkId::new("get", count), &count, |b, _| {
            b.iter(|| registry.get(&wanted))
        });
        group.bench_with_input(BenchmarkId::new("enabled_for_device_type", count), &count, |b, _| {
            b.iter(|| registry.get_enabled_for_device_type("router"))
        });
    }
    group.finish();
}

/// A cached metric against one that always reaches the driver
fn bench_cached_collection(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let plugin = constant_plugin(0, "router");
    runtime
        .block_on(plugin.initialize(CollectorConfig::for_plugin("constant-0")))
        .unwrap();

    let device = device();
    let context = CollectionContext::create_default();
    let cached = MetricConfig::new("ifInOctets", "counter").with_cache(300);
    let uncached = MetricConfig::new("ifOutOctets", "counter");

    let mut group = c.benchmark_group("plugin_collect");
    group.bench_function("cache_hit", |b| {
        b.iter(|| runtime.block_on(plugin.collect(&device, &cached, &context)))
    });
    group.bench_function("uncached", |b| {
        b.iter(|| runtime.block_on(plugin.collect(&device, &uncached, &context)))
    });
    group.finish();
}

/// Sequential and concurrent batches through the engine
fn bench_engine_batches(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let registry = populated_registry(&runtime, 4);
    let engine = CollectorEngine::new(
        registry,
        Arc::new(MemoryDataSink::new()),
        Arc::new(MemoryLogSink::new()),
        EngineConfig::default(),
    );
    let device = device();
    let context = CollectionContext::create_default();

    let mut group = c.benchmark_group("engine_batch");
    for size in [1, 16, 64] {
        let metrics: Vec<MetricConfig> = (0..size).map(|i| MetricConfig::new(format!("if{}", i), "gauge")).collect();
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("sequential", size), &metrics, |b, metrics| {
            b.iter(|| runtime.block_on(engine.execute_batch_collection(&device, metrics, &context)))
        });
        group.bench_with_input(BenchmarkId::new("concurrent", size), &metrics, |b, metrics| {
            b.iter(|| runtime.block_on(engine.execute_batch_collection_async(&device, metrics, &context)))
        });
    }
    group.finish();
}

criterion_group!(
    collector_benches,
    bench_registry_lookup,
    bench_cached_collection,
    bench_engine_batches,
);

criterion_main!(collector_benches);
