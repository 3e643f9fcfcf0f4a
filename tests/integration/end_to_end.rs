//! End-to-End Integration Tests
//!
//! Task file → collector service → engine → plugins → sinks, plus the
//! engine batch paths driven through the public plugin API.

mod support;

use std::sync::Arc;
use std::time::Duration;

use devcollect::app::{CollectorService, TaskFile};
use devcollect::config::{ConfigManager, Configuration};
use devcollect::model::{error_codes, CollectionContext, MetricConfig};
use devcollect::plugin::builtin::tcp_probe_plugin;
use devcollect::plugin::{CollectorPlugin, PluginState};

use support::{engine_with, initialized, router, settle, ScriptedDriver};

#[tokio::test]
async fn test_batch_collection_isolates_failures() {
    let driver = ScriptedDriver::new("snmp").failing_on("B");
    let counters = driver.counters();
    let plugin = initialized(driver.into_plugin()).await;
    let harness = engine_with(vec![plugin]).await;

    let metrics = vec![
        MetricConfig::new("A", "gauge"),
        MetricConfig::new("B", "gauge"),
        MetricConfig::new("C", "gauge"),
    ];
    let results = harness
        .engine
        .execute_batch_collection(&router(1), &metrics, &CollectionContext::create_default())
        .await;

    assert_eq!(results.len(), 3);
    assert_eq!(results.iter().map(|r| r.success).collect::<Vec<_>>(), vec![true, false, true]);
    assert_eq!(results[1].error_code(), Some(error_codes::COLLECTION_ERROR));
    assert!(results.iter().all(|r| r.session_id == results[0].session_id));
    assert_eq!(counters.collects(), 3);

    let names: Vec<String> = harness.data.records().into_iter().map(|r| r.metric_name).collect();
    assert!(names.contains(&"A".to_string()));
    assert!(names.contains(&"C".to_string()));
    assert!(!names.contains(&"B".to_string()));
    assert_eq!(harness.logs.len(), 3);

    let stats = harness.engine.execution_statistics();
    assert_eq!(stats.total_collections, 3);
    assert_eq!(stats.failed_collections, 1);
}

#[tokio::test]
async fn test_async_batch_keeps_input_order() {
    let plugin = initialized(ScriptedDriver::new("snmp").with_delay(Duration::from_millis(5)).into_plugin()).await;
    let harness = engine_with(vec![plugin]).await;

    let metrics: Vec<MetricConfig> = (0..8).map(|i| MetricConfig::new(format!("if{}", i), "counter")).collect();
    let results = harness
        .engine
        .execute_batch_collection_async(&router(2), &metrics, &CollectionContext::create_default())
        .await;

    assert_eq!(results.len(), 8);
    for (metric, result) in metrics.iter().zip(&results) {
        assert!(result.success);
        assert_eq!(result.metric_name.as_deref(), Some(metric.metric_name.as_str()));
    }
}

#[tokio::test]
async fn test_protocol_and_device_type_lookup() {
    let snmp = initialized(ScriptedDriver::new("snmp").into_plugin()).await;
    let harness = engine_with(vec![snmp, Arc::new(tcp_probe_plugin())]).await;

    assert!(harness.registry.get_for_protocol("udp").is_empty());
    let tcp: Vec<String> = harness
        .registry
        .get_for_protocol("TCP")
        .iter()
        .map(|p| p.plugin_type().to_string())
        .collect();
    assert_eq!(tcp, vec!["tcp".to_string()]);

    let for_router: Vec<String> = harness
        .registry
        .get_for_device_type("router")
        .iter()
        .map(|p| p.plugin_type().to_string())
        .collect();
    assert!(for_router.contains(&"snmp".to_string()));
    assert!(for_router.contains(&"tcp".to_string()));
}

#[tokio::test]
async fn test_plugin_hint_and_missing_plugin() {
    let low = initialized(ScriptedDriver::new("snmp-v2").with_priority(1).into_plugin()).await;
    let high = initialized(ScriptedDriver::new("snmp-v3").with_priority(9).into_plugin()).await;
    let harness = engine_with(vec![low, high]).await;
    let context = CollectionContext::create_default();

    let plain = harness.engine.execute_collection(&router(3), &MetricConfig::new("cpu", "gauge"), &context).await;
    assert_eq!(plain.plugin_type.as_deref(), Some("snmp-v2"));

    let hinted = MetricConfig::new("cpu", "gauge").with_plugin_type("snmp-v3");
    let result = harness.engine.execute_collection(&router(3), &hinted, &context).await;
    assert_eq!(result.plugin_type.as_deref(), Some("snmp-v3"));

    let mut printer = router(4);
    printer.device_type = "printer".to_string();
    let result = harness.engine.execute_collection(&printer, &MetricConfig::new("toner", "gauge"), &context).await;
    assert!(!result.success);
    assert_eq!(result.error_code(), Some(error_codes::NO_PLUGIN_FOUND));
}

const TASKS: &str = r#"
devices:
  - id: 1
    name: core
    deviceType: router
    protocol: snmp
    address: 192.0.2.1
  - id: 2
    name: access
    deviceType: switch
    protocol: snmp
    address: 192.0.2.2
tasks:
  - id: 10
    name: interface counters
    scheduleType: SIMPLE
    scheduleConfig:
      intervalUnit: MINUTES
      intervalValue: 5
    targetDevices: [1, 2]
    metricsConfig:
      - metricName: ifInOctets
        metricType: counter
        pluginType: snmp
  - id: 11
    name: disabled
    scheduleType: SIMPLE
    enabled: false
    scheduleConfig:
      frequency: SECONDS
      interval: 60
    targetDevices: [1]
    metricsConfig:
      - metricName: ifOutOctets
        metricType: counter
"#;

async fn service_with_snmp() -> (CollectorService, Arc<support::DriverCounters>) {
    let tasks = TaskFile::from_yaml(TASKS).unwrap();
    let service = CollectorService::build(&ConfigManager::from_config(Configuration::new()), tasks)
        .await
        .unwrap();

    let driver = ScriptedDriver::new("snmp");
    let counters = driver.counters();
    let lifecycle = service.lifecycle();
    lifecycle.registry().register(driver.into_plugin()).await.unwrap();
    lifecycle.start_all_plugins_in_order().await;
    assert_eq!(lifecycle.get_plugin_state("snmp"), PluginState::Running);
    (service, counters)
}

#[tokio::test]
async fn test_task_file_run_once() {
    let (service, counters) = service_with_snmp().await;

    let outcomes = service.run_once().await.unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].0, 10);
    assert!(outcomes[0].1.is_ok());
    assert_eq!(counters.collects(), 2);

    let devices: Vec<u64> = service.data_sink().records().iter().map(|r| r.device_id).collect();
    assert_eq!(devices, vec![1, 2]);
    assert!(service.data_sink().records().iter().all(|r| r.task_id == Some(10)));
    service.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_scheduled_service_collects_every_period() {
    let (service, counters) = service_with_snmp().await;
    service.start().await.unwrap();
    settle().await;

    assert_eq!(service.scheduler().get_scheduled_task_ids(), vec![10]);
    assert_eq!(counters.collects(), 2);

    tokio::time::sleep(Duration::from_secs(5 * 60 + 1)).await;
    settle().await;
    assert_eq!(counters.collects(), 4);

    let summary = service.store().execution_summary(10).unwrap();
    assert_eq!(summary.executions, 2);
    assert_eq!(summary.failures, 0);

    service.shutdown().await;
    assert!(service.scheduler().get_scheduled_task_ids().is_empty());
}
