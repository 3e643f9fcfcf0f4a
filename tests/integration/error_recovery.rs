//! Error Recovery Integration Tests
//!
//! Plugin replacement, crashing drivers, plugins in the wrong state, failing
//! tasks and bad configuration.

mod support;

use std::collections::HashMap;
use std::sync::Arc;
use serde_json::json;

use devcollect::app::{CollectorService, EngineTaskExecutor, TaskFile};
use devcollect::config::{ConfigManager, Configuration};
use devcollect::engine::MemoryDeviceDirectory;
use devcollect::model::{error_codes, CollectionContext, MetricConfig};
use devcollect::plugin::CollectorPlugin;
use devcollect::scheduler::{
    MemoryTaskStore, ScheduleType, SchedulerConfig, TaskDefinition, TaskExecutor, TaskScheduler,
};

use support::{engine_with, init_logging, initialized, router, settle, ScriptedDriver};

#[tokio::test]
async fn test_replacing_a_plugin_retires_the_old_instance() {
    let first = ScriptedDriver::new("snmp");
    let first_counters = first.counters();
    let harness = engine_with(vec![initialized(first.into_plugin()).await]).await;

    let second = ScriptedDriver::new("snmp");
    let second_counters = second.counters();
    harness.registry.register(initialized(second.into_plugin()).await).await.unwrap();

    assert_eq!(first_counters.destroys(), 1);
    assert_eq!(second_counters.destroys(), 0);
    assert_eq!(harness.registry.count(), 1);
    assert!(harness.registry.is_enabled("snmp"));

    let result = harness
        .engine
        .execute_collection(&router(1), &MetricConfig::new("cpu", "gauge"), &CollectionContext::create_default())
        .await;
    assert!(result.success);
    assert_eq!(first_counters.collects(), 0);
    assert_eq!(second_counters.collects(), 1);
}

#[tokio::test]
async fn test_panicking_driver_does_not_poison_later_collections() {
    init_logging();
    let plugin = initialized(ScriptedDriver::new("snmp").panicking_on("crash").into_plugin()).await;
    let harness = engine_with(vec![plugin.clone()]).await;
    let context = CollectionContext::create_default();

    let crashed = harness.engine.execute_collection(&router(1), &MetricConfig::new("crash", "gauge"), &context).await;
    assert!(!crashed.success);
    assert_eq!(crashed.error_code(), Some(error_codes::COLLECTION_ERROR));
    assert!(crashed.error_message.as_deref().unwrap_or_default().contains("driver crashed"));

    let healthy = harness.engine.execute_collection(&router(1), &MetricConfig::new("cpu", "gauge"), &context).await;
    assert!(healthy.success);
    assert!(plugin.is_initialized());

    let stats = harness.engine.execution_statistics();
    assert_eq!(stats.total_collections, 2);
    assert_eq!(stats.failed_collections, 1);
}

#[tokio::test]
async fn test_plugin_state_is_reported_in_results() {
    let pending = ScriptedDriver::new("snmp").into_plugin();
    let harness = engine_with(vec![pending.clone()]).await;
    let context = CollectionContext::create_default();
    let metric = MetricConfig::new("cpu", "gauge");

    let result = harness.engine.execute_collection(&router(1), &metric, &context).await;
    assert_eq!(result.error_code(), Some(error_codes::PLUGIN_NOT_INITIALIZED));

    let pending = initialized(pending).await;
    assert!(harness.engine.execute_collection(&router(1), &metric, &context).await.success);

    pending.destroy().await.unwrap();
    let result = harness.engine.execute_collection(&router(1), &metric, &context).await;
    assert_eq!(result.error_code(), Some(error_codes::PLUGIN_DESTROYED));
    assert!(harness.data.records().iter().all(|r| r.metric_name == "cpu"));
}

#[tokio::test(start_paused = true)]
async fn test_failed_task_is_recorded_and_retried_next_period() {
    init_logging();
    let driver = ScriptedDriver::new("snmp").failing_on("cpu");
    let counters = driver.counters();
    let harness = engine_with(vec![initialized(driver.into_plugin()).await]).await;

    let directory = MemoryDeviceDirectory::with_devices(vec![router(1)]);
    let executor = Arc::new(EngineTaskExecutor::new(Arc::clone(&harness.engine), directory));
    let task = TaskDefinition::new(1, "cpu", ScheduleType::Simple)
        .with_config("intervalUnit", json!("hours"))
        .with_config("intervalValue", json!(1))
        .with_devices([1, 99])
        .with_metric(MetricConfig::new("cpu", "gauge"));

    let err = tokio_test::assert_err!(executor.execute_task(&task).await);
    assert!(err.to_string().contains("unreachable"));

    let store = MemoryTaskStore::with_tasks(vec![task]);
    let scheduler = Arc::new(TaskScheduler::new(SchedulerConfig::default(), store.clone(), executor));
    scheduler.start().await.unwrap();
    settle().await;

    let summary = store.execution_summary(1).unwrap();
    assert_eq!(summary.failures, 1);
    assert!(summary.last_error.is_some());

    let snapshot = scheduler.get_task(1).unwrap();
    assert_eq!(snapshot.runtime.failure_count, 1);
    assert!(snapshot.runtime.last_execution_error.is_some());
    assert!(scheduler.is_task_scheduled(1));

    tokio::time::sleep(std::time::Duration::from_secs(3601)).await;
    settle().await;
    assert_eq!(store.execution_summary(1).unwrap().failures, 2);
    assert_eq!(counters.collects(), 3);
    scheduler.stop().await;
}

#[tokio::test]
async fn test_invalid_configuration_stops_the_build() {
    let mut config = Configuration::new();
    config.insert(
        "scheduler".to_string(),
        HashMap::from([("thread-pool-size".to_string(), "0".to_string())]),
    );
    let result = CollectorService::build(&ConfigManager::from_config(config), TaskFile::default()).await;
    let message = format!("{:#}", result.err().unwrap());
    assert!(message.contains("Scheduler configuration"));

    let mut config = Configuration::new();
    config.insert(
        "engine".to_string(),
        HashMap::from([("max-concurrency".to_string(), "many".to_string())]),
    );
    assert!(CollectorService::build(&ConfigManager::from_config(config), TaskFile::default()).await.is_err());
}
