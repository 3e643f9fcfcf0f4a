//! Runs scheduled tasks through the collector engine.

use std::sync::Arc;
use async_trait::async_trait;
use log::{debug, info, warn};

use crate::engine::{CollectorEngine, DeviceDirectory};
use crate::model::{CollectionContext, MetricConfig};
use crate::scheduler::{SchedulerError, SchedulerResult, TaskDefinition, TaskExecutor};

/// Resolves a task's target devices and collects its enabled metrics from
/// each, one batch per device. The task fails only when nothing succeeded.
pub struct EngineTaskExecutor {
    engine: Arc<CollectorEngine>,
    directory: Arc<dyn DeviceDirectory>,
}

impl EngineTaskExecutor {
    pub fn new(engine: Arc<CollectorEngine>, directory: Arc<dyn DeviceDirectory>) -> Self {
        Self { engine, directory }
    }

    fn context_for(task: &TaskDefinition) -> CollectionContext {
        CollectionContext {
            max_retries: task.retry_times,
            retry_interval_ms: task.retry_interval,
            priority: task.priority,
            ..CollectionContext::for_task(task.id)
        }
    }
}

#[async_trait]
impl TaskExecutor for EngineTaskExecutor {
    async fn execute_task(&self, task: &TaskDefinition) -> SchedulerResult<()> {
        let metrics: Vec<MetricConfig> = task.metrics_config.iter().filter(|m| m.enabled).cloned().collect();
        if metrics.is_empty() || task.target_devices.is_empty() {
            debug!("Task {} has nothing to collect", task.id);
            return Ok(());
        }

        let context = Self::context_for(task);
        let mut attempted = 0usize;
        let mut succeeded = 0usize;
        let mut first_error: Option<String> = None;

        for &device_id in &task.target_devices {
            let device = match self.directory.get_device(device_id).await {
                Ok(Some(device)) => device,
                Ok(None) => {
                    warn!("Task {}: device {} not found", task.id, device_id);
                    attempted += 1;
                    first_error.get_or_insert_with(|| format!("device {} not found", device_id));
                    continue;
                }
                Err(e) => {
                    warn!("Task {}: failed to resolve device {}: {}", task.id, device_id, e);
                    attempted += 1;
                    first_error.get_or_insert_with(|| e.to_string());
                    continue;
                }
            };

            let results = self.engine.execute_batch_collection(&device, &metrics, &context).await;
            attempted += results.len();
            for result in results {
                if result.success {
                    succeeded += 1;
                } else if first_error.is_none() {
                    first_error = result.error_message.clone().or(result.error_code.clone());
                }
            }
        }

        info!("Task {} collected {}/{} metrics", task.id, succeeded, attempted);
        if succeeded == 0 {
            let message = first_error.unwrap_or_else(|| "no collection succeeded".to_string());
            return Err(SchedulerError::execution_failed(task.id, message));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineConfig, MemoryDataSink, MemoryDeviceDirectory, MemoryLogSink};
    use crate::model::{CollectorConfig, Device};
    use crate::plugin::tests::mock_plugins::{MockBehavior, MockDriver};
    use crate::plugin::{CollectorPlugin, PluginRegistry};
    use crate::scheduler::ScheduleType;

    async fn executor(behavior: MockBehavior) -> (EngineTaskExecutor, Arc<MemoryDataSink>) {
        let registry = Arc::new(PluginRegistry::new());
        let plugin = MockDriver::new("snmp-poller").with_behavior(behavior).into_plugin();
        plugin.initialize(CollectorConfig::for_plugin("snmp-poller")).await.unwrap();
        registry.register(plugin).await.unwrap();

        let data = Arc::new(MemoryDataSink::new());
        let engine = Arc::new(CollectorEngine::new(
            registry,
            data.clone(),
            Arc::new(MemoryLogSink::new()),
            EngineConfig::default(),
        ));
        let directory = MemoryDeviceDirectory::with_devices([
            Device::new(1, "core", "router", "192.0.2.1"),
            Device::new(2, "edge", "router", "192.0.2.2"),
        ]);
        (EngineTaskExecutor::new(engine, directory), data)
    }

    fn task(devices: Vec<u64>) -> TaskDefinition {
        TaskDefinition::new(9, "poll", ScheduleType::Simple)
            .with_devices(devices)
            .with_metric(MetricConfig::new("cpu", "gauge"))
    }

    #[tokio::test]
    async fn test_collects_every_device() {
        let (executor, data) = executor(MockBehavior::Succeed).await;
        executor.execute_task(&task(vec![1, 2])).await.unwrap();
        let mut devices: Vec<u64> = data.records().iter().map(|record| record.device_id).collect();
        devices.dedup();
        assert_eq!(devices, vec![1, 2]);
        assert!(data.records().iter().all(|record| record.task_id == Some(9)));
    }

    #[tokio::test]
    async fn test_missing_device_is_tolerated_when_another_succeeds() {
        let (executor, data) = executor(MockBehavior::Succeed).await;
        executor.execute_task(&task(vec![1, 404])).await.unwrap();
        assert!(data.records().iter().all(|record| record.device_id == 1));
        assert!(!data.is_empty());
    }

    #[tokio::test]
    async fn test_all_failures_fail_the_task() {
        let (failing, _) = executor(MockBehavior::Fail).await;
        let err = failing.execute_task(&task(vec![1, 2])).await.unwrap_err();
        assert!(matches!(err, SchedulerError::ExecutionFailed { task_id: 9, .. }));

        let (healthy, _) = executor(MockBehavior::Succeed).await;
        assert!(healthy.execute_task(&task(vec![404])).await.is_err());
    }

    #[tokio::test]
    async fn test_disabled_metrics_are_skipped() {
        let (executor, data) = executor(MockBehavior::Fail).await;
        let mut metric = MetricConfig::new("cpu", "gauge");
        metric.enabled = false;
        let task = TaskDefinition::new(10, "idle", ScheduleType::Simple)
            .with_devices(vec![1])
            .with_metric(metric);
        executor.execute_task(&task).await.unwrap();
        assert!(data.is_empty());
    }
}
