//! The assembled collector: plugins, engine and scheduler over in-memory stores.

use std::sync::Arc;
use anyhow::{Context, Result};
use log::{info, warn};

use super::executor::EngineTaskExecutor;
use super::initialization::initialize_builtin_plugins;
use super::task_file::TaskFile;
use crate::config::ConfigManager;
use crate::engine::{CollectorEngine, MemoryDataSink, MemoryDeviceDirectory, MemoryLogSink};
use crate::plugin::{PluginLifecycleManager, PluginRegistry};
use crate::scheduler::{MemoryTaskStore, SchedulerResult, TaskExecutor, TaskScheduler, TaskStore};

pub struct CollectorService {
    lifecycle: Arc<PluginLifecycleManager>,
    engine: Arc<CollectorEngine>,
    scheduler: Arc<TaskScheduler>,
    executor: Arc<EngineTaskExecutor>,
    store: Arc<MemoryTaskStore>,
    directory: Arc<MemoryDeviceDirectory>,
    data_sink: Arc<MemoryDataSink>,
    log_sink: Arc<MemoryLogSink>,
}

impl CollectorService {
    /// Wire every component and bring the built-in plugins up
    pub async fn build(config: &ConfigManager, tasks: TaskFile) -> Result<Self> {
        let scheduler_config = config.get_scheduler_config()?;
        let lifecycle_config = config.get_lifecycle_config()?;
        let engine_config = config.get_engine_config()?;

        let registry = Arc::new(PluginRegistry::new());
        let lifecycle = Arc::new(PluginLifecycleManager::new(Arc::clone(&registry), lifecycle_config));
        initialize_builtin_plugins(&lifecycle).await?;

        let data_sink = Arc::new(MemoryDataSink::new());
        let log_sink = Arc::new(MemoryLogSink::new());
        let engine = Arc::new(CollectorEngine::new(
            registry,
            data_sink.clone(),
            log_sink.clone(),
            engine_config,
        ));

        let directory = tasks.device_directory();
        let store = tasks.task_store();
        let executor = Arc::new(EngineTaskExecutor::new(Arc::clone(&engine), directory.clone()));
        let scheduler = Arc::new(TaskScheduler::new(scheduler_config, store.clone(), executor.clone()));

        Ok(Self {
            lifecycle,
            engine,
            scheduler,
            executor,
            store,
            directory,
            data_sink,
            log_sink,
        })
    }

    pub async fn start(&self) -> Result<()> {
        self.lifecycle.start();
        self.engine.start_maintenance();
        self.scheduler.start().await.context("Failed to start task scheduler")?;
        info!(
            "Collector started: {} plugins, {} devices, {} tasks",
            self.engine.registry().count(),
            self.directory.len(),
            self.store.len()
        );
        Ok(())
    }

    /// Stop scheduling, then maintenance, then the plugins
    pub async fn shutdown(&self) {
        info!("Shutting down collector");
        self.scheduler.stop().await;
        self.engine.stop_maintenance().await;
        self.lifecycle.stop().await;
    }

    /// Execute every active task once, in store order
    pub async fn run_once(&self) -> Result<Vec<(u64, SchedulerResult<()>)>> {
        let tasks = self.store.load_active_tasks().await.context("Failed to load tasks")?;
        let mut outcomes = Vec::with_capacity(tasks.len());
        for task in tasks {
            let outcome = self.executor.execute_task(&task).await;
            if let Err(e) = &outcome {
                warn!("Task {} failed: {}", task.id, e);
            }
            outcomes.push((task.id, outcome));
        }
        Ok(outcomes)
    }

    pub fn lifecycle(&self) -> &Arc<PluginLifecycleManager> {
        &self.lifecycle
    }

    pub fn engine(&self) -> &Arc<CollectorEngine> {
        &self.engine
    }

    pub fn scheduler(&self) -> &Arc<TaskScheduler> {
        &self.scheduler
    }

    pub fn store(&self) -> &Arc<MemoryTaskStore> {
        &self.store
    }

    pub fn data_sink(&self) -> &Arc<MemoryDataSink> {
        &self.data_sink
    }

    pub fn log_sink(&self) -> &Arc<MemoryLogSink> {
        &self.log_sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;
    use crate::model::{Device, MetricConfig};
    use crate::plugin::PluginState;
    use crate::scheduler::{ScheduleType, SchedulerStatus, TaskDefinition};
    use serde_json::json;

    fn task_file() -> TaskFile {
        TaskFile {
            // no port: the tcp probe rejects the device without touching the network
            devices: vec![Device::new(1, "portless", "server", "192.0.2.10").with_protocol("tcp")],
            tasks: vec![TaskDefinition::new(1, "probe", ScheduleType::Simple)
                .with_config("intervalUnit", json!("hours"))
                .with_config("intervalValue", json!(1))
                .with_devices(vec![1])
                .with_metric(MetricConfig::new("latency", "latency").with_plugin_type("tcp"))],
        }
    }

    #[tokio::test]
    async fn test_service_lifecycle() {
        let service = CollectorService::build(&ConfigManager::from_config(Configuration::new()), TaskFile::default())
            .await
            .unwrap();
        assert_eq!(service.lifecycle().get_plugin_state("tcp"), PluginState::Running);

        service.start().await.unwrap();
        assert_eq!(service.scheduler().status(), SchedulerStatus::Running);
        assert!(service.lifecycle().is_started());

        service.shutdown().await;
        assert_eq!(service.scheduler().status(), SchedulerStatus::Stopped);
        assert_eq!(service.lifecycle().get_plugin_state("tcp"), PluginState::Stopped);
    }

    #[tokio::test]
    async fn test_run_once_reports_each_task() {
        let service = CollectorService::build(&ConfigManager::from_config(Configuration::new()), task_file())
            .await
            .unwrap();

        let outcomes = service.run_once().await.unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].0, 1);
        assert!(outcomes[0].1.is_err());

        let stats = service.engine().execution_statistics();
        assert_eq!(stats.total_collections, 1);
        assert_eq!(stats.failed_collections, 1);
        assert_eq!(service.log_sink().len(), 1);
        assert!(service.data_sink().is_empty());
    }
}
