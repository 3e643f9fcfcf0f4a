//! Task file: devices and task definitions for the in-memory stores.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::engine::MemoryDeviceDirectory;
use crate::model::Device;
use crate::scheduler::{MemoryTaskStore, TaskDefinition};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFile {
    #[serde(default)]
    pub devices: Vec<Device>,
    #[serde(default)]
    pub tasks: Vec<TaskDefinition>,
}

impl TaskFile {
    /// `.json` files are read as JSON, everything else as YAML
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading task file: {}", path.display());
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read task file: {}", path.display()))?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let file = if is_json {
            Self::from_json(&content)
        } else {
            Self::from_yaml(&content)
        }
        .with_context(|| format!("Failed to parse task file: {}", path.display()))?;

        file.validate()?;
        info!(
            "Loaded {} devices and {} tasks from {}",
            file.devices.len(),
            file.tasks.len(),
            path.display()
        );
        Ok(file)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Invalid YAML task file")
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Invalid JSON task file")
    }

    /// Ids must be unique; unknown target devices only warn
    pub fn validate(&self) -> Result<()> {
        let mut device_ids = HashSet::new();
        for device in &self.devices {
            if !device_ids.insert(device.id) {
                anyhow::bail!("Duplicate device id {} in task file", device.id);
            }
        }

        let mut task_ids = HashSet::new();
        for task in &self.tasks {
            if !task_ids.insert(task.id) {
                anyhow::bail!("Duplicate task id {} in task file", task.id);
            }
            for device_id in &task.target_devices {
                if !device_ids.contains(device_id) {
                    warn!("Task {} targets unknown device {}", task.id, device_id);
                }
            }
        }
        Ok(())
    }

    pub fn device_directory(&self) -> Arc<MemoryDeviceDirectory> {
        MemoryDeviceDirectory::with_devices(self.devices.iter().cloned())
    }

    pub fn task_store(&self) -> Arc<MemoryTaskStore> {
        MemoryTaskStore::with_tasks(self.tasks.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ScheduleType;
    use tempfile::TempDir;

    const YAML: &str = r#"
devices:
  - id: 1
    name: core-router
    deviceType: router
    protocol: tcp
    address: 10.0.0.1
    port: 22
tasks:
  - id: 100
    name: reachability
    scheduleType: SIMPLE
    scheduleConfig:
      intervalUnit: minutes
      intervalValue: 5
    targetDevices: [1]
    metricsConfig:
      - metricName: ssh_latency
        metricType: latency
        pluginType: tcp
        parameters:
          port: 22
"#;

    #[test]
    fn test_yaml_task_file() {
        let file = TaskFile::from_yaml(YAML).unwrap();
        assert_eq!(file.devices.len(), 1);
        assert_eq!(file.devices[0].device_type, "router");
        assert_eq!(file.devices[0].port, Some(22));

        let task = &file.tasks[0];
        assert_eq!(task.schedule_type, ScheduleType::Simple);
        assert_eq!(task.priority, 5);
        assert!(task.enabled);
        assert_eq!(task.metrics_config[0].plugin_type.as_deref(), Some("tcp"));
        assert_eq!(task.metrics_config[0].parameter_u64("port"), Some(22));
        assert!(file.validate().is_ok());
    }

    #[test]
    fn test_load_json_by_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.json");
        let file = TaskFile::from_yaml(YAML).unwrap();
        fs::write(&path, serde_json::to_string_pretty(&file).unwrap()).unwrap();

        let loaded = TaskFile::load(&path).unwrap();
        assert_eq!(loaded, file);
        assert_eq!(loaded.task_store().len(), 1);
        assert_eq!(loaded.device_directory().len(), 1);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut file = TaskFile::from_yaml(YAML).unwrap();
        file.tasks.push(file.tasks[0].clone());
        assert!(file.validate().is_err());

        let mut file = TaskFile::from_yaml(YAML).unwrap();
        file.devices.push(file.devices[0].clone());
        assert!(file.validate().is_err());
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(TaskFile::load(&dir.path().join("absent.yaml")).is_err());
    }
}
