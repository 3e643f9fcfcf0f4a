//! Task definitions as supplied by the task store.

use std::collections::HashMap;
use std::str::FromStr;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::SchedulerError;
use crate::model::MetricConfig;

/// Trigger strategy of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleType {
    /// Fixed-rate repetition
    #[serde(alias = "simple", alias = "interval", alias = "INTERVAL")]
    Simple,
    #[serde(alias = "cron")]
    Cron,
    /// Fired by `trigger_event`
    #[serde(alias = "event")]
    Event,
    #[serde(alias = "once")]
    Once,
}

impl ScheduleType {
    pub fn as_str(self) -> &'static str {
        match self {
            ScheduleType::Simple => "SIMPLE",
            ScheduleType::Cron => "CRON",
            ScheduleType::Event => "EVENT",
            ScheduleType::Once => "ONCE",
        }
    }
}

impl std::fmt::Display for ScheduleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScheduleType {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simple" | "interval" => Ok(ScheduleType::Simple),
            "cron" => Ok(ScheduleType::Cron),
            "event" => Ok(ScheduleType::Event),
            "once" => Ok(ScheduleType::Once),
            _ => Err(SchedulerError::unsupported_schedule_type(s)),
        }
    }
}

/// Runtime status of a scheduled task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskExecutionStatus {
    Scheduled,
    Running,
    Paused,
    /// Event task waiting for its trigger
    Waiting,
    Failed,
}

impl std::fmt::Display for TaskExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskExecutionStatus::Scheduled => "SCHEDULED",
            TaskExecutionStatus::Running => "RUNNING",
            TaskExecutionStatus::Paused => "PAUSED",
            TaskExecutionStatus::Waiting => "WAITING",
            TaskExecutionStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

fn default_priority() -> i32 { 5 }
fn default_retry_times() -> u32 { 3 }
fn default_retry_interval() -> u64 { 1000 }
fn default_enabled() -> bool { true }

/// A schedulable collection task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDefinition {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub schedule_type: ScheduleType,
    /// Strategy specific keys such as `intervalUnit` or `cronExpression`
    #[serde(default)]
    pub schedule_config: HashMap<String, Value>,
    /// Device ids
    #[serde(default)]
    pub target_devices: Vec<u64>,
    #[serde(default)]
    pub metrics_config: Vec<MetricConfig>,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default = "default_retry_times")]
    pub retry_times: u32,
    /// Milliseconds
    #[serde(default = "default_retry_interval")]
    pub retry_interval: u64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub effective_time: Option<DateTime<Local>>,
    #[serde(default)]
    pub expire_time: Option<DateTime<Local>>,
}

impl TaskDefinition {
    pub fn new(id: u64, name: impl Into<String>, schedule_type: ScheduleType) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            schedule_type,
            schedule_config: HashMap::new(),
            target_devices: Vec::new(),
            metrics_config: Vec::new(),
            priority: default_priority(),
            retry_times: default_retry_times(),
            retry_interval: default_retry_interval(),
            enabled: true,
            effective_time: None,
            expire_time: None,
        }
    }

    pub fn with_config(mut self, key: impl Into<String>, value: Value) -> Self {
        self.schedule_config.insert(key.into(), value);
        self
    }

    pub fn with_devices(mut self, devices: impl IntoIterator<Item = u64>) -> Self {
        self.target_devices = devices.into_iter().collect();
        self
    }

    pub fn with_metric(mut self, metric: MetricConfig) -> Self {
        self.metrics_config.push(metric);
        self
    }

    pub fn with_expiry(mut self, expire_time: DateTime<Local>) -> Self {
        self.expire_time = Some(expire_time);
        self
    }

    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.schedule_config.get(key).and_then(Value::as_str)
    }

    pub fn is_expired(&self, now: DateTime<Local>) -> bool {
        self.expire_time.is_some_and(|expire| expire <= now)
    }

    /// Enabled and inside its effective window
    pub fn is_active(&self, now: DateTime<Local>) -> bool {
        self.enabled && !self.is_expired(now) && self.effective_time.map_or(true, |effective| effective <= now)
    }

    /// Event type of an event task
    pub fn event_type(&self) -> Option<&str> {
        self.config_str("eventType")
    }
}
