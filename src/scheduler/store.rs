//! Collaborators of the scheduler: where tasks come from and what runs them.

use std::collections::HashMap;
use std::sync::Arc;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use dashmap::DashMap;
use serde::Serialize;

use super::error::SchedulerResult;
use super::task::TaskDefinition;

/// Outcome of one task execution, reported back to the store
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub task_id: u64,
    pub success: bool,
    /// Milliseconds
    pub duration: u64,
    pub error_message: Option<String>,
    pub executed_at: DateTime<Local>,
}

/// Supplies task definitions and accepts execution statistics
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Tasks that are enabled and inside their effective window
    async fn load_active_tasks(&self) -> SchedulerResult<Vec<TaskDefinition>>;

    async fn get_task(&self, task_id: u64) -> SchedulerResult<Option<TaskDefinition>>;

    async fn record_execution(&self, record: &ExecutionRecord) -> SchedulerResult<()>;
}

/// Runs the body of a task
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute_task(&self, task: &TaskDefinition) -> SchedulerResult<()>;
}

/// Execution totals kept per task by [`MemoryTaskStore`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskExecutionSummary {
    pub executions: u64,
    pub successes: u64,
    pub failures: u64,
    pub last_duration: u64,
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
pub struct MemoryTaskStore {
    tasks: DashMap<u64, TaskDefinition>,
    executions: DashMap<u64, TaskExecutionSummary>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tasks(tasks: impl IntoIterator<Item = TaskDefinition>) -> Arc<Self> {
        let store = Self::new();
        for task in tasks {
            store.insert(task);
        }
        Arc::new(store)
    }

    pub fn insert(&self, task: TaskDefinition) -> Option<TaskDefinition> {
        self.tasks.insert(task.id, task)
    }

    pub fn remove(&self, task_id: u64) -> Option<TaskDefinition> {
        self.tasks.remove(&task_id).map(|(_, task)| task)
    }

    pub fn all_tasks(&self) -> Vec<TaskDefinition> {
        let mut tasks: Vec<_> = self.tasks.iter().map(|entry| entry.value().clone()).collect();
        tasks.sort_by_key(|task| task.id);
        tasks
    }

    pub fn execution_summary(&self, task_id: u64) -> Option<TaskExecutionSummary> {
        self.executions.get(&task_id).map(|summary| summary.clone())
    }

    pub fn execution_summaries(&self) -> HashMap<u64, TaskExecutionSummary> {
        self.executions
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn load_active_tasks(&self) -> SchedulerResult<Vec<TaskDefinition>> {
        let now = Local::now();
        let mut tasks: Vec<_> = self
            .tasks
            .iter()
            .filter(|entry| entry.is_active(now))
            .map(|entry| entry.value().clone())
            .collect();
        tasks.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));
        Ok(tasks)
    }

    async fn get_task(&self, task_id: u64) -> SchedulerResult<Option<TaskDefinition>> {
        Ok(self.tasks.get(&task_id).map(|task| task.clone()))
    }

    async fn record_execution(&self, record: &ExecutionRecord) -> SchedulerResult<()> {
        let mut summary = self.executions.entry(record.task_id).or_default();
        summary.executions += 1;
        if record.success {
            summary.successes += 1;
        } else {
            summary.failures += 1;
        }
        summary.last_duration = record.duration;
        summary.last_error = record.error_message.clone();
        Ok(())
    }
}
