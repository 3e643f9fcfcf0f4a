//! Scheduler Integration Tests
//!
//! Drives the task scheduler through its public API with a recording executor
//! on a paused clock.

mod support;

use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use chrono::Local;
use parking_lot::Mutex;
use serde_json::json;
use tokio::time::Instant;
use tokio_test::{assert_err, assert_ok};

use devcollect::scheduler::{
    MemoryTaskStore, ScheduleType, SchedulerConfig, SchedulerError, SchedulerResult, SchedulerStatus,
    TaskDefinition, TaskExecutionStatus, TaskExecutor, TaskScheduler, TaskStore,
};

use support::settle;

/// Remembers when each task ran
#[derive(Default)]
struct RecordingExecutor {
    runs: Mutex<Vec<(u64, Instant)>>,
}

impl RecordingExecutor {
    fn runs_of(&self, task_id: u64) -> Vec<Instant> {
        self.runs.lock().iter().filter(|(id, _)| *id == task_id).map(|(_, at)| *at).collect()
    }
}

#[async_trait]
impl TaskExecutor for RecordingExecutor {
    async fn execute_task(&self, task: &TaskDefinition) -> SchedulerResult<()> {
        self.runs.lock().push((task.id, Instant::now()));
        Ok(())
    }
}

fn every_five_minutes(id: u64) -> TaskDefinition {
    TaskDefinition::new(id, "interface counters", ScheduleType::Simple)
        .with_config("intervalUnit", json!("MINUTES"))
        .with_config("intervalValue", json!(5))
}

async fn started(store: Arc<MemoryTaskStore>, executor: Arc<RecordingExecutor>) -> Arc<TaskScheduler> {
    let scheduler = Arc::new(TaskScheduler::new(SchedulerConfig::default(), store, executor));
    scheduler.start().await.unwrap();
    scheduler
}

#[tokio::test(start_paused = true)]
async fn test_simple_task_fires_at_fixed_rate() {
    let executor = Arc::new(RecordingExecutor::default());
    let scheduler = started(Arc::new(MemoryTaskStore::new()), executor.clone()).await;
    let t0 = Instant::now();

    scheduler.schedule_task(every_five_minutes(1)).unwrap();
    settle().await;
    assert_eq!(scheduler.get_task(1).unwrap().runtime.execution_count, 1);

    tokio::time::sleep(Duration::from_secs(5 * 60 + 1)).await;
    settle().await;

    let runs = executor.runs_of(1);
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0] - t0, Duration::ZERO);
    assert_eq!(runs[1] - runs[0], Duration::from_secs(300));

    let snapshot = scheduler.get_task(1).unwrap();
    assert_eq!(snapshot.runtime.execution_count, 2);
    assert_eq!(snapshot.runtime.success_count, 2);
    assert_eq!(snapshot.runtime.status, TaskExecutionStatus::Scheduled);
    scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_rescheduling_keeps_one_timer() {
    let executor = Arc::new(RecordingExecutor::default());
    let scheduler = started(Arc::new(MemoryTaskStore::new()), executor.clone()).await;

    assert_ok!(scheduler.schedule_task(every_five_minutes(2)));
    assert_ok!(scheduler.schedule_task(every_five_minutes(2)));
    settle().await;
    assert_eq!(scheduler.get_scheduled_task_ids(), vec![2]);
    let before = executor.runs_of(2).len();

    tokio::time::sleep(Duration::from_secs(10 * 60 + 1)).await;
    settle().await;
    assert_eq!(executor.runs_of(2).len() - before, 2);
    assert_eq!(scheduler.get_statistics().total_tasks, 1);
    scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_once_schedule_in_the_past_is_rejected() {
    let executor = Arc::new(RecordingExecutor::default());
    let scheduler = started(Arc::new(MemoryTaskStore::new()), executor.clone()).await;

    let past = (Local::now() - chrono::Duration::hours(1)).format("%Y-%m-%d %H:%M:%S").to_string();
    let task = TaskDefinition::new(3, "late", ScheduleType::Once).with_config("executionTime", json!(past));

    let err = assert_err!(scheduler.schedule_task(task));
    assert!(matches!(err, SchedulerError::ExecutionTimeInPast { task_id: 3, .. }));
    assert!(err.is_validation_error());
    assert!(!scheduler.is_task_scheduled(3));
    settle().await;
    assert!(executor.runs_of(3).is_empty());
    scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_invalid_reschedule_keeps_previous_schedule() {
    let executor = Arc::new(RecordingExecutor::default());
    let scheduler = started(Arc::new(MemoryTaskStore::new()), executor.clone()).await;
    scheduler.schedule_task(every_five_minutes(4)).unwrap();
    settle().await;

    let broken = TaskDefinition::new(4, "broken", ScheduleType::Cron).with_config("cronExpression", json!("not a cron"));
    assert_err!(scheduler.reschedule_task(broken));
    assert!(scheduler.is_task_scheduled(4));
    assert_eq!(scheduler.get_task(4).unwrap().name, "interface counters");
    scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_store_tasks_loaded_and_recorded() {
    let mut disabled = every_five_minutes(6);
    disabled.enabled = false;
    let store = MemoryTaskStore::with_tasks(vec![every_five_minutes(5), disabled]);
    let executor = Arc::new(RecordingExecutor::default());
    let scheduler = started(store.clone(), executor.clone()).await;
    settle().await;

    assert_eq!(scheduler.get_scheduled_task_ids(), vec![5]);
    assert_eq!(store.execution_summary(5).unwrap().successes, 1);
    assert!(store.execution_summary(6).is_none());
    assert_eq!(store.load_active_tasks().await.unwrap().len(), 1);

    store.insert(every_five_minutes(7));
    assert_eq!(scheduler.reload_all_tasks().await.unwrap(), 2);
    assert_eq!(scheduler.get_scheduled_task_ids(), vec![5, 7]);
    scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_pause_all_and_resume_all() {
    let executor = Arc::new(RecordingExecutor::default());
    let store = MemoryTaskStore::with_tasks(vec![every_five_minutes(8), every_five_minutes(9)]);
    let scheduler = started(store, executor.clone()).await;
    settle().await;

    scheduler.pause_all_tasks();
    assert_eq!(scheduler.status(), SchedulerStatus::Paused);
    tokio::time::sleep(Duration::from_secs(15 * 60)).await;
    assert_eq!(executor.runs_of(8).len(), 1);
    assert_eq!(executor.runs_of(9).len(), 1);

    scheduler.resume_all_tasks();
    settle().await;
    assert_eq!(scheduler.status(), SchedulerStatus::Running);
    assert_eq!(executor.runs_of(8).len(), 2);
    scheduler.stop().await;
}
