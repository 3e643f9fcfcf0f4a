//! Runtime state of a scheduled task.

use chrono::{DateTime, Duration as ChronoDuration, Local};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::schedule::Schedule;
use super::task::{ScheduleType, TaskDefinition, TaskExecutionStatus};

/// Cancelling the token stops future firings only
pub(crate) struct TimerHandle {
    pub(crate) token: CancellationToken,
    pub(crate) handle: JoinHandle<()>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRuntime {
    pub status: TaskExecutionStatus,
    pub next_execution_time: Option<DateTime<Local>>,
    pub last_execution_time: Option<DateTime<Local>>,
    pub execution_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    /// Milliseconds
    pub total_execution_time: u64,
    pub last_execution_status: Option<String>,
    pub last_execution_error: Option<String>,
    pub last_updated: DateTime<Local>,
}

impl TaskRuntime {
    /// Milliseconds
    pub fn average_execution_time(&self) -> u64 {
        match self.execution_count {
            0 => 0,
            n => self.total_execution_time / n,
        }
    }

    /// Percentage of successful executions; 100 when nothing has run
    pub fn success_rate(&self) -> f64 {
        if self.execution_count == 0 {
            return 100.0;
        }
        self.success_count as f64 / self.execution_count as f64 * 100.0
    }
}

/// Serializable view of one scheduled task
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSnapshot {
    pub task_id: u64,
    pub name: String,
    pub schedule_type: ScheduleType,
    pub priority: i32,
    pub enabled: bool,
    pub created_at: DateTime<Local>,
    #[serde(flatten)]
    pub runtime: TaskRuntime,
}

pub struct ScheduledTask {
    definition: TaskDefinition,
    schedule: Schedule,
    runtime: Mutex<TaskRuntime>,
    timer: Mutex<Option<TimerHandle>>,
    created_at: DateTime<Local>,
}

impl ScheduledTask {
    pub fn new(definition: TaskDefinition, schedule: Schedule, now: DateTime<Local>) -> Self {
        let status = match schedule {
            Schedule::Event { .. } => TaskExecutionStatus::Waiting,
            _ => TaskExecutionStatus::Scheduled,
        };
        let runtime = TaskRuntime {
            status,
            next_execution_time: schedule.first_execution(now),
            last_execution_time: None,
            execution_count: 0,
            success_count: 0,
            failure_count: 0,
            total_execution_time: 0,
            last_execution_status: None,
            last_execution_error: None,
            last_updated: now,
        };
        Self {
            definition,
            schedule,
            runtime: Mutex::new(runtime),
            timer: Mutex::new(None),
            created_at: now,
        }
    }

    pub fn id(&self) -> u64 {
        self.definition.id
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn definition(&self) -> &TaskDefinition {
        &self.definition
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn status(&self) -> TaskExecutionStatus {
        self.runtime.lock().status
    }

    pub fn set_status(&self, status: TaskExecutionStatus) {
        let mut runtime = self.runtime.lock();
        runtime.status = status;
        runtime.last_updated = Local::now();
    }

    pub fn next_execution_time(&self) -> Option<DateTime<Local>> {
        self.runtime.lock().next_execution_time
    }

    pub fn set_next_execution_time(&self, next: Option<DateTime<Local>>) {
        let mut runtime = self.runtime.lock();
        runtime.next_execution_time = next;
        runtime.last_updated = Local::now();
    }

    pub fn runtime(&self) -> TaskRuntime {
        self.runtime.lock().clone()
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            task_id: self.definition.id,
            name: self.definition.name.clone(),
            schedule_type: self.schedule.schedule_type(),
            priority: self.definition.priority,
            enabled: self.definition.enabled,
            created_at: self.created_at,
            runtime: self.runtime(),
        }
    }

    /// Keep the execution history of the instance this one replaces
    pub(crate) fn carry_over(&self, previous: &ScheduledTask) {
        let old = previous.runtime.lock().clone();
        let mut runtime = self.runtime.lock();
        runtime.last_execution_time = old.last_execution_time;
        runtime.execution_count = old.execution_count;
        runtime.success_count = old.success_count;
        runtime.failure_count = old.failure_count;
        runtime.total_execution_time = old.total_execution_time;
        runtime.last_execution_status = old.last_execution_status;
        runtime.last_execution_error = old.last_execution_error;
    }

    /// Status the task returns to between executions
    fn resting_status(&self) -> TaskExecutionStatus {
        match self.schedule {
            Schedule::Event { .. } => TaskExecutionStatus::Waiting,
            _ => TaskExecutionStatus::Scheduled,
        }
    }

    pub fn can_execute(&self) -> bool {
        self.definition.enabled
            && matches!(self.status(), TaskExecutionStatus::Scheduled | TaskExecutionStatus::Waiting)
    }

    /// Cron tasks are due once `now` has passed the stored next time
    pub fn is_due(&self, now: DateTime<Local>) -> bool {
        self.next_execution_time().is_some_and(|next| now >= next)
    }

    /// Move to Running when executable; false leaves the task untouched
    pub(crate) fn begin_execution(&self) -> bool {
        let mut runtime = self.runtime.lock();
        let executable = self.definition.enabled
            && matches!(runtime.status, TaskExecutionStatus::Scheduled | TaskExecutionStatus::Waiting);
        if executable {
            runtime.status = TaskExecutionStatus::Running;
            runtime.last_updated = Local::now();
        }
        executable
    }

    pub(crate) fn finish_execution(&self, success: bool, elapsed_ms: u64, error: Option<String>) {
        let now = Local::now();
        let mut runtime = self.runtime.lock();
        Self::count_outcome(&mut runtime, now, success, elapsed_ms, error);

        // a pause during the execution wins
        if runtime.status == TaskExecutionStatus::Running {
            runtime.status = self.resting_status();
        }

        if let Schedule::Interval(period) = self.schedule {
            let period = ChronoDuration::from_std(period).unwrap_or_else(|_| ChronoDuration::zero());
            runtime.next_execution_time = Some(runtime.next_execution_time.unwrap_or(now) + period);
        }
        runtime.last_updated = now;
    }

    /// Count an execution that started under the instance this one replaced
    pub(crate) fn record_carried_execution(&self, success: bool, elapsed_ms: u64, error: Option<String>) {
        let now = Local::now();
        let mut runtime = self.runtime.lock();
        Self::count_outcome(&mut runtime, now, success, elapsed_ms, error);
        runtime.last_updated = now;
    }

    fn count_outcome(runtime: &mut TaskRuntime, now: DateTime<Local>, success: bool, elapsed_ms: u64, error: Option<String>) {
        runtime.last_execution_time = Some(now);
        runtime.execution_count += 1;
        runtime.total_execution_time += elapsed_ms;
        if success {
            runtime.success_count += 1;
            runtime.last_execution_status = Some("SUCCESS".to_string());
        } else {
            runtime.failure_count += 1;
            runtime.last_execution_status = Some("FAILED".to_string());
            runtime.last_execution_error = error;
        }
    }

    /// Past the definition's expiry, or a once task a day past its firing
    pub fn is_expired(&self, now: DateTime<Local>) -> bool {
        if self.definition.is_expired(now) {
            return true;
        }
        match self.schedule {
            Schedule::Once(at) => at + ChronoDuration::days(1) < now,
            _ => false,
        }
    }

    pub(crate) fn set_timer(&self, timer: TimerHandle) {
        if let Some(previous) = self.timer.lock().replace(timer) {
            previous.token.cancel();
        }
    }

    /// Stop future firings; returns whether a timer was armed
    pub(crate) fn cancel_timer(&self) -> bool {
        match self.timer.lock().take() {
            Some(timer) => {
                timer.token.cancel();
                drop(timer.handle);
                true
            }
            None => false,
        }
    }

    pub fn has_timer(&self) -> bool {
        self.timer.lock().as_ref().is_some_and(|timer| !timer.token.is_cancelled())
    }
}

impl std::fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("id", &self.definition.id)
            .field("name", &self.definition.name)
            .field("schedule", &self.schedule)
            .field("runtime", &*self.runtime.lock())
            .finish()
    }
}
