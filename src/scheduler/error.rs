//! Scheduler Error Types

use thiserror::Error;

use super::statistics::SchedulerStatus;

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

#[derive(Error, Debug, Clone)]
pub enum SchedulerError {
    /// Schedule configuration is missing a key or holds a bad value
    #[error("Invalid schedule for task {task_id}: {message}")]
    InvalidSchedule { task_id: u64, message: String },

    /// A once-schedule whose execution time has already passed
    #[error("Execution time {execution_time} for task {task_id} is in the past")]
    ExecutionTimeInPast { task_id: u64, execution_time: String },

    #[error("Unsupported schedule type: {schedule_type}")]
    UnsupportedScheduleType { schedule_type: String },

    /// The scheduler is not in a state that accepts tasks
    #[error("Scheduler cannot accept tasks while {status}")]
    NotAccepting { status: SchedulerStatus },

    #[error("Task not found: {task_id}")]
    TaskNotFound { task_id: u64 },

    /// The task body reported a failure
    #[error("Task {task_id} execution failed: {message}")]
    ExecutionFailed { task_id: u64, message: String },

    #[error("Task store error: {message}")]
    StoreFailed { message: String },

    #[error("Scheduler configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Scheduler startup failed: {message}")]
    StartupFailed { message: String },
}

impl SchedulerError {
    pub fn invalid_schedule<S: Into<String>>(task_id: u64, message: S) -> Self {
        Self::InvalidSchedule { task_id, message: message.into() }
    }

    pub fn execution_time_in_past<S: Into<String>>(task_id: u64, execution_time: S) -> Self {
        Self::ExecutionTimeInPast { task_id, execution_time: execution_time.into() }
    }

    pub fn unsupported_schedule_type<S: Into<String>>(schedule_type: S) -> Self {
        Self::UnsupportedScheduleType { schedule_type: schedule_type.into() }
    }

    pub fn not_accepting(status: SchedulerStatus) -> Self {
        Self::NotAccepting { status }
    }

    pub fn task_not_found(task_id: u64) -> Self {
        Self::TaskNotFound { task_id }
    }

    pub fn execution_failed<S: Into<String>>(task_id: u64, message: S) -> Self {
        Self::ExecutionFailed { task_id, message: message.into() }
    }

    pub fn store_failed<S: Into<String>>(message: S) -> Self {
        Self::StoreFailed { message: message.into() }
    }

    pub fn configuration_error<S: Into<String>>(message: S) -> Self {
        Self::ConfigurationError { message: message.into() }
    }

    pub fn startup_failed<S: Into<String>>(message: S) -> Self {
        Self::StartupFailed { message: message.into() }
    }

    /// Rejected at schedule time because of the task's own definition
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            SchedulerError::InvalidSchedule { .. }
                | SchedulerError::ExecutionTimeInPast { .. }
                | SchedulerError::UnsupportedScheduleType { .. }
        )
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self, SchedulerError::ExecutionFailed { .. } | SchedulerError::StoreFailed { .. })
    }

    pub fn is_configuration_error(&self) -> bool {
        matches!(self, SchedulerError::ConfigurationError { .. })
    }
}
