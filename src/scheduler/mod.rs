//! Task Scheduling Module
//!
//! Schedules collection tasks with four trigger strategies (fixed interval,
//! cron, external event, one-shot) and runs their bodies on a bounded worker
//! pool. Task definitions come from a [`TaskStore`]; task bodies are run by a
//! [`TaskExecutor`].
//!
//! # Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use devcollect::scheduler::{
//!     MemoryTaskStore, ScheduleType, SchedulerConfig, SchedulerResult, TaskDefinition, TaskExecutor,
//!     TaskScheduler,
//! };
//!
//! struct Noop;
//!
//! #[async_trait::async_trait]
//! impl TaskExecutor for Noop {
//!     async fn execute_task(&self, _task: &TaskDefinition) -> SchedulerResult<()> {
//!         Ok(())
//!     }
//! }
//!
//! # async fn run() -> SchedulerResult<()> {
//! let scheduler = Arc::new(TaskScheduler::new(
//!     SchedulerConfig::default(),
//!     Arc::new(MemoryTaskStore::new()),
//!     Arc::new(Noop),
//! ));
//! scheduler.start().await?;
//! scheduler.schedule_task(
//!     TaskDefinition::new(1, "poll", ScheduleType::Simple)
//!         .with_config("intervalUnit", json!("minutes"))
//!         .with_config("intervalValue", json!(5)),
//! )?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod task;
pub mod schedule;
pub mod scheduled;
pub mod store;
pub mod statistics;
pub mod worker_pool;
pub mod scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use task::{ScheduleType, TaskDefinition, TaskExecutionStatus};
pub use schedule::{CronSchedule, Schedule};
pub use scheduled::{ScheduledTask, TaskRuntime, TaskSnapshot};
pub use store::{ExecutionRecord, MemoryTaskStore, TaskExecutionSummary, TaskExecutor, TaskStore};
pub use statistics::{SchedulerStatistics, SchedulerStatus};
pub use worker_pool::{PoolUsage, WorkerPool};
pub use scheduler::{SchedulerConfig, TaskScheduler};
