//! Task Scheduler
//!
//! Owns one [`ScheduledTask`] per task id and drives it with a timer task:
//!
//! - **Simple**: fires immediately, then at a fixed rate
//! - **Cron**: a checker wakes every `cron_check_interval` and fires once the
//!   stored next time has passed, recomputing the following one on the spot
//! - **Event**: no timer; fired through [`TaskScheduler::trigger_event`]
//! - **Once**: a single delayed firing
//!
//! Firings hand the task body to a bounded [`WorkerPool`]. Cancelling or
//! pausing a task stops its future firings but never interrupts a running
//! execution, and the same task id never executes twice at once.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use chrono::Local;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::FutureExt;
use log::{debug, error, info, warn};
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::error::{SchedulerError, SchedulerResult};
use super::schedule::Schedule;
use super::scheduled::{ScheduledTask, TaskSnapshot, TimerHandle};
use super::statistics::{ExecutionCounters, SchedulerStatistics, SchedulerStatus};
use super::store::{ExecutionRecord, TaskExecutor, TaskStore};
use super::task::{TaskDefinition, TaskExecutionStatus};
use super::worker_pool::WorkerPool;
use crate::plugin::base::panic_message;

/// Scheduler settings
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// Concurrent task executions
    pub thread_pool_size: usize,
    /// Executions waiting for a worker before callers run them inline
    pub max_queue_size: usize,
    /// How long `stop` waits for in-flight executions
    pub keep_alive: Duration,
    pub cleanup_interval: Duration,
    pub cron_check_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            thread_pool_size: 10,
            max_queue_size: 100,
            keep_alive: Duration::from_secs(60),
            cleanup_interval: Duration::from_secs(30 * 60),
            cron_check_interval: Duration::from_secs(1),
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> SchedulerResult<()> {
        if self.thread_pool_size == 0 {
            return Err(SchedulerError::configuration_error("thread-pool-size must be at least 1"));
        }
        if self.cleanup_interval.is_zero() {
            return Err(SchedulerError::configuration_error("cleanup interval must be greater than zero"));
        }
        if self.cron_check_interval.is_zero() {
            return Err(SchedulerError::configuration_error("cron check interval must be greater than zero"));
        }
        Ok(())
    }
}

/// Runs task bodies and accounts for them
struct Dispatcher {
    executor: Arc<dyn TaskExecutor>,
    store: Arc<dyn TaskStore>,
    pool: WorkerPool,
    counters: ExecutionCounters,
    in_flight: DashMap<u64, ()>,
    tasks: Arc<DashMap<u64, Arc<ScheduledTask>>>,
}

impl Dispatcher {
    async fn dispatch(self: &Arc<Self>, task: Arc<ScheduledTask>) {
        let dispatcher = Arc::clone(self);
        self.pool.execute(async move { dispatcher.execute_task(task).await }).await;
    }

    async fn execute_task(&self, task: Arc<ScheduledTask>) {
        let task_id = task.id();
        if self.in_flight.insert(task_id, ()).is_some() {
            debug!("Task {} is still executing, skipping this firing", task_id);
            return;
        }
        if !task.begin_execution() {
            debug!("Task {} is not executable ({}), skipping", task_id, task.status());
            self.in_flight.remove(&task_id);
            return;
        }

        self.counters.mark_active();
        debug!("Executing task: taskId={}, name={}", task_id, task.name());
        let started = Instant::now();
        let outcome = AssertUnwindSafe(self.executor.execute_task(task.definition()))
            .catch_unwind()
            .await;
        let elapsed = started.elapsed().as_millis() as u64;

        let error = match outcome {
            Ok(Ok(())) => {
                debug!("Task {} executed in {}ms", task_id, elapsed);
                None
            }
            Ok(Err(e)) => {
                error!("Task execution failed: taskId={}, name={}: {}", task_id, task.name(), e);
                Some(e.to_string())
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!("Task execution panicked: taskId={}, name={}: {}", task_id, task.name(), message);
                Some(message)
            }
        };
        let success = error.is_none();

        self.counters.record(success, elapsed);
        // the map guard keeps a concurrent reschedule from copying stale counters
        match self.tasks.get(&task_id) {
            Some(current) if !Arc::ptr_eq(current.value(), &task) => {
                task.finish_execution(success, elapsed, error.clone());
                current.record_carried_execution(success, elapsed, error.clone());
            }
            _ => task.finish_execution(success, elapsed, error.clone()),
        }

        let record = ExecutionRecord {
            task_id,
            success,
            duration: elapsed,
            error_message: error,
            executed_at: Local::now(),
        };
        if let Err(e) = self.store.record_execution(&record).await {
            warn!("Failed to record execution of task {}: {}", task_id, e);
        }
        self.in_flight.remove(&task_id);
    }
}

pub struct TaskScheduler {
    config: SchedulerConfig,
    store: Arc<dyn TaskStore>,
    dispatcher: Arc<Dispatcher>,
    tasks: Arc<DashMap<u64, Arc<ScheduledTask>>>,
    status: RwLock<SchedulerStatus>,
    start_time: Mutex<Option<chrono::DateTime<Local>>>,
    shutdown: Mutex<CancellationToken>,
    housekeeping: Mutex<Option<JoinHandle<()>>>,
}

impl TaskScheduler {
    pub fn new(config: SchedulerConfig, store: Arc<dyn TaskStore>, executor: Arc<dyn TaskExecutor>) -> Self {
        let tasks = Arc::new(DashMap::new());
        let dispatcher = Dispatcher {
            executor,
            store: Arc::clone(&store),
            pool: WorkerPool::new(config.thread_pool_size, config.max_queue_size),
            counters: ExecutionCounters::default(),
            in_flight: DashMap::new(),
            tasks: Arc::clone(&tasks),
        };
        Self {
            config,
            store,
            dispatcher: Arc::new(dispatcher),
            tasks,
            status: RwLock::new(SchedulerStatus::Stopped),
            start_time: Mutex::new(None),
            shutdown: Mutex::new(CancellationToken::new()),
            housekeeping: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn status(&self) -> SchedulerStatus {
        *self.status.read()
    }

    fn set_status(&self, status: SchedulerStatus) {
        *self.status.write() = status;
    }

    /// Validate the configuration, load every active stored task and start housekeeping
    pub async fn start(self: &Arc<Self>) -> SchedulerResult<()> {
        if self.status().is_running() {
            warn!("Task scheduler is already running");
            return Ok(());
        }

        self.set_status(SchedulerStatus::Starting);
        info!("Starting task scheduler...");
        if let Err(e) = self.config.validate() {
            error!("Task scheduler failed to start: {}", e);
            self.set_status(SchedulerStatus::Error);
            return Err(SchedulerError::startup_failed(e.to_string()));
        }
        *self.shutdown.lock() = CancellationToken::new();

        match self.reload_all_tasks().await {
            Ok(count) => info!("Loaded {} tasks", count),
            Err(e) => error!("Failed to load tasks: {}", e),
        }

        self.spawn_housekeeping();
        *self.start_time.lock() = Some(Local::now());
        self.set_status(SchedulerStatus::Running);
        info!("Task scheduler started with {} workers", self.config.thread_pool_size);
        Ok(())
    }

    fn spawn_housekeeping(self: &Arc<Self>) {
        let token = self.shutdown.lock().child_token();
        let scheduler: Weak<Self> = Arc::downgrade(self);
        let period = self.config.cleanup_interval;

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        let Some(scheduler) = scheduler.upgrade() else { break };
                        if scheduler.status().is_running() {
                            scheduler.cleanup_expired_tasks();
                        }
                    }
                }
            }
        });
        *self.housekeeping.lock() = Some(handle);
    }

    /// Cancel every timer, wait for running executions and forget all tasks
    pub async fn stop(&self) {
        if self.status().is_stopped() {
            return;
        }
        self.set_status(SchedulerStatus::Stopping);
        info!("Stopping task scheduler...");

        self.shutdown.lock().cancel();
        for task in self.tasks.iter() {
            task.cancel_timer();
        }
        let housekeeping = self.housekeeping.lock().take();
        if let Some(handle) = housekeeping {
            if handle.await.is_err() {
                warn!("Scheduler housekeeping ended abnormally");
            }
        }
        if !self.dispatcher.pool.wait_idle(self.config.keep_alive).await {
            warn!("Task executions still running after {:?}", self.config.keep_alive);
        }

        self.tasks.clear();
        self.set_status(SchedulerStatus::Stopped);
        info!("Task scheduler stopped");
    }

    /// Schedule a task, superseding any existing schedule for the same id.
    ///
    /// The schedule is validated before the existing one is touched, so a bad
    /// reschedule leaves the current schedule in place.
    pub fn schedule_task(&self, definition: TaskDefinition) -> SchedulerResult<()> {
        let status = self.status();
        if !status.can_accept_tasks() {
            return Err(SchedulerError::not_accepting(status));
        }

        let now = Local::now();
        let schedule = Schedule::parse(&definition, now).map_err(|e| {
            error!("Failed to schedule task {}: {}", definition.id, e);
            e
        })?;
        let task_id = definition.id;
        info!("Scheduling task: taskId={}, name={}, scheduleType={}", task_id, definition.name, definition.schedule_type);
        let task = Arc::new(ScheduledTask::new(definition, schedule, now));

        match self.tasks.entry(task_id) {
            Entry::Occupied(mut entry) => {
                entry.get().cancel_timer();
                task.carry_over(entry.get());
                self.arm(&task);
                entry.insert(Arc::clone(&task));
            }
            Entry::Vacant(entry) => {
                self.arm(&task);
                entry.insert(Arc::clone(&task));
            }
        }

        info!("Task scheduled: taskId={}, nextExecutionTime={:?}", task_id, task.next_execution_time());
        Ok(())
    }

    pub fn reschedule_task(&self, definition: TaskDefinition) -> SchedulerResult<()> {
        self.schedule_task(definition)
    }

    fn arm(&self, task: &Arc<ScheduledTask>) {
        let token = self.shutdown.lock().child_token();
        let handle = match task.schedule() {
            Schedule::Event { event_type } => {
                info!("Event task {} waiting for '{}'", task.id(), event_type);
                return;
            }
            Schedule::Interval(period) => self.spawn_interval_timer(task, *period, token.clone()),
            Schedule::Cron(_) => self.spawn_cron_checker(task, token.clone()),
            Schedule::Once(at) => {
                let delay = (*at - Local::now()).to_std().unwrap_or(Duration::ZERO);
                self.spawn_once_timer(task, delay, token.clone())
            }
        };
        task.set_timer(TimerHandle { token, handle });
    }

    fn spawn_interval_timer(&self, task: &Arc<ScheduledTask>, period: Duration, token: CancellationToken) -> JoinHandle<()> {
        let task = Arc::clone(task);
        let dispatcher = Arc::clone(&self.dispatcher);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => dispatcher.dispatch(Arc::clone(&task)).await,
                }
            }
        })
    }

    fn spawn_cron_checker(&self, task: &Arc<ScheduledTask>, token: CancellationToken) -> JoinHandle<()> {
        let task = Arc::clone(task);
        let dispatcher = Arc::clone(&self.dispatcher);
        let period = self.config.cron_check_interval;
        tokio::spawn(async move {
            let Schedule::Cron(cron) = task.schedule() else { return };
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        let now = Local::now();
                        if task.can_execute() && task.is_due(now) {
                            task.set_next_execution_time(cron.next_after(now));
                            dispatcher.dispatch(Arc::clone(&task)).await;
                        }
                    }
                }
            }
        })
    }

    fn spawn_once_timer(&self, task: &Arc<ScheduledTask>, delay: Duration, token: CancellationToken) -> JoinHandle<()> {
        let task = Arc::clone(task);
        let dispatcher = Arc::clone(&self.dispatcher);
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => dispatcher.dispatch(task).await,
            }
        })
    }

    /// Stop and forget a task; returns whether it was scheduled
    pub fn cancel_task(&self, task_id: u64) -> bool {
        match self.tasks.remove(&task_id) {
            Some((_, task)) => {
                if task.cancel_timer() {
                    info!("Cancelled task schedule: taskId={}", task_id);
                }
                true
            }
            None => false,
        }
    }

    /// Stop firing a task but keep its bookkeeping
    pub fn pause_task(&self, task_id: u64) -> bool {
        let Some(task) = self.tasks.get(&task_id).map(|task| Arc::clone(task.value())) else {
            return false;
        };
        task.set_status(TaskExecutionStatus::Paused);
        task.cancel_timer();
        info!("Paused task: taskId={}", task_id);
        true
    }

    /// Re-schedule a paused task from its stored definition
    pub fn resume_task(&self, task_id: u64) -> SchedulerResult<bool> {
        let Some(task) = self.tasks.get(&task_id).map(|task| Arc::clone(task.value())) else {
            return Err(SchedulerError::task_not_found(task_id));
        };
        if task.status() != TaskExecutionStatus::Paused {
            return Ok(false);
        }
        self.schedule_task(task.definition().clone())?;
        info!("Resumed task: taskId={}", task_id);
        Ok(true)
    }

    /// Pause every task and mark the scheduler paused
    pub fn pause_all_tasks(&self) -> usize {
        let ids = self.get_scheduled_task_ids();
        let paused = ids.into_iter().filter(|id| self.pause_task(*id)).count();
        if self.status().is_running() {
            self.set_status(SchedulerStatus::Paused);
        }
        paused
    }

    /// Resume every paused task and mark the scheduler running again
    pub fn resume_all_tasks(&self) -> usize {
        let mut resumed = 0;
        for id in self.get_scheduled_task_ids() {
            match self.resume_task(id) {
                Ok(true) => resumed += 1,
                Ok(false) => {}
                Err(e) => warn!("Failed to resume task {}: {}", id, e),
            }
        }
        if self.status() == SchedulerStatus::Paused {
            self.set_status(SchedulerStatus::Running);
        }
        resumed
    }

    /// Drop all scheduling state and schedule every active stored task again.
    ///
    /// Tasks whose schedule is invalid are logged and skipped. Returns the
    /// number of tasks scheduled.
    pub async fn reload_all_tasks(&self) -> SchedulerResult<usize> {
        let status = self.status();
        if !status.can_accept_tasks() {
            warn!("Scheduler cannot reload tasks while {}", status);
            return Ok(0);
        }

        info!("Reloading all enabled tasks...");
        for task in self.tasks.iter() {
            task.cancel_timer();
        }
        self.tasks.clear();

        let definitions = self.store.load_active_tasks().await?;
        let mut scheduled = 0;
        for definition in definitions {
            let task_id = definition.id;
            match self.schedule_task(definition) {
                Ok(()) => scheduled += 1,
                Err(e) => warn!("Skipping task {}: {}", task_id, e),
            }
        }
        info!("Reloaded {} tasks", scheduled);
        Ok(scheduled)
    }

    /// Remove expired tasks, cancelling their timers first
    pub fn cleanup_expired_tasks(&self) -> usize {
        let now = Local::now();
        let expired: Vec<u64> = self
            .tasks
            .iter()
            .filter(|task| task.is_expired(now))
            .map(|task| task.id())
            .collect();
        for task_id in &expired {
            if let Some((_, task)) = self.tasks.remove(task_id) {
                task.cancel_timer();
                info!("Removed expired task: taskId={}, name={}", task_id, task.name());
            }
        }
        if !expired.is_empty() {
            info!("Expired task cleanup removed {} tasks", expired.len());
        }
        expired.len()
    }

    /// Fire every waiting event task registered for `event_type`
    pub async fn trigger_event(&self, event_type: &str) -> usize {
        let matching: Vec<Arc<ScheduledTask>> = self
            .tasks
            .iter()
            .filter(|task| {
                matches!(task.schedule(), Schedule::Event { event_type: e } if e == event_type)
                    && task.status() == TaskExecutionStatus::Waiting
            })
            .map(|task| Arc::clone(task.value()))
            .collect();

        debug!("Event '{}' triggers {} tasks", event_type, matching.len());
        for task in &matching {
            self.dispatcher.dispatch(Arc::clone(task)).await;
        }
        matching.len()
    }

    pub fn get_scheduled_task_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.tasks.iter().map(|task| *task.key()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn is_task_scheduled(&self, task_id: u64) -> bool {
        self.tasks.contains_key(&task_id)
    }

    pub fn get_next_execution_time(&self, task_id: u64) -> Option<chrono::DateTime<Local>> {
        self.tasks.get(&task_id).and_then(|task| task.next_execution_time())
    }

    pub fn get_task(&self, task_id: u64) -> Option<TaskSnapshot> {
        self.tasks.get(&task_id).map(|task| task.snapshot())
    }

    /// Snapshots of every scheduled task, ordered by id
    pub fn task_snapshots(&self) -> Vec<TaskSnapshot> {
        let mut snapshots: Vec<TaskSnapshot> = self.tasks.iter().map(|task| task.snapshot()).collect();
        snapshots.sort_by_key(|snapshot| snapshot.task_id);
        snapshots
    }

    pub fn get_statistics(&self) -> SchedulerStatistics {
        let statuses: Vec<TaskExecutionStatus> = self.tasks.iter().map(|task| task.status()).collect();
        let count = |status: TaskExecutionStatus| statuses.iter().filter(|s| **s == status).count();
        let counters = &self.dispatcher.counters;
        let usage = self.dispatcher.pool.usage();

        SchedulerStatistics {
            status: self.status(),
            total_tasks: statuses.len(),
            scheduled_tasks: count(TaskExecutionStatus::Scheduled),
            running_tasks: count(TaskExecutionStatus::Running),
            paused_tasks: count(TaskExecutionStatus::Paused),
            waiting_tasks: count(TaskExecutionStatus::Waiting),
            error_tasks: count(TaskExecutionStatus::Failed),
            total_executions: counters.executions(),
            total_successes: counters.successes(),
            total_failures: counters.failures(),
            average_execution_time: counters.average_time(),
            min_execution_time: counters.min_time(),
            max_execution_time: counters.max_time(),
            start_time: *self.start_time.lock(),
            last_active_time: counters.last_active(),
            active_workers: usage.active,
            total_workers: usage.workers,
            queued_tasks: usage.queued,
            caller_runs: usage.caller_runs,
        }
    }
}
