//! Scheduler status and execution statistics.

use std::sync::atomic::{AtomicU64, Ordering};
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchedulerStatus {
    Stopped,
    Starting,
    Running,
    Stopping,
    Paused,
    Error,
}

impl SchedulerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SchedulerStatus::Stopped => "STOPPED",
            SchedulerStatus::Starting => "STARTING",
            SchedulerStatus::Running => "RUNNING",
            SchedulerStatus::Stopping => "STOPPING",
            SchedulerStatus::Paused => "PAUSED",
            SchedulerStatus::Error => "ERROR",
        }
    }

    pub fn is_running(self) -> bool {
        self == SchedulerStatus::Running
    }

    /// Starting counts so that start-up can load the stored tasks
    pub fn can_accept_tasks(self) -> bool {
        matches!(self, SchedulerStatus::Running | SchedulerStatus::Paused | SchedulerStatus::Starting)
    }

    pub fn is_stopped(self) -> bool {
        matches!(self, SchedulerStatus::Stopped | SchedulerStatus::Error)
    }
}

impl std::fmt::Display for SchedulerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheduler-wide execution counters
#[derive(Debug, Default)]
pub struct ExecutionCounters {
    executions: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    total_time: AtomicU64,
    min_time: Mutex<Option<u64>>,
    max_time: Mutex<Option<u64>>,
    last_active: Mutex<Option<DateTime<Local>>>,
}

impl ExecutionCounters {
    pub fn mark_active(&self) {
        *self.last_active.lock() = Some(Local::now());
    }

    pub fn record(&self, success: bool, elapsed_ms: u64) {
        self.executions.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        self.total_time.fetch_add(elapsed_ms, Ordering::Relaxed);
        let mut min = self.min_time.lock();
        *min = Some(min.map_or(elapsed_ms, |m| m.min(elapsed_ms)));
        let mut max = self.max_time.lock();
        *max = Some(max.map_or(elapsed_ms, |m| m.max(elapsed_ms)));
    }

    pub fn executions(&self) -> u64 {
        self.executions.load(Ordering::Relaxed)
    }

    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn average_time(&self) -> u64 {
        match self.executions() {
            0 => 0,
            n => self.total_time.load(Ordering::Relaxed) / n,
        }
    }

    pub fn min_time(&self) -> u64 {
        self.min_time.lock().unwrap_or(0)
    }

    pub fn max_time(&self) -> u64 {
        self.max_time.lock().unwrap_or(0)
    }

    pub fn last_active(&self) -> Option<DateTime<Local>> {
        *self.last_active.lock()
    }
}

/// Point-in-time scheduler report
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatistics {
    pub status: SchedulerStatus,
    pub total_tasks: usize,
    pub scheduled_tasks: usize,
    pub running_tasks: usize,
    pub paused_tasks: usize,
    pub waiting_tasks: usize,
    pub error_tasks: usize,
    pub total_executions: u64,
    pub total_successes: u64,
    pub total_failures: u64,
    /// Milliseconds
    pub average_execution_time: u64,
    pub min_execution_time: u64,
    pub max_execution_time: u64,
    pub start_time: Option<DateTime<Local>>,
    pub last_active_time: Option<DateTime<Local>>,
    pub active_workers: usize,
    pub total_workers: usize,
    pub queued_tasks: usize,
    pub caller_runs: usize,
}

impl SchedulerStatistics {
    /// Percentage of successful executions; 100 when nothing has run
    pub fn success_rate(&self) -> f64 {
        if self.total_executions == 0 {
            return 100.0;
        }
        self.total_successes as f64 / self.total_executions as f64 * 100.0
    }

    pub fn failure_rate(&self) -> f64 {
        if self.total_executions == 0 {
            return 0.0;
        }
        self.total_failures as f64 / self.total_executions as f64 * 100.0
    }

    pub fn uptime_seconds(&self) -> i64 {
        self.start_time
            .map(|start| (Local::now() - start).num_seconds().max(0))
            .unwrap_or(0)
    }

    /// `1d 2h 3m 4s`, leading zero units omitted
    pub fn formatted_uptime(&self) -> String {
        let total = self.uptime_seconds();
        let (days, hours, minutes, seconds) = (total / 86_400, total / 3600 % 24, total / 60 % 60, total % 60);
        if days > 0 {
            format!("{}d {}h {}m {}s", days, hours, minutes, seconds)
        } else if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_acceptance() {
        assert!(SchedulerStatus::Running.can_accept_tasks());
        assert!(SchedulerStatus::Paused.can_accept_tasks());
        assert!(!SchedulerStatus::Stopping.can_accept_tasks());
        assert!(SchedulerStatus::Error.is_stopped());
    }

    #[test]
    fn test_counters() {
        let counters = ExecutionCounters::default();
        assert_eq!(counters.average_time(), 0);
        counters.record(true, 10);
        counters.record(false, 30);
        assert_eq!(counters.executions(), 2);
        assert_eq!(counters.failures(), 1);
        assert_eq!(counters.average_time(), 20);
        assert_eq!(counters.min_time(), 10);
        assert_eq!(counters.max_time(), 30);
    }
}
