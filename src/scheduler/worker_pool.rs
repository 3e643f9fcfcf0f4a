//! Bounded worker pool for task bodies
//!
//! `workers` bodies run at once and up to `queue` more wait for a worker.
//! When both are taken the body runs on the calling task instead, so work is
//! never dropped and the caller is slowed down.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use log::debug;
use tokio::sync::Semaphore;

pub struct WorkerPool {
    workers: usize,
    capacity: usize,
    running: Arc<Semaphore>,
    admission: Arc<Semaphore>,
    queued: Arc<AtomicUsize>,
    caller_runs: AtomicUsize,
}

/// Occupancy snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolUsage {
    pub workers: usize,
    pub active: usize,
    pub queued: usize,
    pub caller_runs: usize,
}

impl WorkerPool {
    pub fn new(workers: usize, queue: usize) -> Self {
        let workers = workers.max(1);
        Self {
            workers,
            capacity: workers + queue,
            running: Arc::new(Semaphore::new(workers)),
            admission: Arc::new(Semaphore::new(workers + queue)),
            queued: Arc::new(AtomicUsize::new(0)),
            caller_runs: AtomicUsize::new(0),
        }
    }

    /// Run `body` on a worker, or on the caller when the pool is saturated
    pub async fn execute<F>(&self, body: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let admitted = match Arc::clone(&self.admission).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                self.caller_runs.fetch_add(1, Ordering::Relaxed);
                debug!("Worker pool saturated, running task on the caller");
                body.await;
                return;
            }
        };

        let running = Arc::clone(&self.running);
        let queued = Arc::clone(&self.queued);
        queued.fetch_add(1, Ordering::Relaxed);
        tokio::spawn(async move {
            let _admitted = admitted;
            let worker = running.acquire_owned().await;
            queued.fetch_sub(1, Ordering::Relaxed);
            if worker.is_ok() {
                body.await;
            }
        });
    }

    pub fn usage(&self) -> PoolUsage {
        PoolUsage {
            workers: self.workers,
            active: self.workers - self.running.available_permits(),
            queued: self.queued.load(Ordering::Relaxed),
            caller_runs: self.caller_runs.load(Ordering::Relaxed),
        }
    }

    /// Wait until no body is running or queued; false on timeout
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let all = u32::try_from(self.capacity).unwrap_or(u32::MAX);
        matches!(tokio::time::timeout(timeout, self.admission.acquire_many(all)).await, Ok(Ok(_)))
    }
}
