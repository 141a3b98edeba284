//! Process-pool scheduler
//!
//! Keeps a FIFO of pending suites and at most `capacity` live worker
//! processes. A slot is a semaphore permit held by the worker's monitor task,
//! so a slot frees up the moment a worker exits.

use futures::future::join_all;
use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use super::error::PoolError;
use super::handle::{Spawner, WorkerHandle};
use crate::models::Suite;

/// Default bound on waiting for a free slot
pub const DEFAULT_PROCESS_TIMEOUT: Duration = Duration::from_secs(1800);

/// Number of execution units available on this host
pub fn host_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// Configured pool size, or the host level when `processes <= 0`
pub fn resolve_capacity(processes: i32, host: impl FnOnce() -> usize) -> usize {
    if processes > 0 {
        processes as usize
    } else {
        host().max(1)
    }
}

/// Bounded pool of worker processes
pub struct Scheduler {
    capacity: usize,
    process_timeout: Duration,
    queue: VecDeque<Suite>,
    slots: Arc<Semaphore>,
    workers: Vec<WorkerHandle>,
    spawner: Arc<dyn Spawner>,
    spawned: usize,
    peak_live: usize,
}

impl Scheduler {
    pub fn new(processes: i32, spawner: Arc<dyn Spawner>) -> Self {
        Self::with_host(processes, spawner, host_parallelism)
    }

    /// Like [`Scheduler::new`] with an explicit host-parallelism source
    pub fn with_host(
        processes: i32,
        spawner: Arc<dyn Spawner>,
        host: impl FnOnce() -> usize,
    ) -> Self {
        let capacity = resolve_capacity(processes, host);

        Self {
            capacity,
            process_timeout: DEFAULT_PROCESS_TIMEOUT,
            queue: VecDeque::new(),
            slots: Arc::new(Semaphore::new(capacity)),
            workers: Vec::new(),
            spawner,
            spawned: 0,
            peak_live: 0,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.process_timeout = timeout;
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn process_timeout(&self) -> Duration {
        self.process_timeout
    }

    /// Enqueue a suite
    pub fn add_task(&mut self, suite: Suite) {
        self.queue.push_back(suite);
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn spawned(&self) -> usize {
        self.spawned
    }

    pub fn live_count(&self) -> usize {
        self.workers.iter().filter(|w| w.is_alive()).count()
    }

    /// Highest number of simultaneously live workers seen by `serve`
    pub fn peak_live(&self) -> usize {
        self.peak_live
    }

    /// Workers still tracked (finished ones are pruned as slots are reused)
    pub fn tracked(&self) -> &[WorkerHandle] {
        &self.workers
    }

    /// Drain the queue, starting one worker per suite as slots allow
    pub async fn serve(&mut self) -> Result<(), PoolError> {
        info!(
            "Serving {} suites with {} worker processes",
            self.queue.len(),
            self.capacity
        );

        while !self.queue.is_empty() {
            let permit = self.acquire_slot().await?;

            let Some(suite) = self.queue.pop_front() else {
                break;
            };

            let child = self
                .spawner
                .spawn(&suite)
                .map_err(|source| PoolError::Spawn {
                    suite: suite.name.clone(),
                    source,
                })?;

            self.spawned += 1;
            let handle = WorkerHandle::watch(self.spawned, &suite.name, child, permit);
            debug!(
                "Started worker {} (pid {:?}) for suite '{}'",
                handle.id(),
                handle.pid(),
                suite.name
            );
            self.workers.push(handle);

            self.peak_live = self.peak_live.max(self.live_count());
        }

        debug!("Queue drained after {} spawns", self.spawned);
        Ok(())
    }

    /// Wait for a free slot, bounded by the process timeout
    async fn acquire_slot(&mut self) -> Result<OwnedSemaphorePermit, PoolError> {
        let acquired =
            tokio::time::timeout(self.process_timeout, self.slots.clone().acquire_owned()).await;

        match acquired {
            Ok(Ok(permit)) => {
                self.prune();
                Ok(permit)
            }
            Ok(Err(_)) => Err(PoolError::Destroyed),
            Err(_) => {
                warn!(
                    "No worker finished within {:?}, terminating {} workers",
                    self.process_timeout,
                    self.live_count()
                );
                self.destroy();
                Err(PoolError::Timeout {
                    timeout: self.process_timeout,
                })
            }
        }
    }

    /// Drop handles of workers that have already exited
    fn prune(&mut self) {
        let before = self.workers.len();
        self.workers.retain(|w| w.is_alive());
        let pruned = before - self.workers.len();
        if pruned > 0 {
            debug!("Pruned {} finished workers", pruned);
        }
    }

    /// Force-terminate every tracked worker and stop handing out slots
    pub fn destroy(&mut self) {
        self.slots.close();
        for worker in &mut self.workers {
            if worker.is_alive() {
                debug!("Terminating worker {} ({})", worker.id(), worker.suite());
            }
            worker.terminate();
        }
    }

    /// Wait for every tracked worker to exit
    pub async fn close(&mut self) {
        join_all(self.workers.iter_mut().map(|w| w.join())).await;
        debug!("All {} tracked workers reaped", self.workers.len());
    }
}
