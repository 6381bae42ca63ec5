//! Bounded worker pools for fan-out and persistence side-effects.
//!
//! A pool owns a bounded task queue drained by a fixed number of
//! workers, so load spikes cannot spawn an unbounded number of tasks.
//! Submission never blocks: when the queue is full the task runs
//! inline on the caller's path instead, trading latency for no
//! dropped work. A panicking task is caught and logged; the worker
//! keeps draining.

use futures_util::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::{error, warn};

type Task = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// A fixed-size worker pool over a bounded task queue.
pub struct WorkerPool {
    name: &'static str,
    tx: mpsc::Sender<Task>,
}

impl WorkerPool {
    /// Spawn `workers` drainers over a queue of `depth` tasks.
    pub fn new(name: &'static str, workers: usize, depth: usize) -> Self {
        let (tx, rx) = mpsc::channel::<Task>(depth.max(1));
        let rx = Arc::new(Mutex::new(rx));
        for worker in 0..workers.max(1) {
            let rx = Arc::clone(&rx);
            tokio::spawn(async move {
                loop {
                    // Hold the receiver lock only for the dequeue so
                    // workers run tasks concurrently.
                    let task = { rx.lock().await.recv().await };
                    match task {
                        Some(task) => run_guarded(name, worker, task).await,
                        None => break,
                    }
                }
            });
        }
        Self { name, tx }
    }

    /// Enqueue a task, running it inline when the queue is saturated
    /// or the pool is shutting down.
    pub async fn submit(&self, task: impl Future<Output = ()> + Send + 'static) {
        match self.tx.try_send(Box::pin(task)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(task)) => {
                warn!("{} pool saturated, running task inline", self.name);
                run_guarded(self.name, usize::MAX, task).await;
            }
            Err(mpsc::error::TrySendError::Closed(task)) => {
                run_guarded(self.name, usize::MAX, task).await;
            }
        }
    }
}

async fn run_guarded(pool: &str, worker: usize, task: Task) {
    if AssertUnwindSafe(task).catch_unwind().await.is_err() {
        if worker == usize::MAX {
            error!("{} pool: inline task panicked", pool);
        } else {
            error!("{} pool: task panicked in worker {}", pool, worker);
        }
    }
}
