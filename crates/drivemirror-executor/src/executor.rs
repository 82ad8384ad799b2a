//! Fixed worker pool with a bounded queue and a reusable idle barrier
//!
//! ## Flow
//!
//! ```text
//! submit() ──→ bounded mpsc ──→ worker loop (×N) ──→ task future
//!     │                              │
//!     └── pending += 1               └── pending -= 1 after the task ends
//! ```
//!
//! The `pending` counter lives in a watch channel so that
//! [`TaskExecutor::await_idle`] can sleep until it reaches zero instead of
//! polling. A task counts as pending from the moment the queue accepts it
//! until its future has resolved, success or failure.

use std::{
    future::Future,
    sync::atomic::{AtomicBool, Ordering},
    sync::Arc,
};

use futures_util::future::BoxFuture;
use thiserror::Error;
use tokio::{
    sync::{mpsc, watch, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

// ============================================================================
// Constants and errors
// ============================================================================

/// Queue slots per worker. A pool of `N` workers accepts `N * 10` queued
/// tasks before `submit` starts suspending its caller.
pub const QUEUE_DEPTH_PER_WORKER: usize = 10;

/// Errors surfaced by [`TaskExecutor`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    /// The executor has been shut down and no longer accepts work.
    #[error("executor is closed")]
    Closed,
}

/// Work envelope consumed by the workers.
enum Envelope {
    /// A task to run.
    Task(BoxFuture<'static, anyhow::Result<()>>),
    /// Orders the receiving worker to exit its loop.
    Stop,
}

// ============================================================================
// TaskExecutor
// ============================================================================

/// A fixed-size pool of asynchronous workers fed from one bounded queue.
///
/// All workers pull from the same queue, so at most `concurrency` tasks run
/// at any instant regardless of how fast producers submit. The queue holds
/// [`QUEUE_DEPTH_PER_WORKER`] entries per worker; beyond that, `submit`
/// suspends the producer until a slot frees up.
///
/// ## Failure isolation
///
/// A task that resolves to `Err` is logged and forgotten; it never takes a
/// worker down or affects sibling tasks. Tasks are expected to report
/// failures through their `Result` rather than panic - a panicking task
/// kills its worker.
///
/// ## Lifecycle
///
/// [`shutdown`](TaskExecutor::shutdown) is graceful and idempotent: tasks
/// already accepted still run, each worker then consumes exactly one stop
/// order and exits, and every call returns only once the pool is gone.
/// Dropping the executor without a shutdown also terminates the workers,
/// because closing the queue wakes them with an empty read.
pub struct TaskExecutor {
    /// Sender side of the bounded work queue.
    queue_tx: mpsc::Sender<Envelope>,
    /// Receiver shared by all workers; locked again by `shutdown` to drain
    /// stragglers once the workers are gone.
    queue_rx: Arc<Mutex<mpsc::Receiver<Envelope>>>,
    /// Count of accepted-but-unfinished tasks, observed by `await_idle`.
    pending: Arc<watch::Sender<usize>>,
    /// Set when shutdown begins; later submits are rejected.
    closed: AtomicBool,
    /// Worker join handles, drained by the first shutdown call.
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
}

impl TaskExecutor {
    // ========================================================================
    // Construction
    // ========================================================================

    /// Creates a pool of `concurrency` workers.
    ///
    /// A `concurrency` of zero is treated as one: a pool that can never
    /// run anything would turn the first `submit` into a deadlock.
    #[must_use]
    pub fn new(concurrency: usize) -> Self {
        let worker_count = concurrency.max(1);
        let (queue_tx, queue_rx) = mpsc::channel(worker_count * QUEUE_DEPTH_PER_WORKER);
        let queue_rx = Arc::new(Mutex::new(queue_rx));
        let (pending, _) = watch::channel(0usize);
        let pending = Arc::new(pending);

        let workers = (0..worker_count)
            .map(|worker_id| tokio::spawn(worker_loop(worker_id, queue_rx.clone(), pending.clone())))
            .collect();

        info!(workers = worker_count, "task executor started");

        Self {
            queue_tx,
            queue_rx,
            pending,
            closed: AtomicBool::new(false),
            workers: Mutex::new(workers),
            worker_count,
        }
    }

    // ========================================================================
    // Submission
    // ========================================================================

    /// Submits a unit of work to the pool.
    ///
    /// Returns as soon as the queue accepts the task; the task itself runs
    /// whenever a worker picks it up. When the queue is full this method
    /// suspends the caller until a slot opens, which is the backpressure
    /// that keeps producers from outrunning the pool.
    ///
    /// Cancelling a `submit` future while it waits for a slot is safe: the
    /// task is either fully accepted or not at all.
    ///
    /// # Errors
    ///
    /// [`ExecutorError::Closed`] once [`shutdown`](TaskExecutor::shutdown)
    /// has been called.
    pub async fn submit<F>(&self, task: F) -> Result<(), ExecutorError>
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ExecutorError::Closed);
        }

        // Reserve first: between the reservation and the send there is no
        // await point, so the pending count and the queue cannot diverge
        // even if the caller drops this future mid-wait.
        let permit = self
            .queue_tx
            .reserve()
            .await
            .map_err(|_| ExecutorError::Closed)?;
        self.pending.send_modify(|n| *n += 1);
        permit.send(Envelope::Task(Box::pin(task)));
        Ok(())
    }

    // ========================================================================
    // Idle barrier
    // ========================================================================

    /// Waits until every accepted task has finished.
    ///
    /// Returns immediately when nothing is pending. The barrier is
    /// reusable: new work may be submitted afterwards, and a later call
    /// waits for that work too.
    pub async fn await_idle(&self) {
        let mut watcher = self.pending.subscribe();
        // Cannot fail: `self` keeps the sender alive for the whole wait.
        let _ = watcher.wait_for(|pending| *pending == 0).await;
    }

    /// Number of accepted tasks that have not finished yet.
    #[must_use]
    pub fn pending_tasks(&self) -> usize {
        *self.pending.borrow()
    }

    /// Whether `shutdown` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    // ========================================================================
    // Shutdown
    // ========================================================================

    /// Stops the pool.
    ///
    /// Tasks already in the queue still run; behind them, each worker
    /// receives exactly one stop order and exits. The method returns once
    /// every worker has terminated.
    ///
    /// Safe to call repeatedly and concurrently: only the first call emits
    /// stop orders, and every call waits for the workers to be gone before
    /// returning.
    pub async fn shutdown(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            info!(workers = self.worker_count, "task executor shutting down");
            for _ in 0..self.worker_count {
                // Cannot fail: the shared receiver outlives `self`.
                let _ = self.queue_tx.send(Envelope::Stop).await;
            }
        }

        // The lock also serializes overlapping shutdown calls: a second
        // caller parks here until the first has joined every worker.
        let mut workers = self.workers.lock().await;
        for handle in workers.drain(..) {
            if let Err(err) = handle.await {
                warn!(error = %err, "executor worker terminated abnormally");
            }
        }
        drop(workers);

        // A submit that raced past the closed check may have parked a task
        // behind the stop orders. Nobody will run it; account for it so
        // `await_idle` cannot hang on a count that never reaches zero.
        let mut queue = self.queue_rx.lock().await;
        while let Ok(envelope) = queue.try_recv() {
            if matches!(envelope, Envelope::Task(_)) {
                debug!("discarding task submitted during shutdown");
                self.pending.send_modify(|n| *n -= 1);
            }
        }
    }
}

// ============================================================================
// Worker loop
// ============================================================================

/// Body of one worker: take an envelope, run it, repeat until stopped.
async fn worker_loop(
    worker_id: usize,
    queue_rx: Arc<Mutex<mpsc::Receiver<Envelope>>>,
    pending: Arc<watch::Sender<usize>>,
) {
    debug!(worker_id, "executor worker started");
    loop {
        // Hold the lock only to take one envelope. Holding it across the
        // task itself would serialize the whole pool.
        let envelope = {
            let mut rx = queue_rx.lock().await;
            rx.recv().await
        };
        match envelope {
            Some(Envelope::Task(task)) => {
                if let Err(err) = task.await {
                    warn!(worker_id, error = %err, "task failed");
                }
                pending.send_modify(|n| *n -= 1);
            }
            Some(Envelope::Stop) | None => break,
        }
    }
    debug!(worker_id, "executor worker stopped");
}

// ============================================================================
// Unit tests
// ============================================================================
