//! Traversal worklist
//!
//! Traversal tasks discover more traversal tasks. Feeding those straight
//! back into the bounded traversal pool from inside a worker can deadlock:
//! with every worker blocked on a full queue, nobody drains it. The
//! worklist breaks the cycle - workers push onto an unbounded channel and
//! a separate pump moves entries into the pool, so only the pump ever
//! feels the pool's backpressure.
//!
//! The worklist also owns the traversal termination signal: a task is
//! outstanding from `push` until `task_done`, and [`Worklist::drained`]
//! resolves once the count returns to zero, meaning the whole tree has
//! been expanded.

use std::sync::Mutex;

use tokio::sync::{mpsc, watch};
use tracing::warn;

use drivemirror_core::domain::{Node, NodeId};

/// One pending visit of a source node against a destination parent.
#[derive(Debug, Clone)]
pub(crate) struct TraversalTask {
    /// Source node to reconcile.
    pub source: Node,
    /// Destination folder the node lands in.
    pub dest_parent: NodeId,
}

/// Unbounded feed of traversal tasks plus the outstanding-task counter.
pub(crate) struct Worklist {
    tx: Mutex<Option<mpsc::UnboundedSender<TraversalTask>>>,
    outstanding: watch::Sender<usize>,
}

impl Worklist {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TraversalTask>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (outstanding, _) = watch::channel(0usize);
        (
            Self {
                tx: Mutex::new(Some(tx)),
                outstanding,
            },
            rx,
        )
    }

    /// Enqueues a task. Never blocks; the channel is unbounded.
    pub fn push(&self, task: TraversalTask) {
        let guard = self.tx.lock().unwrap();
        match guard.as_ref() {
            Some(tx) => {
                self.outstanding.send_modify(|n| *n += 1);
                // Only fails when the receiver is gone, i.e. the run has
                // already been torn down and the task is moot.
                if tx.send(task).is_err() {
                    self.outstanding.send_modify(|n| *n -= 1);
                }
            }
            None => warn!("worklist already closed; dropping traversal task"),
        }
    }

    /// Marks one pushed task as fully processed.
    pub fn task_done(&self) {
        self.outstanding.send_modify(|n| *n -= 1);
    }

    /// Number of tasks pushed but not yet marked done.
    #[cfg(test)]
    pub fn outstanding(&self) -> usize {
        *self.outstanding.borrow()
    }

    /// Resolves once every pushed task has been marked done.
    pub async fn drained(&self) {
        let mut watcher = self.outstanding.subscribe();
        // Cannot fail: `self` owns the sender.
        let _ = watcher.wait_for(|outstanding| *outstanding == 0).await;
    }

    /// Closes the feed so the pump's `recv` ends. Tasks pushed afterwards
    /// are dropped with a warning.
    pub fn close(&self) {
        self.tx.lock().unwrap().take();
    }
}
