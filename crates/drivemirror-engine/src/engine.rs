//! Tree mirroring orchestrator
//!
//! Walks the source tree and decides, per node, between copying it
//! wholesale and descending into it, then drives the resulting copy jobs
//! to terminal states. Traversal and copying run on two separate worker
//! pools so a slow copy backend cannot stall discovery and vice versa.
//!
//! ## Flow
//!
//! ```text
//! worklist (unbounded) ──► pump ──► traversal executor ──► visit()
//!     ▲                                                      │
//!     └── children of visited folders ──────────────────────┘
//!                                                            │
//!                              copy jobs ──► copy executor ──► OperationMonitor
//! ```
//!
//! Traversal tasks never submit to their own executor: its intake queue
//! is bounded, and a worker blocking on a full queue while peers wait
//! for the tasks it would produce is a deadlock. Discovered work goes to
//! the unbounded worklist instead, and a single pump task forwards it.
//!
//! ## Per-node decision
//!
//! Files are always scheduled as copy jobs. For a folder, in order:
//! a same-named folder at the destination means merge (descend, reusing
//! the existing folder); a cumulative size within the threshold means
//! one whole-subtree copy job; otherwise the folder is created at the
//! destination and its children are traversed against the new id. A
//! folder with no reported size is treated as oversized.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Context;
use serde::Serialize;
use tracing::{debug, info, warn};

use drivemirror_core::domain::{
    ConflictBehavior, CopyDestination, CopySource, MirrorCounters, MirrorMode, Node, NodeId,
    NodeKind, TraversalError,
};
use drivemirror_core::ports::{IStatusSink, ITreeService};
use drivemirror_executor::TaskExecutor;

use crate::cache::DestinationFolderCache;
use crate::monitor::{CopyRequest, MonitorOptions, OperationMonitor, DEFAULT_POLL_INTERVAL};
use crate::refresh::RefreshCoordinator;
use crate::worklist::{TraversalTask, Worklist};

/// Folders at or below this cumulative size are copied wholesale by
/// default.
pub const DEFAULT_WHOLE_FOLDER_THRESHOLD: u64 = 256 * 1024 * 1024;

// ============================================================================
// Options and report
// ============================================================================

/// Tuning for one mirroring run.
#[derive(Debug, Clone)]
pub struct MirrorOptions {
    /// Worker count of the traversal executor.
    pub traversal_concurrency: usize,
    /// Worker count of the copy executor.
    pub copy_concurrency: usize,
    /// Cumulative size (bytes) up to which a folder is copied wholesale
    /// instead of being created and descended into.
    pub whole_folder_threshold: u64,
    /// Conflict directive attached to every copy request.
    pub conflict: ConflictBehavior,
    /// Submit copy jobs as discovered, or hold them until traversal
    /// finishes.
    pub mode: MirrorMode,
    /// Poll cadence for pending copy operations without a service hint.
    pub poll_interval: Duration,
    /// Opt-in completion heuristic for authorization denials observed
    /// after real progress; see [`MonitorOptions`].
    pub assume_complete_on_denied_progress: bool,
    /// Walk and count without creating or copying anything.
    pub dry_run: bool,
}

impl Default for MirrorOptions {
    fn default() -> Self {
        Self {
            traversal_concurrency: 4,
            copy_concurrency: 4,
            whole_folder_threshold: DEFAULT_WHOLE_FOLDER_THRESHOLD,
            conflict: ConflictBehavior::Fail,
            mode: MirrorMode::Interleaved,
            poll_interval: DEFAULT_POLL_INTERVAL,
            assume_complete_on_denied_progress: false,
            dry_run: false,
        }
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct MirrorReport {
    /// Copy jobs discovered.
    pub jobs_total: u64,
    /// Jobs that reached terminal success.
    pub jobs_completed: u64,
    /// Jobs that reached terminal failure.
    pub jobs_failed: u64,
    /// Destination folders created.
    pub folders_created: u64,
    /// Wall-clock duration of the run.
    pub duration_ms: u64,
    /// Per-node diagnostics for every traversal and copy failure.
    pub errors: Vec<String>,
}

// ============================================================================
// MirrorEngine
// ============================================================================

/// Orchestrates one mirroring run between two accounts.
///
/// Holds the pieces shared by all workers: the two service sessions,
/// the destination folder cache, the operation monitor, and the run
/// counters. Construct one engine per run; counters and collected
/// errors are not reset between runs.
pub struct MirrorEngine {
    source: Arc<dyn ITreeService>,
    dest: Arc<dyn ITreeService>,
    monitor: OperationMonitor,
    cache: DestinationFolderCache,
    counters: MirrorCounters,
    sink: Arc<dyn IStatusSink>,
    options: MirrorOptions,
    errors: Mutex<Vec<String>>,
}

impl MirrorEngine {
    /// # Arguments
    ///
    /// * `source` - session enumerating the tree being mirrored
    /// * `dest` - session owning the destination; creates, copies and
    ///   polls all go through it
    /// * `refresh` - single-flight refresh gate for the destination
    ///   credential
    /// * `sink` - receives a counter snapshot on every change
    #[must_use]
    pub fn new(
        source: Arc<dyn ITreeService>,
        dest: Arc<dyn ITreeService>,
        refresh: Arc<RefreshCoordinator>,
        sink: Arc<dyn IStatusSink>,
        options: MirrorOptions,
    ) -> Self {
        let monitor = OperationMonitor::new(
            dest.clone(),
            refresh,
            MonitorOptions {
                poll_interval: options.poll_interval,
                assume_complete_on_denied_progress: options.assume_complete_on_denied_progress,
            },
        );
        let cache = DestinationFolderCache::new(dest.clone());
        Self {
            source,
            dest,
            monitor,
            cache,
            counters: MirrorCounters::new(),
            sink,
            options,
            errors: Mutex::new(Vec::new()),
        }
    }

    /// Mirrors `source_root` into the destination folder `dest_root`.
    ///
    /// Individual node and job failures are recorded and skipped; the
    /// run continues past them and they surface in the report.
    ///
    /// # Errors
    ///
    /// Returns an error when `dest_root` is not a folder or when an
    /// internal task panics. Per-node failures do not fail the run.
    pub async fn run(
        self: Arc<Self>,
        source_root: Node,
        dest_root: Node,
    ) -> anyhow::Result<MirrorReport> {
        anyhow::ensure!(
            dest_root.is_folder(),
            "destination '{}' is not a folder",
            dest_root.name
        );
        let started = Instant::now();
        info!(
            source = %source_root.name,
            dest = %dest_root.name,
            mode = self.options.mode.as_str(),
            dry_run = self.options.dry_run,
            "mirror run starting"
        );

        let (worklist, mut feed) = Worklist::new();
        let traversal = TaskExecutor::new(self.options.traversal_concurrency);
        let run = Arc::new(MirrorRun {
            engine: self.clone(),
            worklist,
            copies: TaskExecutor::new(self.options.copy_concurrency),
            batch: Mutex::new(Vec::new()),
            next_phantom: AtomicU64::new(1),
        });

        run.worklist.push(TraversalTask {
            source: source_root,
            dest_parent: dest_root.id,
        });

        // Sole producer into the bounded traversal executor; see the
        // module doc for why visits must not submit directly.
        let pump = {
            let run = run.clone();
            tokio::spawn(async move {
                while let Some(task) = feed.recv().await {
                    let job = run.clone();
                    if let Err(err) = traversal.submit(job.process_node(task)).await {
                        warn!(error = %err, "traversal executor rejected a task");
                        run.worklist.task_done();
                    }
                }
                traversal
            })
        };

        run.worklist.drained().await;
        run.worklist.close();
        let traversal = pump.await.context("traversal pump task panicked")?;
        traversal.shutdown().await;

        let batch = std::mem::take(&mut *run.batch.lock().unwrap());
        if !batch.is_empty() {
            info!(jobs = batch.len(), "traversal finished; submitting batched copy jobs");
            for request in batch {
                let engine = self.clone();
                run.copies.submit(engine.run_copy_job(request)).await?;
            }
        }
        run.copies.await_idle().await;
        run.copies.shutdown().await;

        let snapshot = self.counters.snapshot();
        let report = MirrorReport {
            jobs_total: snapshot.total,
            jobs_completed: snapshot.completed,
            jobs_failed: snapshot.failed,
            folders_created: self.cache.folders_created(),
            duration_ms: started.elapsed().as_millis() as u64,
            errors: std::mem::take(&mut *self.errors.lock().unwrap()),
        };
        info!(
            total = report.jobs_total,
            completed = report.jobs_completed,
            failed = report.jobs_failed,
            folders_created = report.folders_created,
            "mirror run finished"
        );
        Ok(report)
    }

    /// Copy-executor task body. Always returns `Ok`; failures are
    /// counted and recorded so one bad job never disturbs the pool.
    async fn run_copy_job(self: Arc<Self>, request: CopyRequest) -> anyhow::Result<()> {
        self.counters.record_started();
        self.push_status();
        match self.monitor.run_copy(&request).await {
            Ok(outcome) => {
                if outcome.assumed_complete {
                    info!(node = %request.name, "copy assumed complete after authorization denial");
                } else {
                    debug!(node = %request.name, "copy completed");
                }
                self.counters.record_completed();
            }
            Err(err) => {
                warn!(error = %err, "copy failed");
                self.record_error(err.to_string());
                self.counters.record_failed();
            }
        }
        self.push_status();
        Ok(())
    }

    fn record_error(&self, message: String) {
        self.errors.lock().unwrap().push(message);
    }

    fn push_status(&self) {
        self.sink.update(self.counters.snapshot());
    }
}

// ============================================================================
// Per-run state
// ============================================================================

/// State owned by one in-flight run and shared by its workers.
struct MirrorRun {
    engine: Arc<MirrorEngine>,
    worklist: Worklist,
    copies: TaskExecutor,
    /// Copy jobs held back until traversal completes (batched mode).
    batch: Mutex<Vec<CopyRequest>>,
    /// Ids for folders a dry run pretends to create.
    next_phantom: AtomicU64,
}

impl MirrorRun {
    /// Traversal-executor task body for one node.
    ///
    /// A failing visit is logged and recorded but never propagated: the
    /// node is skipped, its siblings are unaffected, and the worklist is
    /// always notified so the drain barrier cannot hang.
    async fn process_node(self: Arc<Self>, task: TraversalTask) -> anyhow::Result<()> {
        let name = task.source.name.clone();
        if let Err(err) = self.visit(task).await {
            let err = TraversalError { name, source: err };
            warn!(error = %err, "skipping node");
            self.engine.record_error(err.to_string());
        }
        self.worklist.task_done();
        Ok(())
    }

    async fn visit(&self, task: TraversalTask) -> anyhow::Result<()> {
        let TraversalTask { source, dest_parent } = task;

        if source.is_file() {
            return self.schedule_copy(&source, &dest_parent).await;
        }

        if let Some(existing) = self.engine.cache.lookup(&dest_parent, &source.name).await? {
            debug!(folder = %source.name, "merging into existing destination folder");
            return self.enqueue_children(&source, existing.id).await;
        }

        let within_threshold = source
            .size
            .is_some_and(|size| size <= self.engine.options.whole_folder_threshold);
        if within_threshold {
            debug!(folder = %source.name, size = source.size, "copying folder wholesale");
            return self.schedule_copy(&source, &dest_parent).await;
        }

        let created = if self.engine.options.dry_run {
            let phantom = self.phantom_folder(&source.name, &dest_parent)?;
            info!(folder = %source.name, "dry run: would create destination folder");
            self.engine.cache.register_empty(phantom.id.clone());
            phantom
        } else {
            self.engine
                .cache
                .ensure_folder(&dest_parent, &source.name)
                .await?
        };
        self.enqueue_children(&source, created.id).await
    }

    /// Pushes every child of `folder` as a traversal task against
    /// `dest_parent`.
    async fn enqueue_children(&self, folder: &Node, dest_parent: NodeId) -> anyhow::Result<()> {
        let mut cursor = None;
        loop {
            let page = self
                .engine
                .source
                .list_children(&folder.id, cursor.as_ref())
                .await?;
            for child in page.nodes {
                self.worklist.push(TraversalTask {
                    source: child,
                    dest_parent: dest_parent.clone(),
                });
            }
            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(())
    }

    async fn schedule_copy(&self, node: &Node, dest_parent: &NodeId) -> anyhow::Result<()> {
        self.engine.counters.record_queued();
        self.engine.push_status();

        let request = CopyRequest {
            source: CopySource {
                drive_id: self.engine.source.drive_id().clone(),
                node_id: node.id.clone(),
            },
            name: node.name.clone(),
            dest: CopyDestination {
                drive_id: self.engine.dest.drive_id().clone(),
                parent_id: dest_parent.clone(),
            },
            conflict: self.engine.options.conflict,
        };

        if self.engine.options.dry_run {
            info!(node = %request.name, kind = ?node.kind, "dry run: would copy");
            self.engine.counters.record_started();
            self.engine.counters.record_completed();
            self.engine.push_status();
            return Ok(());
        }

        match self.engine.options.mode {
            MirrorMode::Interleaved => {
                let engine = self.engine.clone();
                self.copies.submit(engine.run_copy_job(request)).await?;
            }
            MirrorMode::Batched => {
                self.batch.lock().unwrap().push(request);
            }
        }
        Ok(())
    }

    fn phantom_folder(&self, name: &str, parent: &NodeId) -> anyhow::Result<Node> {
        let n = self.next_phantom.fetch_add(1, Ordering::Relaxed);
        Ok(Node {
            id: NodeId::new(format!("dry-run-{n}"))?,
            name: name.to_string(),
            kind: NodeKind::Folder,
            size: None,
            parent_id: Some(parent.clone()),
        })
    }
}
