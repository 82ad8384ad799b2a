//! Destination folder cache
//!
//! Traversal workers constantly ask the same two questions about a
//! destination parent: "which folders already exist under it?" and
//! "create this folder unless it exists". Both are answered here, backed
//! by the remote service but asked of it at most once per key for the
//! whole run.
//!
//! ## Consistency model
//!
//! A parent's listing is enumerated lazily on first use and then **never
//! invalidated within a run**. A second process (or anything else writing
//! to the destination concurrently) can therefore race this cache into a
//! duplicate folder; that is an accepted limitation. Within the process,
//! however, both the listing and each `(parent, name)` creation are
//! single-flight: concurrent workers converge on one enumeration and one
//! create call, and all of them observe its result.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use drivemirror_core::domain::{Node, NodeId, PageCursor};
use drivemirror_core::ports::ITreeService;

type FolderIndex = HashMap<String, Node>;

/// Lazily populated view of the destination tree's folders.
pub struct DestinationFolderCache {
    service: Arc<dyn ITreeService>,
    /// Parent id → folder children indexed by name, built on first use.
    listings: DashMap<NodeId, Arc<OnceCell<FolderIndex>>>,
    /// `(parent id, name)` → the one creation in flight or completed.
    creations: DashMap<(NodeId, String), Arc<OnceCell<Node>>>,
    folders_created: AtomicU64,
}

impl DestinationFolderCache {
    #[must_use]
    pub fn new(service: Arc<dyn ITreeService>) -> Self {
        Self {
            service,
            listings: DashMap::new(),
            creations: DashMap::new(),
            folders_created: AtomicU64::new(0),
        }
    }

    /// Looks up the folder named `name` under `parent`, if one existed
    /// when the parent was first enumerated.
    ///
    /// The first call for a given parent pages through its children and
    /// indexes the folder-typed ones; concurrent first calls share that
    /// enumeration. Files are deliberately not indexed - only folders
    /// participate in merge decisions.
    pub async fn lookup(&self, parent: &NodeId, name: &str) -> anyhow::Result<Option<Node>> {
        let cell = self.listings.entry(parent.clone()).or_default().clone();
        let index = cell.get_or_try_init(|| self.build_index(parent)).await?;
        Ok(index.get(name).cloned())
    }

    /// Returns the destination folder `name` under `parent`, creating it
    /// when neither the listing nor an earlier creation knows it.
    ///
    /// Creation is single-flight per `(parent, name)`: concurrent callers
    /// converge on one `create_folder` call and all receive the same node.
    pub async fn ensure_folder(&self, parent: &NodeId, name: &str) -> anyhow::Result<Node> {
        if let Some(existing) = self.lookup(parent, name).await? {
            debug!(parent = %parent, name, "destination folder already exists");
            return Ok(existing);
        }

        let key = (parent.clone(), name.to_string());
        let cell = self.creations.entry(key).or_default().clone();
        let node = cell
            .get_or_try_init(|| async {
                info!(parent = %parent, name, "creating destination folder");
                let node = self.service.create_folder(parent, name).await?;
                self.folders_created.fetch_add(1, Ordering::Relaxed);
                Ok::<_, anyhow::Error>(node)
            })
            .await?;
        Ok(node.clone())
    }

    /// Registers `parent` as having no folder children, without asking
    /// the service.
    ///
    /// Used by dry runs for folders that would have been created: the
    /// traversal can descend into them while any lookup below comes back
    /// empty instead of querying a node that does not exist.
    pub fn register_empty(&self, parent: NodeId) {
        let cell = OnceCell::new();
        let _ = cell.set(FolderIndex::new());
        self.listings.insert(parent, Arc::new(cell));
    }

    /// Number of folders created through this cache so far.
    #[must_use]
    pub fn folders_created(&self) -> u64 {
        self.folders_created.load(Ordering::Relaxed)
    }

    async fn build_index(&self, parent: &NodeId) -> anyhow::Result<FolderIndex> {
        debug!(parent = %parent, "enumerating destination children");
        let mut index = FolderIndex::new();
        let mut cursor: Option<PageCursor> = None;
        loop {
            let page = self.service.list_children(parent, cursor.as_ref()).await?;
            for node in page.nodes {
                if node.is_folder() {
                    index.insert(node.name.clone(), node);
                }
            }
            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        debug!(parent = %parent, folders = index.len(), "destination index built");
        Ok(index)
    }
}
