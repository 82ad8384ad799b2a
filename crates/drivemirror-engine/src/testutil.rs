//! In-memory fake of the remote tree service for engine tests
//!
//! Holds a mutable tree per instance, records every mutating call, and
//! lets tests script how copies behave (synchronous, polled through a
//! monitor handle, or rejected). Pagination is driven by a configurable
//! page size so multi-page behavior is testable with three nodes instead
//! of two hundred.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use drivemirror_core::domain::{
    AccountInfo, ChildPage, ConflictBehavior, CopyDestination, CopySource, CopyStarted, DriveId,
    Email, Node, NodeId, NodeKind, OperationHandle, OperationStatus, PageCursor, Permission,
    PermissionId, PermissionPage, PermissionRole,
};
use drivemirror_core::ports::{ICredentialRefresher, ITreeService};

/// How the fake answers a copy request for one source node.
#[derive(Clone)]
pub(crate) enum CopyBehavior {
    /// Complete synchronously (the default).
    Immediate,
    /// Accept with a monitor handle; polls pop these statuses in order,
    /// then report completion. The copied node appears at the
    /// destination right away.
    Polled(Vec<OperationStatus>),
    /// Like `Polled`, but the copied node never materializes and the
    /// final completion carries no resource id.
    PolledNoMaterialize(Vec<OperationStatus>),
    /// Reject the start request with this message.
    RejectStart(String),
}

/// One recorded `copy_node` invocation.
#[derive(Debug, Clone)]
pub(crate) struct CopyCall {
    pub source: CopySource,
    pub dest: CopyDestination,
    pub name: String,
    #[allow(dead_code)]
    pub conflict: ConflictBehavior,
}

struct HandleScript {
    statuses: VecDeque<OperationStatus>,
    resource: Option<NodeId>,
}

pub(crate) struct FakeTreeService {
    drive: DriveId,
    root: NodeId,
    page_size: usize,
    next_id: AtomicU64,

    nodes: Mutex<HashMap<NodeId, Node>>,
    children: Mutex<HashMap<NodeId, Vec<NodeId>>>,
    permissions: Mutex<HashMap<NodeId, Vec<Permission>>>,
    behaviors: Mutex<HashMap<NodeId, CopyBehavior>>,
    scripts: Mutex<HashMap<String, HandleScript>>,
    account: Mutex<(String, String)>,

    copy_calls: Mutex<Vec<CopyCall>>,
    create_calls: Mutex<Vec<(NodeId, String)>>,
    grant_calls: Mutex<Vec<(NodeId, String)>>,
    revoked: Mutex<Vec<(NodeId, PermissionId)>>,
    list_calls: Mutex<HashMap<NodeId, usize>>,
    failing_listings: Mutex<HashMap<NodeId, usize>>,
    poll_calls: AtomicUsize,
    create_delay: Mutex<Duration>,
}

impl FakeTreeService {
    pub fn new(drive: &str) -> Self {
        let root = NodeId::new("root").unwrap();
        let root_node = Node {
            id: root.clone(),
            name: "root".to_string(),
            kind: NodeKind::Folder,
            size: None,
            parent_id: None,
        };
        let fake = Self {
            drive: DriveId::new(drive).unwrap(),
            root: root.clone(),
            page_size: 200,
            next_id: AtomicU64::new(1),
            nodes: Mutex::new(HashMap::new()),
            children: Mutex::new(HashMap::new()),
            permissions: Mutex::new(HashMap::new()),
            behaviors: Mutex::new(HashMap::new()),
            scripts: Mutex::new(HashMap::new()),
            account: Mutex::new(("Fake User".to_string(), "fake@example.com".to_string())),
            copy_calls: Mutex::new(Vec::new()),
            create_calls: Mutex::new(Vec::new()),
            grant_calls: Mutex::new(Vec::new()),
            revoked: Mutex::new(Vec::new()),
            list_calls: Mutex::new(HashMap::new()),
            failing_listings: Mutex::new(HashMap::new()),
            poll_calls: AtomicUsize::new(0),
            create_delay: Mutex::new(Duration::ZERO),
        };
        fake.nodes.lock().unwrap().insert(root, root_node);
        fake
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    // ------------------------------------------------------------------
    // Tree construction
    // ------------------------------------------------------------------

    pub fn root_id(&self) -> NodeId {
        self.root.clone()
    }

    pub fn drive_id_owned(&self) -> DriveId {
        self.drive.clone()
    }

    fn mint(&self, prefix: &str) -> NodeId {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        NodeId::new(format!("{prefix}-{n}")).unwrap()
    }

    fn insert(&self, node: Node) -> NodeId {
        let id = node.id.clone();
        if let Some(parent) = node.parent_id.clone() {
            self.children.lock().unwrap().entry(parent).or_default().push(id.clone());
        }
        self.nodes.lock().unwrap().insert(id.clone(), node);
        id
    }

    pub fn add_folder(&self, parent: &NodeId, name: &str, size: Option<u64>) -> NodeId {
        let id = self.mint("folder");
        self.insert(Node {
            id,
            name: name.to_string(),
            kind: NodeKind::Folder,
            size,
            parent_id: Some(parent.clone()),
        })
    }

    pub fn add_file(&self, parent: &NodeId, name: &str, size: u64) -> NodeId {
        let id = self.mint("file");
        self.insert(Node {
            id,
            name: name.to_string(),
            kind: NodeKind::File,
            size: Some(size),
            parent_id: Some(parent.clone()),
        })
    }

    pub fn node(&self, id: &NodeId) -> Node {
        self.nodes.lock().unwrap().get(id).cloned().unwrap()
    }

    pub fn children_of(&self, parent: &NodeId) -> Vec<Node> {
        let nodes = self.nodes.lock().unwrap();
        self.children
            .lock()
            .unwrap()
            .get(parent)
            .map(|ids| ids.iter().map(|id| nodes[id].clone()).collect())
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Scripting
    // ------------------------------------------------------------------

    pub fn set_copy_behavior(&self, source: &NodeId, behavior: CopyBehavior) {
        self.behaviors.lock().unwrap().insert(source.clone(), behavior);
    }

    pub fn set_create_delay(&self, delay: Duration) {
        *self.create_delay.lock().unwrap() = delay;
    }

    /// Makes the next `count` listings of `parent` fail.
    pub fn set_fail_listing(&self, parent: &NodeId, count: usize) {
        self.failing_listings.lock().unwrap().insert(parent.clone(), count);
    }

    pub fn seed_permission(&self, node: &NodeId, email: &str) {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let permission = Permission {
            id: PermissionId::new(format!("perm-{n}")).unwrap(),
            roles: vec!["read".to_string()],
            grantees: vec![Email::new(email).unwrap()],
        };
        self.permissions.lock().unwrap().entry(node.clone()).or_default().push(permission);
    }

    pub fn set_account(&self, name: &str, email: &str) {
        *self.account.lock().unwrap() = (name.to_string(), email.to_string());
    }

    // ------------------------------------------------------------------
    // Recorded calls
    // ------------------------------------------------------------------

    pub fn copy_calls(&self) -> Vec<CopyCall> {
        self.copy_calls.lock().unwrap().clone()
    }

    pub fn create_calls(&self) -> Vec<(NodeId, String)> {
        self.create_calls.lock().unwrap().clone()
    }

    pub fn grant_calls(&self) -> Vec<(NodeId, String)> {
        self.grant_calls.lock().unwrap().clone()
    }

    pub fn revoked(&self) -> Vec<(NodeId, PermissionId)> {
        self.revoked.lock().unwrap().clone()
    }

    pub fn list_calls(&self, parent: &NodeId) -> usize {
        self.list_calls.lock().unwrap().get(parent).copied().unwrap_or(0)
    }

    pub fn poll_calls(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }

    fn page<T: Clone>(&self, items: &[T], cursor: Option<&PageCursor>) -> anyhow::Result<(Vec<T>, Option<PageCursor>)> {
        let offset: usize = match cursor {
            Some(c) => c.as_str().parse()?,
            None => 0,
        };
        let end = (offset + self.page_size).min(items.len());
        let next = if end < items.len() {
            Some(PageCursor::new(end.to_string())?)
        } else {
            None
        };
        Ok((items[offset..end].to_vec(), next))
    }
}

#[async_trait::async_trait]
impl ITreeService for FakeTreeService {
    fn drive_id(&self) -> &DriveId {
        &self.drive
    }

    async fn get_root(&self) -> anyhow::Result<Node> {
        Ok(self.node(&self.root))
    }

    async fn get_node(&self, id: &NodeId) -> anyhow::Result<Node> {
        self.nodes
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no such node: {id}"))
    }

    async fn get_node_by_path(&self, path: &str) -> anyhow::Result<Option<Node>> {
        let mut current = self.node(&self.root);
        for seg in path.split('/').filter(|s| !s.is_empty()) {
            let next = self.children_of(&current.id).into_iter().find(|n| n.name == seg);
            match next {
                Some(node) => current = node,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    async fn list_children(
        &self,
        parent: &NodeId,
        cursor: Option<&PageCursor>,
    ) -> anyhow::Result<ChildPage> {
        *self.list_calls.lock().unwrap().entry(parent.clone()).or_insert(0) += 1;
        {
            let mut failing = self.failing_listings.lock().unwrap();
            if let Some(remaining) = failing.get_mut(parent) {
                if *remaining > 0 {
                    *remaining -= 1;
                    anyhow::bail!("listing of {parent} failed (scripted)");
                }
            }
        }
        if !self.nodes.lock().unwrap().contains_key(parent) {
            anyhow::bail!("no such node: {parent}");
        }
        let all = self.children_of(parent);
        let (nodes, next) = self.page(&all, cursor)?;
        Ok(ChildPage { nodes, next })
    }

    async fn create_folder(&self, parent: &NodeId, name: &str) -> anyhow::Result<Node> {
        let delay = *self.create_delay.lock().unwrap();
        if delay > Duration::ZERO {
            tokio::time::sleep(delay).await;
        }
        self.create_calls.lock().unwrap().push((parent.clone(), name.to_string()));
        let id = self.add_folder(parent, name, None);
        Ok(self.node(&id))
    }

    async fn copy_node(
        &self,
        source: &CopySource,
        destination: &CopyDestination,
        name: &str,
        on_conflict: ConflictBehavior,
    ) -> anyhow::Result<CopyStarted> {
        self.copy_calls.lock().unwrap().push(CopyCall {
            source: source.clone(),
            dest: destination.clone(),
            name: name.to_string(),
            conflict: on_conflict,
        });

        let behavior = self
            .behaviors
            .lock()
            .unwrap()
            .get(&source.node_id)
            .cloned()
            .unwrap_or(CopyBehavior::Immediate);
        match behavior {
            CopyBehavior::Immediate => {
                let id = self.mint("copy");
                let node = Node {
                    id,
                    name: name.to_string(),
                    kind: NodeKind::File,
                    size: Some(0),
                    parent_id: Some(destination.parent_id.clone()),
                };
                self.insert(node.clone());
                Ok(CopyStarted::Completed(node))
            }
            CopyBehavior::Polled(statuses) => {
                let id = self.mint("copy");
                let node = Node {
                    id: id.clone(),
                    name: name.to_string(),
                    kind: NodeKind::File,
                    size: Some(0),
                    parent_id: Some(destination.parent_id.clone()),
                };
                self.insert(node);
                let handle = format!("op-{id}");
                self.scripts.lock().unwrap().insert(
                    handle.clone(),
                    HandleScript {
                        statuses: statuses.into(),
                        resource: Some(id),
                    },
                );
                Ok(CopyStarted::Accepted(OperationHandle::new(handle)))
            }
            CopyBehavior::PolledNoMaterialize(statuses) => {
                let n = self.next_id.fetch_add(1, Ordering::SeqCst);
                let handle = format!("op-ghost-{n}");
                self.scripts.lock().unwrap().insert(
                    handle.clone(),
                    HandleScript {
                        statuses: statuses.into(),
                        resource: None,
                    },
                );
                Ok(CopyStarted::Accepted(OperationHandle::new(handle)))
            }
            CopyBehavior::RejectStart(message) => Err(anyhow::anyhow!("{message}")),
        }
    }

    async fn poll_operation(&self, handle: &OperationHandle) -> anyhow::Result<OperationStatus> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        let mut scripts = self.scripts.lock().unwrap();
        let script = scripts
            .get_mut(handle.as_str())
            .ok_or_else(|| anyhow::anyhow!("unknown operation handle"))?;
        Ok(match script.statuses.pop_front() {
            Some(status) => status,
            None => OperationStatus::Completed {
                resource_id: script.resource.clone(),
            },
        })
    }

    async fn list_permissions(
        &self,
        node: &NodeId,
        cursor: Option<&PageCursor>,
    ) -> anyhow::Result<PermissionPage> {
        let all = self.permissions.lock().unwrap().get(node).cloned().unwrap_or_default();
        let (permissions, next) = self.page(&all, cursor)?;
        Ok(PermissionPage { permissions, next })
    }

    async fn grant_permission(
        &self,
        node: &NodeId,
        recipient: &Email,
        role: PermissionRole,
    ) -> anyhow::Result<Vec<Permission>> {
        self.grant_calls.lock().unwrap().push((node.clone(), recipient.as_str().to_string()));
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let permission = Permission {
            id: PermissionId::new(format!("perm-{n}")).unwrap(),
            roles: vec![role.as_str().to_string()],
            grantees: vec![recipient.clone()],
        };
        self.permissions
            .lock()
            .unwrap()
            .entry(node.clone())
            .or_default()
            .push(permission.clone());
        Ok(vec![permission])
    }

    async fn revoke_permission(
        &self,
        node: &NodeId,
        permission: &PermissionId,
    ) -> anyhow::Result<()> {
        let mut permissions = self.permissions.lock().unwrap();
        let entries = permissions.entry(node.clone()).or_default();
        let before = entries.len();
        entries.retain(|p| p.id != *permission);
        if entries.len() == before {
            anyhow::bail!("no such permission: {permission}");
        }
        drop(permissions);
        self.revoked.lock().unwrap().push((node.clone(), permission.clone()));
        Ok(())
    }

    async fn account_info(&self) -> anyhow::Result<AccountInfo> {
        let (name, email) = self.account.lock().unwrap().clone();
        Ok(AccountInfo {
            display_name: name,
            email: Email::new(email)?,
        })
    }
}

/// Credential refresher that counts calls and can fail on demand.
pub(crate) struct FakeRefresher {
    calls: AtomicUsize,
    fail_next: std::sync::atomic::AtomicBool,
}

impl FakeRefresher {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_next: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl ICredentialRefresher for FakeRefresher {
    async fn refresh(&self) -> anyhow::Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_next.swap(false, Ordering::SeqCst) {
            anyhow::bail!("refresh declined");
        }
        Ok(format!("refreshed-token-{n}"))
    }
}
