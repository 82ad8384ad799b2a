//! Remote tree service port (driven/secondary port)
//!
//! This module defines the interface for the remote storage endpoint that
//! owns the trees being mirrored. The primary implementation targets
//! Microsoft OneDrive via the Microsoft Graph API, but the trait carries
//! no Graph specifics: pagination is an opaque cursor, the copy monitor
//! is an opaque handle.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because errors at port boundaries are
//!   adapter-specific and don't need domain-level classification.
//!   Transient authorization rejection during polling is *not* an error;
//!   it surfaces as [`OperationStatus::AuthorizationExpired`] so the
//!   refresh protocol can run.
//! - One implementation instance is bound to one account/drive; a
//!   cross-account mirror holds two instances.
//! - Byte-level transfer is out of scope: `copy_node` asks the service to
//!   copy server-side and nothing ever streams through this port.

use crate::domain::newtypes::{DriveId, Email, NodeId, PageCursor, PermissionId};
use crate::domain::node::{ChildPage, ConflictBehavior, CopyDestination, CopySource, Node};
use crate::domain::operation::{CopyStarted, OperationHandle, OperationStatus};
use crate::domain::permission::{AccountInfo, Permission, PermissionPage, PermissionRole};

/// Port trait for remote tree operations
///
/// ## Implementation Notes
///
/// - Implementations handle provider-specific throttling (429 retry)
///   internally; the orchestration layer never sees it.
/// - All methods assume a current access token is available through the
///   shared token store; mid-run refresh is coordinated above this port.
#[async_trait::async_trait]
pub trait ITreeService: Send + Sync {
    /// Drive this service instance is bound to
    fn drive_id(&self) -> &DriveId;

    /// Fetches the root folder of the drive
    async fn get_root(&self) -> anyhow::Result<Node>;

    /// Fetches a single node by id
    ///
    /// # Arguments
    /// * `id` - Remote-assigned node identifier
    async fn get_node(&self, id: &NodeId) -> anyhow::Result<Node>;

    /// Resolves a slash-separated path relative to the drive root
    ///
    /// # Returns
    /// `None` when no node exists at that path
    async fn get_node_by_path(&self, path: &str) -> anyhow::Result<Option<Node>>;

    /// Enumerates one page of a folder's children
    ///
    /// Pass `cursor = None` for the first page; feed the returned cursor
    /// back verbatim for subsequent pages.
    ///
    /// # Arguments
    /// * `parent` - Folder whose children are listed
    /// * `cursor` - Pagination cursor from the previous page, if any
    async fn list_children(
        &self,
        parent: &NodeId,
        cursor: Option<&PageCursor>,
    ) -> anyhow::Result<ChildPage>;

    /// Creates a folder under `parent`
    ///
    /// # Returns
    /// The newly created folder node
    async fn create_folder(&self, parent: &NodeId, name: &str) -> anyhow::Result<Node>;

    /// Starts a server-side copy of `source` into `destination`
    ///
    /// The service either completes synchronously or returns a monitor
    /// handle to poll. The conflict directive is attached to the request;
    /// rename-on-conflict is unsupported by design.
    ///
    /// # Arguments
    /// * `source` - Node to copy (file or whole folder subtree), addressed
    ///   by its own drive so a destination-account session can reach it
    /// * `destination` - Target parent, possibly on another drive
    /// * `name` - Name for the copy
    /// * `on_conflict` - `fail` or `replace`
    async fn copy_node(
        &self,
        source: &CopySource,
        destination: &CopyDestination,
        name: &str,
        on_conflict: ConflictBehavior,
    ) -> anyhow::Result<CopyStarted>;

    /// Polls an in-flight copy operation once
    ///
    /// # Returns
    /// The operation's current status; authorization rejection is
    /// reported as a status variant, not an `Err`.
    async fn poll_operation(&self, handle: &OperationHandle) -> anyhow::Result<OperationStatus>;

    /// Enumerates one page of a node's sharing permissions
    async fn list_permissions(
        &self,
        node: &NodeId,
        cursor: Option<&PageCursor>,
    ) -> anyhow::Result<PermissionPage>;

    /// Grants `role` on `node` to the principal identified by `recipient`
    ///
    /// The grant requires sign-in and sends no notification mail.
    ///
    /// # Returns
    /// The permissions created by the grant (used later for revocation)
    async fn grant_permission(
        &self,
        node: &NodeId,
        recipient: &Email,
        role: PermissionRole,
    ) -> anyhow::Result<Vec<Permission>>;

    /// Revokes a single permission previously granted on `node`
    async fn revoke_permission(
        &self,
        node: &NodeId,
        permission: &PermissionId,
    ) -> anyhow::Result<()>;

    /// Identity of the authenticated account
    async fn account_info(&self) -> anyhow::Result<AccountInfo>;
}
