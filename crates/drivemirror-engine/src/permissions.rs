//! Cross-account access pre-flight
//!
//! A cross-account mirror only works if the destination account can read
//! the source tree. Before the run, [`ensure_read_access`] checks the
//! sharing permissions on the source root and grants read access to the
//! destination account when missing; after the run,
//! [`revoke_granted`] removes exactly what was granted, leaving
//! pre-existing shares untouched.

use tracing::{debug, info, warn};

use drivemirror_core::domain::{Email, NodeId, PageCursor, PermissionId, PermissionRole};
use drivemirror_core::ports::ITreeService;

/// Ensures `grantee` holds at least read access on `node`.
///
/// # Returns
/// Ids of the permissions created by this call - empty when the grantee
/// was already covered. The caller passes them to [`revoke_granted`]
/// once the run is over.
pub async fn ensure_read_access(
    service: &dyn ITreeService,
    node: &NodeId,
    grantee: &Email,
) -> anyhow::Result<Vec<PermissionId>> {
    let mut cursor: Option<PageCursor> = None;
    loop {
        let page = service.list_permissions(node, cursor.as_ref()).await?;
        if page.permissions.iter().any(|p| p.covers(grantee)) {
            debug!(node = %node, grantee = %grantee, "grantee already has access");
            return Ok(Vec::new());
        }
        match page.next {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    info!(node = %node, grantee = %grantee, "granting read access for this run");
    let created = service
        .grant_permission(node, grantee, PermissionRole::Read)
        .await?;
    // Everything the grant call returned was created on our behalf, so
    // all of it is ours to revoke afterwards.
    Ok(created.into_iter().map(|p| p.id).collect())
}

/// Revokes permissions previously created by [`ensure_read_access`].
///
/// Failures are logged and swallowed: revocation is cleanup, and a
/// leftover share must not turn a completed mirror into a failure.
pub async fn revoke_granted(service: &dyn ITreeService, node: &NodeId, granted: &[PermissionId]) {
    for permission in granted {
        match service.revoke_permission(node, permission).await {
            Ok(()) => debug!(node = %node, permission = %permission, "revoked temporary share"),
            Err(err) => warn!(
                node = %node,
                permission = %permission,
                error = %err,
                "failed to revoke temporary share; remove it manually"
            ),
        }
    }
}
