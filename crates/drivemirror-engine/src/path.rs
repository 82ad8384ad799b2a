//! Remote path resolution
//!
//! Mirror endpoints are configured as slash paths ("Backups/2024/Q3").
//! The source path must already exist; the destination path is created
//! folder by folder when missing. Resolution prefers the service's direct
//! path lookup and only walks segment by segment when it has to create.

use anyhow::Context;
use tracing::info;

use drivemirror_core::domain::{Node, NodeId, PageCursor};
use drivemirror_core::ports::ITreeService;

/// Non-empty segments of a slash path.
fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Finds the child of `parent` with exactly `name`, of either kind.
///
/// Pages through the parent's children; names are compared exactly as the
/// service reports them.
pub async fn find_child(
    service: &dyn ITreeService,
    parent: &NodeId,
    name: &str,
) -> anyhow::Result<Option<Node>> {
    let mut cursor: Option<PageCursor> = None;
    loop {
        let page = service.list_children(parent, cursor.as_ref()).await?;
        if let Some(node) = page.nodes.into_iter().find(|n| n.name == name) {
            return Ok(Some(node));
        }
        match page.next {
            Some(next) => cursor = Some(next),
            None => return Ok(None),
        }
    }
}

/// Resolves `path` from the drive root.
///
/// An empty path (or "/") resolves to the root itself. With
/// `create_missing`, absent components are created as folders, so the
/// returned node is guaranteed to exist; without it, an absent component
/// is an error.
///
/// # Errors
///
/// - the path does not exist and `create_missing` is false
/// - a non-final component resolves to a file
/// - any underlying service call fails
pub async fn resolve_path(
    service: &dyn ITreeService,
    path: &str,
    create_missing: bool,
) -> anyhow::Result<Node> {
    let root = service.get_root().await.context("fetching drive root")?;
    let segs = segments(path);
    if segs.is_empty() {
        return Ok(root);
    }

    // Fast path: one round trip when the node already exists.
    if let Some(node) = service
        .get_node_by_path(path)
        .await
        .with_context(|| format!("resolving remote path '/{}'", segs.join("/")))?
    {
        return Ok(node);
    }
    if !create_missing {
        anyhow::bail!("remote path '/{}' does not exist", segs.join("/"));
    }

    let mut current = root;
    for seg in segs {
        let next = match find_child(service, &current.id, seg).await? {
            Some(node) => {
                if node.is_file() {
                    anyhow::bail!(
                        "remote path component '{seg}' is a file, cannot descend into it"
                    );
                }
                node
            }
            None => {
                info!(parent = %current.name, name = seg, "creating missing path folder");
                service
                    .create_folder(&current.id, seg)
                    .await
                    .with_context(|| format!("creating folder '{seg}'"))?
            }
        };
        current = next;
    }
    Ok(current)
}
