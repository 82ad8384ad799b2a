//! Tree node types and mirroring work units
//!
//! A [`Node`] is a read-only snapshot of one remote file or folder,
//! fetched on demand and never mutated locally. The engine turns nodes
//! into traversal tasks and copy jobs; both carry the same
//! `(node, destination parent)` shape.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{DriveId, NodeId, PageCursor};

/// Whether a node is a file or a folder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Folder,
}

/// A file or folder record from the remote tree service
///
/// Identity is the remote-assigned id. Uniqueness of `(parent_id, name)`
/// is assumed for folders but not enforced here; the engine only checks
/// for an existing same-named folder before creating one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Remote-assigned identifier
    pub id: NodeId,
    /// Display name within the parent
    pub name: String,
    /// File or folder
    pub kind: NodeKind,
    /// Size in bytes. Files report their content size; folders report the
    /// cumulative size of the subtree when the service provides one, and
    /// `None` when it does not (treated as oversized by the engine).
    pub size: Option<u64>,
    /// Parent folder id (`None` for the drive root)
    pub parent_id: Option<NodeId>,
}

impl Node {
    /// Returns true if this node is a file
    #[must_use]
    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }

    /// Returns true if this node is a folder
    #[must_use]
    pub fn is_folder(&self) -> bool {
        self.kind == NodeKind::Folder
    }
}

/// One page of a children enumeration
///
/// `next` is present when further pages exist; callers pass it back to
/// the service verbatim to continue.
#[derive(Debug, Clone)]
pub struct ChildPage {
    /// Nodes on this page
    pub nodes: Vec<Node>,
    /// Cursor for the next page (`None` on the last page)
    pub next: Option<PageCursor>,
}

/// Remote coordinates of the node a copy reads from
///
/// Cross-account copies are issued through the destination account's
/// session but address the source item by its own drive, so the drive id
/// must travel with the node id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopySource {
    /// Drive that owns the source node
    pub drive_id: DriveId,
    /// Source node id
    pub node_id: NodeId,
}

/// Where a copy lands: a parent folder on a (possibly different) drive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyDestination {
    /// Drive that owns the destination parent
    pub drive_id: DriveId,
    /// Destination parent folder id
    pub parent_id: NodeId,
}

/// Conflict directive attached to every copy request
///
/// `rename`-on-conflict is deliberately unsupported: a name collision
/// under [`ConflictBehavior::Fail`] surfaces as a job failure, never a
/// silent rename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictBehavior {
    /// Reject the copy when a same-named node already exists
    #[default]
    Fail,
    /// Overwrite an existing same-named node
    Replace,
}

impl ConflictBehavior {
    /// Wire value understood by the remote service
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fail => "fail",
            Self::Replace => "replace",
        }
    }
}

impl Display for ConflictBehavior {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ConflictBehavior {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fail" => Ok(Self::Fail),
            "replace" => Ok(Self::Replace),
            other => Err(DomainError::InvalidConflictBehavior(format!(
                "expected 'fail' or 'replace', got '{other}'"
            ))),
        }
    }
}

/// How discovered copy jobs reach the copy executor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MirrorMode {
    /// Submit each job as soon as traversal discovers it
    #[default]
    Interleaved,
    /// Collect jobs during traversal, submit them once traversal drains
    Batched,
}

impl MirrorMode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Interleaved => "interleaved",
            Self::Batched => "batched",
        }
    }
}

impl Display for MirrorMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MirrorMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "interleaved" => Ok(Self::Interleaved),
            "batched" => Ok(Self::Batched),
            other => Err(DomainError::InvalidMode(format!(
                "expected 'interleaved' or 'batched', got '{other}'"
            ))),
        }
    }
}
