//! Domain error types
//!
//! Two families live here: [`DomainError`] for construction-time
//! validation failures, and [`CopyError`] for the terminal failures a
//! copy job can surface. Transient conditions (authorization expiry,
//! throttling) are deliberately *not* errors; they are statuses handled
//! inside the poll loop.

use thiserror::Error;

/// Errors that can occur constructing or validating domain values
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid node identifier
    #[error("Invalid node id: {0}")]
    InvalidNodeId(String),

    /// Invalid drive identifier
    #[error("Invalid drive id: {0}")]
    InvalidDriveId(String),

    /// Invalid permission identifier
    #[error("Invalid permission id: {0}")]
    InvalidPermissionId(String),

    /// Invalid email address format
    #[error("Invalid email format: {0}")]
    InvalidEmail(String),

    /// Invalid pagination cursor
    #[error("Invalid pagination cursor: {0}")]
    InvalidCursor(String),

    /// Invalid conflict directive
    #[error("Invalid conflict behavior: {0}")]
    InvalidConflictBehavior(String),

    /// Invalid orchestration mode
    #[error("Invalid mirror mode: {0}")]
    InvalidMode(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

/// Terminal failure of one copy job
///
/// Job failures are isolated: they mark the job failed in the counters
/// and the run report, and never abort the overall run.
#[derive(Debug, Error)]
pub enum CopyError {
    /// The remote service rejected the copy request outright
    #[error("copy of '{name}' rejected at start: {source}")]
    Start {
        /// Name of the node being copied
        name: String,
        /// Underlying adapter error
        #[source]
        source: anyhow::Error,
    },

    /// The operation reached a terminal failure or cancellation while
    /// being polled, or its result could not be resolved
    #[error("copy of '{name}' failed: {message}")]
    Operation {
        /// Name of the node being copied
        name: String,
        /// Remote diagnostic payload
        message: String,
    },

    /// Polling stayed unauthorized after a credential refresh cycle
    ///
    /// Expiry itself is transient and handled by the refresh protocol;
    /// this variant means a refresh was performed (or attempted and
    /// failed) and the very next poll was still rejected.
    #[error("copy of '{name}' denied: {message}")]
    AuthorizationDenied {
        /// Name of the node being copied
        name: String,
        /// What the refresh cycle ran into
        message: String,
    },
}

impl CopyError {
    /// Name of the node the failed job was copying
    #[must_use]
    pub fn node_name(&self) -> &str {
        match self {
            Self::Start { name, .. }
            | Self::Operation { name, .. }
            | Self::AuthorizationDenied { name, .. } => name,
        }
    }
}

/// Failure while expanding one source node during traversal
///
/// Like copy failures, traversal failures are isolated: the node is
/// skipped, siblings continue, and the run report records the message.
#[derive(Debug, Error)]
#[error("traversal of '{name}' failed: {source}")]
pub struct TraversalError {
    /// Name of the node whose expansion failed
    pub name: String,
    /// Underlying enumeration/lookup error
    #[source]
    pub source: anyhow::Error,
}
