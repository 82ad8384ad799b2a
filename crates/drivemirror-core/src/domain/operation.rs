//! Long-running copy operation types
//!
//! A server-side copy either completes synchronously or hands back an
//! [`OperationHandle`] whose status endpoint is polled until a terminal
//! state is reached. Authorization rejection is a *status*, not an error:
//! it triggers the credential refresh protocol and a retry of the same
//! poll rather than failing the job.

use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use super::newtypes::NodeId;
use super::node::Node;

/// Opaque pollable handle for an in-flight asynchronous copy
///
/// For Graph this is the `Location` URL returned by the copy request; the
/// core never interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationHandle(String);

impl OperationHandle {
    /// Wrap a status endpoint returned by the remote service
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self(endpoint.into())
    }

    /// Get the inner endpoint reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for OperationHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of a copy start request
#[derive(Debug, Clone)]
pub enum CopyStarted {
    /// The service completed the copy synchronously
    Completed(Node),
    /// The service accepted the copy and returned a monitor handle
    Accepted(OperationHandle),
}

/// One observation of an in-flight operation's status endpoint
#[derive(Debug, Clone, PartialEq)]
pub enum OperationStatus {
    /// Still running; `percent` is reporting-only, `retry_after` is the
    /// service's suggested cadence for the next poll
    InProgress {
        percent: Option<f64>,
        retry_after: Option<Duration>,
    },
    /// Terminal success; the copied node can be resolved via
    /// `resource_id` when the service supplies one
    Completed { resource_id: Option<NodeId> },
    /// Terminal failure or cancellation, with the remote diagnostic
    Failed { message: String },
    /// The service rejected the poll's credentials; transient, handled by
    /// the refresh protocol
    AuthorizationExpired,
}

impl OperationStatus {
    /// Short label used for progress de-duplication and logging
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::InProgress { .. } => "in-progress",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
            Self::AuthorizationExpired => "authorization-expired",
        }
    }

    /// Progress percentage when the status carries one
    #[must_use]
    pub fn percent(&self) -> Option<f64> {
        match self {
            Self::InProgress { percent, .. } => *percent,
            _ => None,
        }
    }
}
