//! Sharing permission records
//!
//! Only the small slice of the remote permission model needed by the
//! cross-account pre-flight is represented: who a permission is granted
//! to (by email) and which roles it carries, plus enough identity to
//! revoke a grant this run created.

use serde::{Deserialize, Serialize};

use super::newtypes::{Email, PageCursor, PermissionId};

/// Role attached to a granted permission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionRole {
    Read,
    Write,
}

impl PermissionRole {
    /// Wire value understood by the remote service
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

/// One sharing permission on a node
#[derive(Debug, Clone, PartialEq)]
pub struct Permission {
    /// Remote-assigned permission id (used for revocation)
    pub id: PermissionId,
    /// Role names as reported by the service (`read`, `write`, `owner`, ...)
    pub roles: Vec<String>,
    /// Email addresses of the principals this permission is granted to
    pub grantees: Vec<Email>,
}

impl Permission {
    /// Returns true if this permission is granted to the given principal
    #[must_use]
    pub fn covers(&self, principal: &Email) -> bool {
        self.grantees.iter().any(|e| e.matches(principal))
    }
}

/// One page of a permission enumeration
#[derive(Debug, Clone)]
pub struct PermissionPage {
    pub permissions: Vec<Permission>,
    /// Cursor for the next page (`None` on the last page)
    pub next: Option<PageCursor>,
}

/// Identity of the authenticated account
///
/// Retrieved from the provider's profile endpoint; the email doubles as
/// the permission grantee for cross-account mirroring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub display_name: String,
    pub email: Email,
}
