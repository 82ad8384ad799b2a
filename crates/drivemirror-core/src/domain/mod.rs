//! Domain entities and business logic
//!
//! This module contains the core domain types for DriveMirror:
//! - Newtypes for type-safe identifiers and validated domain values
//! - Tree node types and the copy/traversal work units
//! - Long-running operation handles and poll statuses
//! - Permission records for the cross-account pre-flight
//! - Shared run counters
//! - Domain-specific error types

pub mod counters;
pub mod errors;
pub mod newtypes;
pub mod node;
pub mod operation;
pub mod permission;

// Re-export commonly used types
pub use counters::{CounterSnapshot, MirrorCounters};
pub use errors::{CopyError, DomainError, TraversalError};
pub use newtypes::{DriveId, Email, NodeId, PageCursor, PermissionId};
pub use node::{
    ChildPage, ConflictBehavior, CopyDestination, CopySource, MirrorMode, Node, NodeKind,
};
pub use operation::{CopyStarted, OperationHandle, OperationStatus};
pub use permission::{AccountInfo, Permission, PermissionPage, PermissionRole};
