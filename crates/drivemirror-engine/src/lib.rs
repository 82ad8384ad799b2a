//! Tree mirroring engine
//!
//! This crate orchestrates one mirroring run: it walks a source tree,
//! reconciles it against the destination tree, and drives server-side
//! copies to completion. It talks to the remote service exclusively
//! through the `ITreeService` port, so everything here is testable
//! against an in-memory fake.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌────────────────────────────────────────┐
//!                 │              MirrorEngine              │
//!                 │                                        │
//!  source tree ──→│ worklist ─→ traversal pool ─→ decide   │
//!                 │                │                │      │
//!                 │     DestinationFolderCache   copy pool │
//!                 │                                │       │
//!                 │                        OperationMonitor│──→ counters
//!                 │                                │       │     │
//!                 │                       RefreshCoordinator     ▼
//!                 └────────────────────────────────────────┘  status sink
//! ```
//!
//! Traversal tasks and copy jobs run on two separate worker pools from
//! `drivemirror-executor`. Traversal feeds itself through an unbounded
//! worklist pumped into the bounded traversal pool, so deep trees never
//! recurse and never deadlock the pool on its own queue.

pub mod cache;
pub mod engine;
pub mod monitor;
pub mod path;
pub mod permissions;
pub mod refresh;
pub(crate) mod worklist;

#[cfg(test)]
pub(crate) mod testutil;

pub use cache::DestinationFolderCache;
pub use engine::{MirrorEngine, MirrorOptions, MirrorReport};
pub use monitor::{CopyOutcome, CopyRequest, MonitorOptions, OperationMonitor};
pub use refresh::RefreshCoordinator;
