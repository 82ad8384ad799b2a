//! Core domain logic for DriveMirror
//!
//! This crate contains the technology-agnostic heart of the mirroring
//! system, structured along hexagonal (ports & adapters) lines:
//!
//! - [`domain`] - tree node types, validated identifiers, counters and
//!   the typed error taxonomy
//! - [`ports`] - interfaces the orchestration depends on (remote tree
//!   service, credential refresher, status sink), implemented by adapter
//!   crates
//! - [`config`] - YAML configuration with validation
//! - [`token`] - the shared access-token store consulted by adapters and
//!   refreshed under the engine's single-flight gate
//!
//! Nothing in this crate performs I/O; adapters live in sibling crates
//! (`drivemirror-graph` for Microsoft Graph, `drivemirror-cli` for the
//! console surfaces).

pub mod config;
pub mod domain;
pub mod ports;
pub mod token;
