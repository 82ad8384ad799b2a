//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the orchestration
//! core depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`ITreeService`] - remote tree operations (enumerate, create, copy,
//!   poll, permissions)
//! - [`ICredentialRefresher`] - supplies a fresh access token when the
//!   shared credential expires mid-run
//! - [`IStatusSink`] - receives counter snapshots on every observable
//!   change

pub mod credentials;
pub mod status_sink;
pub mod tree_service;

pub use credentials::{ICredentialRefresher, Tokens};
pub use status_sink::{IStatusSink, NullStatusSink};
pub use tree_service::ITreeService;
