//! Microsoft Graph adapter for DriveMirror
//!
//! Implements the core ports against the Microsoft Graph API:
//!
//! - [`client`] - authenticated HTTP transport with throttling backoff
//! - [`auth`] - device-code sign-in and the file-backed token cache
//! - [`tree`] - the remote tree service (items, server-side copies,
//!   sharing permissions)
//!
//! A mirror run builds two of everything here, one per account: two
//! token stores, two clients, two tree services, and a refresher for the
//! destination session that drives the mid-run renewal protocol.

pub mod auth;
pub mod client;
pub mod tree;

pub use auth::{
    AccountAuthenticator, DeviceAuthConfig, DeviceCodeFlow, GraphRefresher, TokenCacheFile,
};
pub use client::{GraphClient, GRAPH_BASE_URL};
pub use tree::GraphTreeService;
