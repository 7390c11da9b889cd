//! Quire Client - Remote access to a Quire server
//!
//! This crate provides:
//! - HttpTransport: RPC over HTTP with reqwest
//! - RemoteVcs / RemoteChangeset / RemoteFile proxies
//! - Factories selecting a local or remote backend

pub mod factory;
pub mod files;
pub mod transport;
pub mod vcs;

// Re-export commonly used types
pub use factory::{Backend, VcsFactory};
pub use files::{RemoteFile, RemoteFileFactory};
pub use transport::{HttpTransport, HttpTransportConfig, DEFAULT_SERVER_URL};
pub use vcs::{RemoteChangeset, RemoteVcs, RemoteVcsFactory};
