//! Quire Versioning - Changeset lifecycle and the versioning engine
//!
//! This crate provides:
//! - Changeset lifecycle rules (staging, finalization, commit)
//! - VersioningEngine: staged writes, atomic commits, reads and history
//! - The VersionControl trait shared by local and remote engines
//! - The error type whose variants cross the RPC boundary

pub mod changeset;
pub mod engine;
pub mod error;
pub mod service;

// Re-export commonly used types
pub use changeset::Lifecycle;
pub use engine::{VersioningEngine, DEFAULT_VERSION_LIMIT};
pub use error::{Result, VersioningError};
pub use service::{LocalVcs, VersionControl};
