//! Quire Storage - Storage abstraction, redb backend and file store
//!
//! This crate provides:
//! - KVStore trait for storage abstraction
//! - redb-based implementation
//! - Key encoding
//! - FileStore: committed file tree plus per-changeset staging areas

pub mod encoding;
pub mod error;
pub mod filestore;
pub mod kv;
pub mod redb_backend;

// Re-export commonly used types
pub use encoding::KeyEncoder;
pub use error::{Result, StorageError};
pub use filestore::FileStore;
pub use kv::{KVStore, Transaction};
pub use redb_backend::RedbBackend;
