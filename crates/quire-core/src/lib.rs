//! Quire Core - Fundamental types for the Quire changeset versioning engine
//!
//! This crate provides:
//! - The changeset and file data model
//! - The closed set of error kinds that cross the RPC boundary
//! - RPC call types and the transport trait
//! - Serialization helpers

pub mod error;
pub mod rpc;
pub mod types;

// Re-export commonly used types
pub use error::{ErrorKind, QuireError, Result, StructuredError};
pub use rpc::{decode_result, RpcCall, RpcFailure, RpcTransport};
pub use types::{
    is_valid_path, AssociatedFile, Changeset, ChangesetNum, ChangesetStatus, FileInfo,
    FileRecord, FileVersion, PendingWrite,
};

/// Serialize a value to JSON bytes
pub fn to_json<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| {
        QuireError::serialization_error(
            format!("Failed to serialize to JSON: {}", e),
            Some(Box::new(e)),
        )
    })
}

/// Deserialize a value from JSON bytes
pub fn from_json<T: for<'de> serde::Deserialize<'de>>(data: &[u8]) -> Result<T> {
    serde_json::from_slice(data).map_err(|e| {
        QuireError::serialization_error(
            format!("Failed to deserialize from JSON: {}", e),
            Some(Box::new(e)),
        )
    })
}

/// Validate a file path, returning it unchanged when valid
pub fn validate_path(path: &str) -> Result<&str> {
    if is_valid_path(path) {
        Ok(path)
    } else {
        Err(QuireError::invalid_path(path))
    }
}
