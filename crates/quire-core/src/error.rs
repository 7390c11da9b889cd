// Allow unused assignments for diagnostic fields - they're used by the macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Closed set of failure kinds that cross the RPC boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    WriteWithoutChangeset,
    AssociationState,
    ChangesetNotFinalized,
    AlreadyCommitted,
    ChangesetNotFound,
    FileNotFound,
    EmptyChangeset,
    ManifestMismatch,
    InvalidPath,
    Internal,
}

impl ErrorKind {
    /// All kinds, in declaration order
    pub const ALL: [ErrorKind; 10] = [
        ErrorKind::WriteWithoutChangeset,
        ErrorKind::AssociationState,
        ErrorKind::ChangesetNotFinalized,
        ErrorKind::AlreadyCommitted,
        ErrorKind::ChangesetNotFound,
        ErrorKind::FileNotFound,
        ErrorKind::EmptyChangeset,
        ErrorKind::ManifestMismatch,
        ErrorKind::InvalidPath,
        ErrorKind::Internal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::WriteWithoutChangeset => "write_without_changeset",
            ErrorKind::AssociationState => "association_state",
            ErrorKind::ChangesetNotFinalized => "changeset_not_finalized",
            ErrorKind::AlreadyCommitted => "already_committed",
            ErrorKind::ChangesetNotFound => "changeset_not_found",
            ErrorKind::FileNotFound => "file_not_found",
            ErrorKind::EmptyChangeset => "empty_changeset",
            ErrorKind::ManifestMismatch => "manifest_mismatch",
            ErrorKind::InvalidPath => "invalid_path",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed failure as serialized on the wire: `{"kind": ..., "message": ...}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredError {
    pub kind: ErrorKind,
    pub message: String,
}

impl StructuredError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for StructuredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for StructuredError {}

/// Core error type for Quire operations
#[derive(Error, Debug, Diagnostic)]
pub enum QuireError {
    /// Serialization error
    #[error("Serialization error: {message}")]
    #[diagnostic(
        code(quire::serialization_error),
        help("Ensure the payload is valid JSON")
    )]
    SerializationError {
        #[allow(unused)]
        message: String,
        #[source]
        #[allow(unused)]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Invalid file path
    #[error("Invalid file path: {path}")]
    #[diagnostic(
        code(quire::invalid_path),
        help("Paths must be absolute, must not end with '/', and must not contain empty, '.' or '..' segments")
    )]
    InvalidPath {
        #[allow(unused)]
        path: String,
    },
}

/// Result type alias for Quire core operations
pub type Result<T> = std::result::Result<T, QuireError>;

impl QuireError {
    /// Create a SerializationError
    pub fn serialization_error(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::SerializationError {
            message: message.into(),
            source,
        }
    }

    /// Create an InvalidPath error
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath { path: path.into() }
    }
}
