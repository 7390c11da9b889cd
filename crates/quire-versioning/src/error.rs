// Allow unused assignments for diagnostic fields - they're used by the macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use quire_core::{ChangesetNum, ChangesetStatus, ErrorKind, RpcFailure, StructuredError};
use thiserror::Error;

/// Versioning error type
///
/// Every variant except `Transport` corresponds to an [`ErrorKind`] and
/// survives the trip across the RPC boundary with its message intact, so
/// callers can match on the variant whether the engine is local or remote.
#[derive(Error, Debug, Diagnostic)]
pub enum VersioningError {
    /// Write attempted outside a changeset
    #[error("{message}")]
    #[diagnostic(
        code(versioning::write_without_changeset),
        help("Create a staging changeset first and pass its number to the write")
    )]
    WriteWithoutChangeset { message: String },

    /// Association list can no longer change
    #[error("{message}")]
    #[diagnostic(
        code(versioning::association_state),
        help("Files can only be written, associated or finalized while the changeset is STAGING")
    )]
    AssociationState { message: String },

    /// Changeset files have not been finalized
    #[error("{message}")]
    #[diagnostic(
        code(versioning::changeset_not_finalized),
        help("Call finalize_associated_files() first, or commit with force")
    )]
    ChangesetNotFinalized { message: String },

    /// Changeset is already committed
    #[error("{message}")]
    #[diagnostic(
        code(versioning::already_committed),
        help("Committed changesets are immutable; start a new staging changeset")
    )]
    AlreadyCommitted { message: String },

    /// Changeset does not exist
    #[error("{message}")]
    #[diagnostic(
        code(versioning::changeset_not_found),
        help("Verify the changeset number is correct")
    )]
    ChangesetNotFound { message: String },

    /// Path has never been committed
    #[error("{message}")]
    #[diagnostic(code(versioning::file_not_found))]
    FileNotFound { message: String },

    /// Nothing to finalize or commit
    #[error("{message}")]
    #[diagnostic(
        code(versioning::empty_changeset),
        help("Write and associate at least one file")
    )]
    EmptyChangeset { message: String },

    /// Associations do not match the staged writes
    #[error("{message}")]
    #[diagnostic(
        code(versioning::manifest_mismatch),
        help("Associate every written file, and only written files, before finalizing")
    )]
    ManifestMismatch { message: String },

    /// Malformed file path
    #[error("{message}")]
    #[diagnostic(
        code(versioning::invalid_path),
        help("Paths must be absolute, must not end with '/', and must not contain empty, '.' or '..' segments")
    )]
    InvalidPath { message: String },

    /// Storage error
    #[error("Storage error: {0}")]
    #[diagnostic(
        code(versioning::storage_error),
        help("Check the underlying storage system")
    )]
    Storage(#[from] quire_storage::StorageError),

    /// Internal error
    #[error("Internal error: {message}")]
    #[diagnostic(
        code(versioning::internal_error),
        help("This is likely a bug. Please report it with full error details")
    )]
    Internal { message: String },

    /// The remote call did not complete
    #[error("Transport error: {message}")]
    #[diagnostic(
        code(versioning::transport_error),
        help("The server may be unreachable; the call can be retried")
    )]
    Transport { message: String },
}

/// Result type for versioning operations
pub type Result<T> = std::result::Result<T, VersioningError>;

impl VersioningError {
    /// Create a WriteWithoutChangeset error
    pub fn write_without_changeset(operation: &str, path: &str) -> Self {
        Self::WriteWithoutChangeset {
            message: format!("Cannot {} {}: no changeset given", operation, path),
        }
    }

    /// Create an AssociationState error
    pub fn association_state(
        operation: &str,
        changeset: ChangesetNum,
        status: ChangesetStatus,
    ) -> Self {
        Self::AssociationState {
            message: format!(
                "Cannot {} in changeset {} which is {}",
                operation, changeset, status
            ),
        }
    }

    /// Create a ChangesetNotFinalized error
    pub fn changeset_not_finalized(changeset: ChangesetNum) -> Self {
        Self::ChangesetNotFinalized {
            message: format!(
                "Cannot guarantee strong consistency when associated file paths of changeset {} have not been finalized",
                changeset
            ),
        }
    }

    /// Create an AlreadyCommitted error
    pub fn already_committed(changeset: ChangesetNum) -> Self {
        Self::AlreadyCommitted {
            message: format!("Changeset {} is already committed", changeset),
        }
    }

    /// Create a ChangesetNotFound error
    pub fn changeset_not_found(changeset: ChangesetNum) -> Self {
        Self::ChangesetNotFound {
            message: format!("Changeset {} does not exist", changeset),
        }
    }

    /// Create a FileNotFound error
    pub fn file_not_found(path: &str) -> Self {
        Self::FileNotFound {
            message: format!("File does not exist: {}", path),
        }
    }

    /// Create an EmptyChangeset error
    pub fn empty_changeset(changeset: ChangesetNum) -> Self {
        Self::EmptyChangeset {
            message: format!("Changeset {} contains no file changes", changeset),
        }
    }

    /// Create a ManifestMismatch error
    pub fn manifest_mismatch(
        changeset: ChangesetNum,
        unassociated: &[String],
        unwritten: &[String],
    ) -> Self {
        let mut parts = Vec::new();
        if !unassociated.is_empty() {
            parts.push(format!("written but not associated: {}", unassociated.join(", ")));
        }
        if !unwritten.is_empty() {
            parts.push(format!("associated but not written: {}", unwritten.join(", ")));
        }
        Self::ManifestMismatch {
            message: format!(
                "Associated files of changeset {} do not match its writes ({})",
                changeset,
                parts.join("; ")
            ),
        }
    }

    /// Create an InvalidPath error
    pub fn invalid_path(path: &str) -> Self {
        Self::InvalidPath {
            message: format!("Not a valid file path: {:?}", path),
        }
    }

    /// Create an Internal error
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a Transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// The wire kind of this error, `None` for transport failures
    pub fn kind(&self) -> Option<ErrorKind> {
        let kind = match self {
            Self::WriteWithoutChangeset { .. } => ErrorKind::WriteWithoutChangeset,
            Self::AssociationState { .. } => ErrorKind::AssociationState,
            Self::ChangesetNotFinalized { .. } => ErrorKind::ChangesetNotFinalized,
            Self::AlreadyCommitted { .. } => ErrorKind::AlreadyCommitted,
            Self::ChangesetNotFound { .. } => ErrorKind::ChangesetNotFound,
            Self::FileNotFound { .. } => ErrorKind::FileNotFound,
            Self::EmptyChangeset { .. } => ErrorKind::EmptyChangeset,
            Self::ManifestMismatch { .. } => ErrorKind::ManifestMismatch,
            Self::InvalidPath { .. } => ErrorKind::InvalidPath,
            Self::Storage(_) | Self::Internal { .. } => ErrorKind::Internal,
            Self::Transport { .. } => return None,
        };
        Some(kind)
    }

    /// Whether this error says nothing about versioning state
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Encode for the wire
    ///
    /// A transport error has no wire kind of its own; if one ever has to be
    /// relayed it goes out as `internal`.
    pub fn to_structured(&self) -> StructuredError {
        let message = match self {
            Self::Internal { message } => message.clone(),
            other => other.to_string(),
        };
        StructuredError::new(self.kind().unwrap_or(ErrorKind::Internal), message)
    }

    /// Rebuild the local error from its wire form
    pub fn from_structured(err: StructuredError) -> Self {
        let message = err.message;
        match err.kind {
            ErrorKind::WriteWithoutChangeset => Self::WriteWithoutChangeset { message },
            ErrorKind::AssociationState => Self::AssociationState { message },
            ErrorKind::ChangesetNotFinalized => Self::ChangesetNotFinalized { message },
            ErrorKind::AlreadyCommitted => Self::AlreadyCommitted { message },
            ErrorKind::ChangesetNotFound => Self::ChangesetNotFound { message },
            ErrorKind::FileNotFound => Self::FileNotFound { message },
            ErrorKind::EmptyChangeset => Self::EmptyChangeset { message },
            ErrorKind::ManifestMismatch => Self::ManifestMismatch { message },
            ErrorKind::InvalidPath => Self::InvalidPath { message },
            ErrorKind::Internal => Self::Internal { message },
        }
    }
}

impl From<RpcFailure> for VersioningError {
    fn from(failure: RpcFailure) -> Self {
        match failure {
            RpcFailure::Remote(err) => Self::from_structured(err),
            RpcFailure::Transport(message) => Self::Transport { message },
        }
    }
}

impl From<quire_core::QuireError> for VersioningError {
    fn from(err: quire_core::QuireError) -> Self {
        match err {
            quire_core::QuireError::InvalidPath { path } => Self::invalid_path(&path),
            other => Self::internal_error(other.to_string()),
        }
    }
}
