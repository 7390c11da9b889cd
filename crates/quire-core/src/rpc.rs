use crate::error::StructuredError;
use crate::types::ChangesetNum;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A versioning operation as carried over the RPC boundary
///
/// Serialized as `{"method": "<name>", "params": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "snake_case")]
pub enum RpcCall {
    NewStagingChangeset,
    GetChangeset {
        changeset: ChangesetNum,
    },
    AssociateFile {
        changeset: ChangesetNum,
        path: String,
    },
    DisassociateFile {
        changeset: ChangesetNum,
        path: String,
    },
    FinalizeAssociatedFiles {
        changeset: ChangesetNum,
    },
    GetFiles {
        changeset: ChangesetNum,
    },
    ListFiles {
        changeset: ChangesetNum,
    },
    Commit {
        changeset: ChangesetNum,
        #[serde(default)]
        force: bool,
    },
    LastCommittedChangeset,
    WriteFile {
        path: String,
        content: Vec<u8>,
        #[serde(default)]
        changeset: Option<ChangesetNum>,
    },
    DeleteFile {
        path: String,
        #[serde(default)]
        changeset: Option<ChangesetNum>,
    },
    RevertFile {
        changeset: ChangesetNum,
        path: String,
    },
    ReadFile {
        path: String,
    },
    GetFileVersions {
        path: String,
        #[serde(default)]
        limit: Option<usize>,
    },
}

impl RpcCall {
    /// Method name used on the wire
    pub fn method(&self) -> &'static str {
        match self {
            RpcCall::NewStagingChangeset => "new_staging_changeset",
            RpcCall::GetChangeset { .. } => "get_changeset",
            RpcCall::AssociateFile { .. } => "associate_file",
            RpcCall::DisassociateFile { .. } => "disassociate_file",
            RpcCall::FinalizeAssociatedFiles { .. } => "finalize_associated_files",
            RpcCall::GetFiles { .. } => "get_files",
            RpcCall::ListFiles { .. } => "list_files",
            RpcCall::Commit { .. } => "commit",
            RpcCall::LastCommittedChangeset => "last_committed_changeset",
            RpcCall::WriteFile { .. } => "write_file",
            RpcCall::DeleteFile { .. } => "delete_file",
            RpcCall::RevertFile { .. } => "revert_file",
            RpcCall::ReadFile { .. } => "read_file",
            RpcCall::GetFileVersions { .. } => "get_file_versions",
        }
    }
}

/// Why an RPC call did not produce a result
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcFailure {
    /// The server executed the call and reported a typed failure
    #[error("remote error: {0}")]
    Remote(StructuredError),

    /// The call did not complete: network failure, bad status, malformed body
    #[error("transport error: {0}")]
    Transport(String),
}

impl RpcFailure {
    pub fn transport(message: impl Into<String>) -> Self {
        RpcFailure::Transport(message.into())
    }
}

/// Request/response channel that carries [`RpcCall`]s across a process boundary
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Execute a call and return its JSON-encoded result
    async fn call(&self, call: RpcCall) -> Result<serde_json::Value, RpcFailure>;
}

/// Decode a call result into its expected type
///
/// A result that does not match the expected shape is a malformed response,
/// so it is reported as a transport failure.
pub fn decode_result<T: DeserializeOwned>(
    method: &str,
    value: serde_json::Value,
) -> Result<T, RpcFailure> {
    serde_json::from_value(value).map_err(|e| {
        RpcFailure::transport(format!("malformed {} response: {}", method, e))
    })
}
