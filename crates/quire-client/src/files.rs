use crate::vcs::{RemoteChangeset, RemoteVcs};
use quire_core::{ChangesetNum, FileRecord, FileVersion, PendingWrite, RpcCall, RpcTransport};
use quire_versioning::Result;
use std::fmt;
use std::sync::Arc;

/// A path on the server, optionally bound to a changeset for writing
#[derive(Clone)]
pub struct RemoteFile {
    path: String,
    changeset: Option<ChangesetNum>,
    vcs: RemoteVcs,
}

impl fmt::Debug for RemoteFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteFile")
            .field("path", &self.path)
            .field("changeset", &self.changeset)
            .finish()
    }
}

impl RemoteFile {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn changeset(&self) -> Option<ChangesetNum> {
        self.changeset
    }

    /// Stage `content` under this file's changeset
    ///
    /// The server rejects the write with `WriteWithoutChangeset` when the
    /// file is not bound to one.
    pub async fn write(&self, content: &[u8]) -> Result<PendingWrite> {
        self.vcs
            .invoke(RpcCall::WriteFile {
                path: self.path.clone(),
                content: content.to_vec(),
                changeset: self.changeset,
            })
            .await
    }

    /// Stage removal of this file under its changeset
    ///
    /// The file stays readable until the changeset is committed.
    pub async fn delete(&self) -> Result<PendingWrite> {
        self.vcs
            .invoke(RpcCall::DeleteFile {
                path: self.path.clone(),
                changeset: self.changeset,
            })
            .await
    }

    /// Latest committed state
    pub async fn read(&self) -> Result<FileRecord> {
        self.vcs
            .invoke(RpcCall::ReadFile {
                path: self.path.clone(),
            })
            .await
    }

    pub async fn content(&self) -> Result<Vec<u8>> {
        Ok(self.read().await?.content)
    }

    pub async fn versions(&self, limit: Option<usize>) -> Result<Vec<FileVersion>> {
        self.vcs
            .invoke(RpcCall::GetFileVersions {
                path: self.path.clone(),
                limit,
            })
            .await
    }
}

/// Builds [`RemoteFile`] handles
#[derive(Clone)]
pub struct RemoteFileFactory {
    vcs: RemoteVcs,
}

impl RemoteFileFactory {
    pub fn new(transport: Arc<dyn RpcTransport>) -> Self {
        Self::from_vcs(RemoteVcs::new(transport))
    }

    pub(crate) fn from_vcs(vcs: RemoteVcs) -> Self {
        Self { vcs }
    }

    pub fn make_remote_file(&self, path: &str, changeset: Option<&RemoteChangeset>) -> RemoteFile {
        RemoteFile {
            path: path.to_string(),
            changeset: changeset.map(RemoteChangeset::num),
            vcs: self.vcs.clone(),
        }
    }
}
