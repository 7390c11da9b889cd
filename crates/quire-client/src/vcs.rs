use crate::files::{RemoteFile, RemoteFileFactory};
use async_trait::async_trait;
use quire_core::{
    decode_result, AssociatedFile, Changeset, ChangesetNum, ChangesetStatus, FileInfo,
    FileRecord, FileVersion, PendingWrite, RpcCall, RpcTransport,
};
use quire_versioning::{Result, VersionControl};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Proxy for a versioning engine behind an [`RpcTransport`]
///
/// Holds no state of its own: every call is answered by the server.
#[derive(Clone)]
pub struct RemoteVcs {
    transport: Arc<dyn RpcTransport>,
}

impl RemoteVcs {
    pub fn new(transport: Arc<dyn RpcTransport>) -> Self {
        Self { transport }
    }

    pub(crate) async fn invoke<T: DeserializeOwned>(&self, call: RpcCall) -> Result<T> {
        let method = call.method();
        debug!("Remote call: {}", method);

        let value = self.transport.call(call).await?;
        Ok(decode_result(method, value)?)
    }

    /// Allocate a staging changeset on the server
    pub async fn new_staging_changeset(&self) -> Result<RemoteChangeset> {
        let changeset: Changeset = self.invoke(RpcCall::NewStagingChangeset).await?;
        Ok(self.make_remote_changeset(changeset.num))
    }

    /// Handle to an existing changeset
    ///
    /// Makes no server call; an unknown number only shows up as
    /// `ChangesetNotFound` once the handle is used.
    pub fn make_remote_changeset(&self, num: ChangesetNum) -> RemoteChangeset {
        RemoteChangeset {
            num,
            vcs: self.clone(),
        }
    }

    pub async fn commit(&self, changeset: &RemoteChangeset, force: bool) -> Result<Changeset> {
        self.invoke(RpcCall::Commit {
            changeset: changeset.num,
            force,
        })
        .await
    }

    /// Factory for files served by the same server
    pub fn file_factory(&self) -> RemoteFileFactory {
        RemoteFileFactory::from_vcs(self.clone())
    }
}

#[async_trait]
impl VersionControl for RemoteVcs {
    async fn new_staging_changeset(&self) -> Result<Changeset> {
        self.invoke(RpcCall::NewStagingChangeset).await
    }

    async fn get_changeset(&self, num: ChangesetNum) -> Result<Changeset> {
        self.invoke(RpcCall::GetChangeset { changeset: num }).await
    }

    async fn associate_file(&self, num: ChangesetNum, path: &str) -> Result<Changeset> {
        self.invoke(RpcCall::AssociateFile {
            changeset: num,
            path: path.to_string(),
        })
        .await
    }

    async fn disassociate_file(&self, num: ChangesetNum, path: &str) -> Result<Changeset> {
        self.invoke(RpcCall::DisassociateFile {
            changeset: num,
            path: path.to_string(),
        })
        .await
    }

    async fn finalize_associated_files(&self, num: ChangesetNum) -> Result<Changeset> {
        self.invoke(RpcCall::FinalizeAssociatedFiles { changeset: num })
            .await
    }

    async fn get_files(&self, num: ChangesetNum) -> Result<BTreeMap<String, AssociatedFile>> {
        self.invoke(RpcCall::GetFiles { changeset: num }).await
    }

    async fn list_files(&self, num: ChangesetNum) -> Result<BTreeMap<String, FileInfo>> {
        self.invoke(RpcCall::ListFiles { changeset: num }).await
    }

    async fn commit(&self, num: ChangesetNum, force: bool) -> Result<Changeset> {
        self.invoke(RpcCall::Commit {
            changeset: num,
            force,
        })
        .await
    }

    async fn write_file(
        &self,
        path: &str,
        content: &[u8],
        changeset: Option<ChangesetNum>,
    ) -> Result<PendingWrite> {
        self.invoke(RpcCall::WriteFile {
            path: path.to_string(),
            content: content.to_vec(),
            changeset,
        })
        .await
    }

    async fn delete_file(
        &self,
        path: &str,
        changeset: Option<ChangesetNum>,
    ) -> Result<PendingWrite> {
        self.invoke(RpcCall::DeleteFile {
            path: path.to_string(),
            changeset,
        })
        .await
    }

    async fn revert_file(&self, num: ChangesetNum, path: &str) -> Result<Changeset> {
        self.invoke(RpcCall::RevertFile {
            changeset: num,
            path: path.to_string(),
        })
        .await
    }

    async fn read_file(&self, path: &str) -> Result<FileRecord> {
        self.invoke(RpcCall::ReadFile {
            path: path.to_string(),
        })
        .await
    }

    async fn get_file_versions(&self, path: &str, limit: Option<usize>) -> Result<Vec<FileVersion>> {
        self.invoke(RpcCall::GetFileVersions {
            path: path.to_string(),
            limit,
        })
        .await
    }

    async fn last_committed_changeset(&self) -> Result<Option<Changeset>> {
        self.invoke(RpcCall::LastCommittedChangeset).await
    }
}

/// Handle to a changeset on the server
///
/// Only the number is kept locally. Status and associations are fetched on
/// every call, so two handles to the same number always agree.
#[derive(Clone)]
pub struct RemoteChangeset {
    num: ChangesetNum,
    vcs: RemoteVcs,
}

impl fmt::Debug for RemoteChangeset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteChangeset")
            .field("num", &self.num)
            .finish()
    }
}

impl RemoteChangeset {
    pub fn num(&self) -> ChangesetNum {
        self.num
    }

    /// Current record from the server
    pub async fn changeset(&self) -> Result<Changeset> {
        VersionControl::get_changeset(&self.vcs, self.num).await
    }

    pub async fn status(&self) -> Result<ChangesetStatus> {
        Ok(self.changeset().await?.status)
    }

    pub async fn associate_file(&self, file: &RemoteFile) -> Result<Changeset> {
        VersionControl::associate_file(&self.vcs, self.num, file.path()).await
    }

    pub async fn disassociate_file(&self, file: &RemoteFile) -> Result<Changeset> {
        VersionControl::disassociate_file(&self.vcs, self.num, file.path()).await
    }

    /// Drop the file's association and its staged write or delete
    pub async fn revert_file(&self, file: &RemoteFile) -> Result<Changeset> {
        VersionControl::revert_file(&self.vcs, self.num, file.path()).await
    }

    pub async fn finalize_associated_files(&self) -> Result<Changeset> {
        VersionControl::finalize_associated_files(&self.vcs, self.num).await
    }

    pub async fn get_files(&self) -> Result<BTreeMap<String, AssociatedFile>> {
        VersionControl::get_files(&self.vcs, self.num).await
    }

    pub async fn list_files(&self) -> Result<BTreeMap<String, FileInfo>> {
        VersionControl::list_files(&self.vcs, self.num).await
    }
}

/// Builds [`RemoteVcs`] proxies that share one transport
#[derive(Clone)]
pub struct RemoteVcsFactory {
    transport: Arc<dyn RpcTransport>,
}

impl RemoteVcsFactory {
    pub fn new(transport: Arc<dyn RpcTransport>) -> Self {
        Self { transport }
    }

    pub fn make_remote_vcs(&self) -> RemoteVcs {
        RemoteVcs::new(Arc::clone(&self.transport))
    }
}
