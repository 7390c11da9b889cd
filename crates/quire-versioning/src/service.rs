use crate::{Result, VersioningEngine};
use async_trait::async_trait;
use quire_core::{AssociatedFile, Changeset, ChangesetNum, FileInfo, FileRecord, FileVersion, PendingWrite};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Versioning operations, independent of where the engine runs
///
/// Implemented by [`LocalVcs`] for an in-process engine and by the remote
/// proxy in `quire-client`, so callers can hold an `Arc<dyn VersionControl>`
/// and not care which one they got.
#[async_trait]
pub trait VersionControl: Send + Sync {
    async fn new_staging_changeset(&self) -> Result<Changeset>;

    async fn get_changeset(&self, num: ChangesetNum) -> Result<Changeset>;

    async fn associate_file(&self, num: ChangesetNum, path: &str) -> Result<Changeset>;

    async fn disassociate_file(&self, num: ChangesetNum, path: &str) -> Result<Changeset>;

    async fn finalize_associated_files(&self, num: ChangesetNum) -> Result<Changeset>;

    async fn get_files(&self, num: ChangesetNum) -> Result<BTreeMap<String, AssociatedFile>>;

    async fn list_files(&self, num: ChangesetNum) -> Result<BTreeMap<String, FileInfo>>;

    async fn commit(&self, num: ChangesetNum, force: bool) -> Result<Changeset>;

    async fn write_file(
        &self,
        path: &str,
        content: &[u8],
        changeset: Option<ChangesetNum>,
    ) -> Result<PendingWrite>;

    async fn delete_file(
        &self,
        path: &str,
        changeset: Option<ChangesetNum>,
    ) -> Result<PendingWrite>;

    async fn revert_file(&self, num: ChangesetNum, path: &str) -> Result<Changeset>;

    async fn read_file(&self, path: &str) -> Result<FileRecord>;

    async fn get_file_versions(&self, path: &str, limit: Option<usize>) -> Result<Vec<FileVersion>>;

    async fn last_committed_changeset(&self) -> Result<Option<Changeset>>;
}

/// [`VersionControl`] over an engine in this process
#[derive(Clone)]
pub struct LocalVcs {
    engine: Arc<VersioningEngine>,
}

impl LocalVcs {
    pub fn new(engine: Arc<VersioningEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl VersionControl for LocalVcs {
    async fn new_staging_changeset(&self) -> Result<Changeset> {
        self.engine.new_staging_changeset()
    }

    async fn get_changeset(&self, num: ChangesetNum) -> Result<Changeset> {
        self.engine.get_changeset(num)
    }

    async fn associate_file(&self, num: ChangesetNum, path: &str) -> Result<Changeset> {
        self.engine.associate_file(num, path)
    }

    async fn disassociate_file(&self, num: ChangesetNum, path: &str) -> Result<Changeset> {
        self.engine.disassociate_file(num, path)
    }

    async fn finalize_associated_files(&self, num: ChangesetNum) -> Result<Changeset> {
        self.engine.finalize_associated_files(num)
    }

    async fn get_files(&self, num: ChangesetNum) -> Result<BTreeMap<String, AssociatedFile>> {
        self.engine.get_files(num)
    }

    async fn list_files(&self, num: ChangesetNum) -> Result<BTreeMap<String, FileInfo>> {
        self.engine.list_files(num)
    }

    async fn commit(&self, num: ChangesetNum, force: bool) -> Result<Changeset> {
        self.engine.commit(num, force)
    }

    async fn write_file(
        &self,
        path: &str,
        content: &[u8],
        changeset: Option<ChangesetNum>,
    ) -> Result<PendingWrite> {
        self.engine.write_file(path, content, changeset)
    }

    async fn delete_file(
        &self,
        path: &str,
        changeset: Option<ChangesetNum>,
    ) -> Result<PendingWrite> {
        self.engine.delete_file(path, changeset)
    }

    async fn revert_file(&self, num: ChangesetNum, path: &str) -> Result<Changeset> {
        self.engine.revert_file(num, path)
    }

    async fn read_file(&self, path: &str) -> Result<FileRecord> {
        self.engine.read_file(path)
    }

    async fn get_file_versions(&self, path: &str, limit: Option<usize>) -> Result<Vec<FileVersion>> {
        self.engine.get_file_versions(path, limit)
    }

    async fn last_committed_changeset(&self) -> Result<Option<Changeset>> {
        self.engine.last_committed_changeset()
    }
}
