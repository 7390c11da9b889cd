use crate::{Result, VersioningError};
use chrono::Utc;
use quire_core::{AssociatedFile, Changeset, ChangesetStatus, FileInfo, PendingWrite};
use std::collections::{BTreeMap, BTreeSet};

/// Lifecycle rules of a changeset
///
/// These only inspect and mutate the in-memory record. The engine loads the
/// record, applies one of these under the changeset lock and persists the
/// result, so a rejected transition never reaches storage.
pub trait Lifecycle {
    /// Fail unless the changeset still accepts writes and association changes
    fn ensure_mutable(&self, operation: &str) -> Result<()>;

    /// Fail unless the association list is frozen
    fn ensure_files_finalized(&self) -> Result<()>;

    /// Add (or refresh) the association for `path`
    fn associate(&mut self, path: &str) -> Result<()>;

    /// Drop the association for `path`, returning whether it existed
    fn disassociate(&mut self, path: &str) -> Result<bool>;

    /// Drop the association for `path` ahead of discarding its staged write
    fn revert(&mut self, path: &str) -> Result<bool>;

    /// Freeze the association list against the staged writes
    fn finalize(&mut self, pending: &BTreeMap<String, PendingWrite>) -> Result<()>;

    /// Paths a commit would apply
    fn commit_paths(
        &self,
        pending: &BTreeMap<String, PendingWrite>,
        force: bool,
    ) -> Result<BTreeSet<String>>;

    /// Move to `Committed`, recording exactly the applied paths
    fn mark_committed(&mut self, pending: &BTreeMap<String, PendingWrite>, paths: &BTreeSet<String>);

    /// Non-validating view of the files in this changeset
    fn file_infos(&self, pending: &BTreeMap<String, PendingWrite>) -> BTreeMap<String, FileInfo>;
}

impl Lifecycle for Changeset {
    fn ensure_mutable(&self, operation: &str) -> Result<()> {
        match self.status {
            ChangesetStatus::Staging => Ok(()),
            ChangesetStatus::Committed => Err(VersioningError::already_committed(self.num)),
            status => Err(VersioningError::association_state(operation, self.num, status)),
        }
    }

    fn ensure_files_finalized(&self) -> Result<()> {
        if self.files_finalized() {
            Ok(())
        } else {
            Err(VersioningError::changeset_not_finalized(self.num))
        }
    }

    fn associate(&mut self, path: &str) -> Result<()> {
        self.ensure_mutable("associate file")?;
        self.associated_files
            .insert(path.to_string(), AssociatedFile::new(path));
        Ok(())
    }

    fn disassociate(&mut self, path: &str) -> Result<bool> {
        self.ensure_mutable("disassociate file")?;
        Ok(self.associated_files.remove(path).is_some())
    }

    fn revert(&mut self, path: &str) -> Result<bool> {
        self.ensure_mutable("revert file")?;
        Ok(self.associated_files.remove(path).is_some())
    }

    fn finalize(&mut self, pending: &BTreeMap<String, PendingWrite>) -> Result<()> {
        self.ensure_mutable("finalize associated files")?;

        if self.associated_files.is_empty() {
            return Err(VersioningError::empty_changeset(self.num));
        }

        let unassociated: Vec<String> = pending
            .keys()
            .filter(|path| !self.associated_files.contains_key(*path))
            .cloned()
            .collect();
        let unwritten: Vec<String> = self
            .associated_files
            .keys()
            .filter(|path| !pending.contains_key(*path))
            .cloned()
            .collect();
        if !unassociated.is_empty() || !unwritten.is_empty() {
            return Err(VersioningError::manifest_mismatch(
                self.num,
                &unassociated,
                &unwritten,
            ));
        }

        for (path, file) in self.associated_files.iter_mut() {
            if let Some(write) = pending.get(path) {
                snapshot(file, write);
            }
        }
        self.status = ChangesetStatus::Finalized;
        Ok(())
    }

    fn commit_paths(
        &self,
        pending: &BTreeMap<String, PendingWrite>,
        force: bool,
    ) -> Result<BTreeSet<String>> {
        match self.status {
            ChangesetStatus::Committed => return Err(VersioningError::already_committed(self.num)),
            ChangesetStatus::Staging if !force => {
                return Err(VersioningError::changeset_not_finalized(self.num))
            }
            _ => {}
        }

        let paths: BTreeSet<String> = if force {
            pending.keys().cloned().collect()
        } else {
            self.associated_files.keys().cloned().collect()
        };

        if paths.is_empty() {
            return Err(VersioningError::empty_changeset(self.num));
        }
        Ok(paths)
    }

    fn mark_committed(&mut self, pending: &BTreeMap<String, PendingWrite>, paths: &BTreeSet<String>) {
        let mut committed = BTreeMap::new();
        for path in paths {
            let mut file = self
                .associated_files
                .remove(path)
                .unwrap_or_else(|| AssociatedFile::new(path.as_str()));
            if let Some(write) = pending.get(path) {
                snapshot(&mut file, write);
            }
            committed.insert(path.clone(), file);
        }

        self.associated_files = committed;
        self.status = ChangesetStatus::Committed;
        self.committed = Some(Utc::now());
    }

    fn file_infos(&self, pending: &BTreeMap<String, PendingWrite>) -> BTreeMap<String, FileInfo> {
        if !self.is_committed() {
            return pending
                .iter()
                .map(|(path, write)| (path.clone(), FileInfo::from(write)))
                .collect();
        }

        self.associated_files
            .values()
            .map(|file| {
                let info = FileInfo {
                    path: file.path.clone(),
                    changeset: self.num,
                    size: file.size.unwrap_or_default(),
                    written: file.written.unwrap_or(file.associated),
                    deleted: file.deleted,
                };
                (file.path.clone(), info)
            })
            .collect()
    }
}

fn snapshot(file: &mut AssociatedFile, write: &PendingWrite) {
    file.size = Some(write.size());
    file.written = Some(write.written);
    file.deleted = write.deleted;
}
