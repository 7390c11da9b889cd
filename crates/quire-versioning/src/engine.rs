use crate::changeset::Lifecycle;
use crate::{Result, VersioningError};
use parking_lot::Mutex;
use quire_core::{
    validate_path, AssociatedFile, Changeset, ChangesetNum, FileInfo, FileRecord, FileVersion,
    PendingWrite,
};
use quire_storage::{FileStore, KVStore, RedbBackend};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Weak};
use tracing::{debug, info};

/// Default number of revisions returned by [`VersioningEngine::get_file_versions`]
pub const DEFAULT_VERSION_LIMIT: usize = 1000;

/// Changeset-oriented versioning engine
///
/// Writes are staged under a changeset and only become visible to readers
/// when that changeset is committed. Every operation that changes a
/// changeset runs its whole load-validate-persist sequence under a lock for
/// that changeset number; operations on different changesets proceed in
/// parallel.
pub struct VersioningEngine {
    store: FileStore,
    /// Lock per changeset number, alive only while an operation holds it
    locks: Mutex<HashMap<ChangesetNum, Weak<Mutex<()>>>>,
    /// Serializes allocation of changeset numbers
    counter: Mutex<()>,
}

impl VersioningEngine {
    /// Create an engine over any key-value backend
    pub fn new(kv: Arc<dyn KVStore>) -> Self {
        info!("Initializing VersioningEngine");

        Self {
            store: FileStore::new(kv),
            locks: Mutex::new(HashMap::new()),
            counter: Mutex::new(()),
        }
    }

    /// Open (or create) a redb-backed engine at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let backend = RedbBackend::new(path)?;
        Ok(Self::new(Arc::new(backend)))
    }

    fn changeset_lock(&self, num: ChangesetNum) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        if let Some(lock) = locks.get(&num).and_then(Weak::upgrade) {
            return lock;
        }

        // Drop entries no operation holds any more
        locks.retain(|_, lock| lock.strong_count() > 0);
        let lock = Arc::new(Mutex::new(()));
        locks.insert(num, Arc::downgrade(&lock));
        lock
    }

    fn load(&self, num: ChangesetNum) -> Result<Changeset> {
        self.store
            .get_changeset(num)?
            .ok_or_else(|| VersioningError::changeset_not_found(num))
    }

    /// Allocate a new changeset in `Staging` with no associations
    pub fn new_staging_changeset(&self) -> Result<Changeset> {
        let _guard = self.counter.lock();

        let num = self.store.allocate_changeset_num()?;
        let changeset = Changeset::staging(num);
        self.store.put_changeset(&changeset)?;

        info!("Created staging changeset {}", num);
        Ok(changeset)
    }

    /// Current state of a changeset
    pub fn get_changeset(&self, num: ChangesetNum) -> Result<Changeset> {
        self.load(num)
    }

    pub fn associate_file(&self, num: ChangesetNum, path: &str) -> Result<Changeset> {
        let path = validate_path(path)?;
        let lock = self.changeset_lock(num);
        let _guard = lock.lock();

        let mut changeset = self.load(num)?;
        changeset.associate(path)?;
        self.store.put_changeset(&changeset)?;

        debug!("Associated {} with changeset {}", path, num);
        Ok(changeset)
    }

    pub fn disassociate_file(&self, num: ChangesetNum, path: &str) -> Result<Changeset> {
        let path = validate_path(path)?;
        let lock = self.changeset_lock(num);
        let _guard = lock.lock();

        let mut changeset = self.load(num)?;
        if changeset.disassociate(path)? {
            self.store.put_changeset(&changeset)?;
            debug!("Disassociated {} from changeset {}", path, num);
        }
        Ok(changeset)
    }

    /// Freeze the association list of a changeset
    ///
    /// The associations must name exactly the paths written under the
    /// changeset. On success each association carries the size and time of
    /// its staged write and the changeset moves to `Finalized`.
    pub fn finalize_associated_files(&self, num: ChangesetNum) -> Result<Changeset> {
        let lock = self.changeset_lock(num);
        let _guard = lock.lock();

        let mut changeset = self.load(num)?;
        let pending = self.store.get_pending_writes(num)?;
        changeset.finalize(&pending)?;
        self.store.put_changeset(&changeset)?;

        info!(
            "Finalized changeset {} with {} files",
            num,
            changeset.associated_files.len()
        );
        Ok(changeset)
    }

    /// Associated files of a finalized or committed changeset
    pub fn get_files(&self, num: ChangesetNum) -> Result<BTreeMap<String, AssociatedFile>> {
        let changeset = self.load(num)?;
        changeset.ensure_files_finalized()?;
        Ok(changeset.associated_files)
    }

    /// Files currently in a changeset, without lifecycle checks
    ///
    /// Staged writes for an uncommitted changeset, the applied files for a
    /// committed one.
    pub fn list_files(&self, num: ChangesetNum) -> Result<BTreeMap<String, FileInfo>> {
        let changeset = self.load(num)?;
        let pending = if changeset.is_committed() {
            BTreeMap::new()
        } else {
            self.store.get_pending_writes(num)?
        };
        Ok(changeset.file_infos(&pending))
    }

    /// Commit a changeset
    ///
    /// Without `force` the changeset must be finalized and its associated
    /// files are applied. With `force` every staged write of the changeset
    /// is applied regardless of associations. The file records, their
    /// version entries and the committed changeset record are stored in one
    /// transaction.
    pub fn commit(&self, num: ChangesetNum, force: bool) -> Result<Changeset> {
        let lock = self.changeset_lock(num);
        let _guard = lock.lock();

        let mut changeset = self.load(num)?;
        let pending = self.store.get_pending_writes(num)?;
        let paths = changeset.commit_paths(&pending, force)?;

        changeset.mark_committed(&pending, &paths);
        self.store.apply_committed(&changeset, &paths)?;

        info!(
            "Committed changeset {} ({} files{})",
            num,
            paths.len(),
            if force { ", forced" } else { "" }
        );
        Ok(changeset)
    }

    /// Stage a write under a changeset
    pub fn write_file(
        &self,
        path: &str,
        content: &[u8],
        changeset: Option<ChangesetNum>,
    ) -> Result<PendingWrite> {
        let num =
            changeset.ok_or_else(|| VersioningError::write_without_changeset("write", path))?;
        let path = validate_path(path)?;
        let lock = self.changeset_lock(num);
        let _guard = lock.lock();

        self.load(num)?.ensure_mutable("write file")?;
        Ok(self.store.write(path, content, num)?)
    }

    /// Stage removal of a path under a changeset
    ///
    /// Same preconditions as [`write_file`](Self::write_file). The tombstone
    /// replaces any write staged for the path in this changeset; committing
    /// it removes the path from the committed view and records a deleted
    /// revision.
    pub fn delete_file(
        &self,
        path: &str,
        changeset: Option<ChangesetNum>,
    ) -> Result<PendingWrite> {
        let num =
            changeset.ok_or_else(|| VersioningError::write_without_changeset("delete", path))?;
        let path = validate_path(path)?;
        let lock = self.changeset_lock(num);
        let _guard = lock.lock();

        self.load(num)?.ensure_mutable("delete file")?;
        let tombstone = self.store.delete(path, num)?;

        debug!("Staged delete of {} in changeset {}", path, num);
        Ok(tombstone)
    }

    /// Take a path back out of a staging changeset
    ///
    /// Drops both the association and the staged write or delete of `path`.
    /// Reverting a path the changeset never touched is a no-op.
    pub fn revert_file(&self, num: ChangesetNum, path: &str) -> Result<Changeset> {
        let path = validate_path(path)?;
        let lock = self.changeset_lock(num);
        let _guard = lock.lock();

        let mut changeset = self.load(num)?;
        if changeset.revert(path)? {
            self.store.put_changeset(&changeset)?;
        }
        let discarded = self.store.discard_pending(num, path)?;

        debug!(
            "Reverted {} in changeset {} (staged write {})",
            path,
            num,
            if discarded { "dropped" } else { "absent" }
        );
        Ok(changeset)
    }

    /// Latest committed content of a path
    pub fn read_file(&self, path: &str) -> Result<FileRecord> {
        let path = validate_path(path)?;
        self.store
            .read(path)?
            .ok_or_else(|| VersioningError::file_not_found(path))
    }

    /// Committed revisions of a path, newest first
    pub fn get_file_versions(&self, path: &str, limit: Option<usize>) -> Result<Vec<FileVersion>> {
        let path = validate_path(path)?;
        let limit = limit.unwrap_or(DEFAULT_VERSION_LIMIT);
        Ok(self.store.file_versions(path, limit)?)
    }

    pub fn last_committed_changeset(&self) -> Result<Option<Changeset>> {
        match self.store.last_committed()? {
            Some(num) => Ok(Some(self.load(num)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use quire_core::ChangesetStatus;
    use quire_storage::{StorageError, Transaction};
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::tempdir;

    fn make_engine() -> (tempfile::TempDir, VersioningEngine) {
        let dir = tempdir().unwrap();
        let engine = VersioningEngine::open(dir.path().join("test.redb")).unwrap();
        (dir, engine)
    }

    /// Backend whose transactions fail partway through once armed
    struct FaultyKv {
        inner: RedbBackend,
        armed: AtomicBool,
    }

    struct FaultyTxn {
        inner: Box<dyn Transaction>,
        puts: usize,
    }

    impl KVStore for FaultyKv {
        fn get(&self, key: &[u8]) -> quire_storage::Result<Option<Bytes>> {
            self.inner.get(key)
        }
        fn put(&self, key: &[u8], value: &[u8]) -> quire_storage::Result<()> {
            self.inner.put(key, value)
        }
        fn delete(&self, key: &[u8]) -> quire_storage::Result<()> {
            self.inner.delete(key)
        }
        fn scan(&self, prefix: &[u8]) -> quire_storage::Result<Vec<(Bytes, Bytes)>> {
            self.inner.scan(prefix)
        }
        fn transaction(&self) -> quire_storage::Result<Box<dyn Transaction>> {
            let txn = self.inner.transaction()?;
            if self.armed.load(Ordering::SeqCst) {
                Ok(Box::new(FaultyTxn { inner: txn, puts: 0 }))
            } else {
                Ok(txn)
            }
        }
    }

    impl Transaction for FaultyTxn {
        fn get(&self, key: &[u8]) -> quire_storage::Result<Option<Bytes>> {
            self.inner.get(key)
        }
        fn put(&mut self, key: &[u8], value: &[u8]) -> quire_storage::Result<()> {
            self.puts += 1;
            if self.puts > 3 {
                return Err(StorageError::transaction_error("injected failure"));
            }
            self.inner.put(key, value)
        }
        fn delete(&mut self, key: &[u8]) -> quire_storage::Result<()> {
            self.inner.delete(key)
        }
        fn commit(self: Box<Self>) -> quire_storage::Result<()> {
            self.inner.commit()
        }
    }

    #[test]
    fn test_write_requires_changeset() {
        let (_dir, engine) = make_engine();
        let result = engine.write_file("/a/foo", b"foo!", None);
        assert!(matches!(
            result,
            Err(VersioningError::WriteWithoutChangeset { .. })
        ));
    }

    #[test]
    fn test_write_to_unknown_changeset() {
        let (_dir, engine) = make_engine();
        let result = engine.write_file("/a/foo", b"foo!", Some(ChangesetNum::new(42)));
        assert!(matches!(
            result,
            Err(VersioningError::ChangesetNotFound { .. })
        ));
    }

    #[test]
    fn test_invalid_paths_rejected() {
        let (_dir, engine) = make_engine();
        let cs = engine.new_staging_changeset().unwrap();

        for path in ["a/foo", "/a/", "/a//foo", "/a/../foo", "/a\0evil", "/a\nb"] {
            assert!(matches!(
                engine.write_file(path, b"x", Some(cs.num)),
                Err(VersioningError::InvalidPath { .. })
            ));
        }
        assert!(matches!(
            engine.associate_file(cs.num, "relative"),
            Err(VersioningError::InvalidPath { .. })
        ));
    }

    #[test]
    fn test_nul_path_cannot_alias_version_history() {
        let (_dir, engine) = make_engine();

        let c1 = engine.new_staging_changeset().unwrap();
        engine.write_file("/a", b"a", Some(c1.num)).unwrap();
        engine.commit(c1.num, true).unwrap();

        let c2 = engine.new_staging_changeset().unwrap();
        assert!(matches!(
            engine.write_file("/a\0evil", b"evil", Some(c2.num)),
            Err(VersioningError::InvalidPath { .. })
        ));
        assert!(matches!(
            engine.delete_file("/a\0evil", Some(c2.num)),
            Err(VersioningError::InvalidPath { .. })
        ));
        assert!(matches!(
            engine.get_file_versions("/a\0", None),
            Err(VersioningError::InvalidPath { .. })
        ));

        let versions = engine.get_file_versions("/a", None).unwrap();
        assert_eq!(versions.len(), 1);
        assert!(versions.iter().all(|v| v.path == "/a"));
    }

    #[test]
    fn test_changeset_numbers_are_monotonic() {
        let (_dir, engine) = make_engine();
        let a = engine.new_staging_changeset().unwrap();
        let b = engine.new_staging_changeset().unwrap();
        assert!(b.num > a.num);
        assert_eq!(a.status, ChangesetStatus::Staging);
        assert!(a.associated_files.is_empty());
    }

    #[test]
    fn test_get_files_requires_finalized() {
        let (_dir, engine) = make_engine();
        let cs = engine.new_staging_changeset().unwrap();
        engine.write_file("/a/foo", b"foo!", Some(cs.num)).unwrap();
        engine.associate_file(cs.num, "/a/foo").unwrap();

        assert!(matches!(
            engine.get_files(cs.num),
            Err(VersioningError::ChangesetNotFinalized { .. })
        ));

        engine.finalize_associated_files(cs.num).unwrap();
        let files = engine.get_files(cs.num).unwrap();
        assert_eq!(files.keys().collect::<Vec<_>>(), vec!["/a/foo"]);
        assert_eq!(files["/a/foo"].size, Some(4));

        engine.commit(cs.num, false).unwrap();
        assert_eq!(engine.get_files(cs.num).unwrap().len(), 1);
    }

    #[test]
    fn test_commit_requires_finalized_unless_forced() {
        let (_dir, engine) = make_engine();
        let cs = engine.new_staging_changeset().unwrap();
        engine.write_file("/a/foo", b"foo!", Some(cs.num)).unwrap();
        engine.associate_file(cs.num, "/a/foo").unwrap();

        assert!(matches!(
            engine.commit(cs.num, false),
            Err(VersioningError::ChangesetNotFinalized { .. })
        ));
        assert!(matches!(
            engine.read_file("/a/foo"),
            Err(VersioningError::FileNotFound { .. })
        ));
    }

    #[test]
    fn test_finalized_changeset_rejects_mutation() {
        let (_dir, engine) = make_engine();
        let cs = engine.new_staging_changeset().unwrap();
        engine.write_file("/a/foo", b"foo!", Some(cs.num)).unwrap();
        engine.associate_file(cs.num, "/a/foo").unwrap();
        engine.finalize_associated_files(cs.num).unwrap();

        assert!(matches!(
            engine.write_file("/a/bar", b"bar!", Some(cs.num)),
            Err(VersioningError::AssociationState { .. })
        ));
        assert!(matches!(
            engine.associate_file(cs.num, "/a/bar"),
            Err(VersioningError::AssociationState { .. })
        ));
        assert!(matches!(
            engine.finalize_associated_files(cs.num),
            Err(VersioningError::AssociationState { .. })
        ));
    }

    #[test]
    fn test_finalize_validates_manifest() {
        let (_dir, engine) = make_engine();
        let cs = engine.new_staging_changeset().unwrap();

        assert!(matches!(
            engine.finalize_associated_files(cs.num),
            Err(VersioningError::EmptyChangeset { .. })
        ));

        engine.write_file("/a/foo", b"foo!", Some(cs.num)).unwrap();
        engine.write_file("/a/bar", b"bar!", Some(cs.num)).unwrap();
        engine.associate_file(cs.num, "/a/foo").unwrap();
        assert!(matches!(
            engine.finalize_associated_files(cs.num),
            Err(VersioningError::ManifestMismatch { .. })
        ));
        assert!(engine.get_changeset(cs.num).unwrap().is_staging());

        engine.associate_file(cs.num, "/a/bar").unwrap();
        let finalized = engine.finalize_associated_files(cs.num).unwrap();
        assert_eq!(finalized.status, ChangesetStatus::Finalized);
    }

    #[test]
    fn test_disassociate_file() {
        let (_dir, engine) = make_engine();
        let cs = engine.new_staging_changeset().unwrap();
        engine.associate_file(cs.num, "/a/foo").unwrap();
        engine.associate_file(cs.num, "/a/bar").unwrap();

        let updated = engine.disassociate_file(cs.num, "/a/foo").unwrap();
        assert_eq!(updated.associated_paths(), vec!["/a/bar"]);
        assert_eq!(
            engine.get_changeset(cs.num).unwrap().associated_paths(),
            vec!["/a/bar"]
        );
    }

    #[test]
    fn test_list_files_is_non_validating() {
        let (_dir, engine) = make_engine();
        let cs = engine.new_staging_changeset().unwrap();
        engine.write_file("/a/foo", b"foo!", Some(cs.num)).unwrap();

        let files = engine.list_files(cs.num).unwrap();
        assert_eq!(files["/a/foo"].size, 4);
        assert_eq!(files["/a/foo"].changeset, cs.num);

        engine.commit(cs.num, true).unwrap();
        let files = engine.list_files(cs.num).unwrap();
        assert_eq!(files.keys().collect::<Vec<_>>(), vec!["/a/foo"]);
    }

    #[test]
    fn test_two_changeset_scenario() {
        let (_dir, engine) = make_engine();

        let c1 = engine.new_staging_changeset().unwrap();
        engine.write_file("/a/foo", b"foo!", Some(c1.num)).unwrap();
        engine.associate_file(c1.num, "/a/foo").unwrap();
        engine.finalize_associated_files(c1.num).unwrap();
        let committed = engine.commit(c1.num, false).unwrap();
        assert!(committed.is_committed());
        assert!(committed.committed.is_some());

        let file = engine.read_file("/a/foo").unwrap();
        assert_eq!(file.content, b"foo!");
        assert_eq!(file.changeset, c1.num);

        let c2 = engine.new_staging_changeset().unwrap();
        engine.write_file("/a/foo", b"bar!", Some(c2.num)).unwrap();
        assert_eq!(engine.read_file("/a/foo").unwrap().content, b"foo!");
        assert!(matches!(
            engine.commit(c2.num, false),
            Err(VersioningError::ChangesetNotFinalized { .. })
        ));

        engine.commit(c2.num, true).unwrap();
        let file = engine.read_file("/a/foo").unwrap();
        assert_eq!(file.content, b"bar!");
        assert_eq!(file.changeset, c2.num);

        let versions = engine.get_file_versions("/a/foo", None).unwrap();
        let nums: Vec<_> = versions.iter().map(|v| v.changeset).collect();
        assert_eq!(nums, vec![c2.num, c1.num]);
        assert_eq!(
            engine.last_committed_changeset().unwrap().map(|cs| cs.num),
            Some(c2.num)
        );
    }

    #[test]
    fn test_force_commit_last_write_wins() {
        let (_dir, engine) = make_engine();
        let cs = engine.new_staging_changeset().unwrap();
        engine.write_file("/a/foo", b"one", Some(cs.num)).unwrap();
        engine.write_file("/a/foo", b"two", Some(cs.num)).unwrap();
        engine.write_file("/a/bar", b"bar", Some(cs.num)).unwrap();

        let committed = engine.commit(cs.num, true).unwrap();
        assert_eq!(committed.associated_paths(), vec!["/a/bar", "/a/foo"]);

        assert_eq!(engine.read_file("/a/foo").unwrap().content, b"two");
        assert_eq!(engine.read_file("/a/bar").unwrap().changeset, cs.num);
    }

    #[test]
    fn test_empty_force_commit_fails() {
        let (_dir, engine) = make_engine();
        let cs = engine.new_staging_changeset().unwrap();

        assert!(matches!(
            engine.commit(cs.num, true),
            Err(VersioningError::EmptyChangeset { .. })
        ));
        assert!(engine.get_changeset(cs.num).unwrap().is_staging());
        assert!(engine.last_committed_changeset().unwrap().is_none());
    }

    #[test]
    fn test_committed_changeset_is_immutable() {
        let (_dir, engine) = make_engine();
        let cs = engine.new_staging_changeset().unwrap();
        engine.write_file("/a/foo", b"foo!", Some(cs.num)).unwrap();
        engine.commit(cs.num, true).unwrap();

        assert!(matches!(
            engine.commit(cs.num, true),
            Err(VersioningError::AlreadyCommitted { .. })
        ));
        assert!(matches!(
            engine.write_file("/a/foo", b"again", Some(cs.num)),
            Err(VersioningError::AlreadyCommitted { .. })
        ));
        assert!(matches!(
            engine.associate_file(cs.num, "/a/foo"),
            Err(VersioningError::AlreadyCommitted { .. })
        ));
    }

    #[test]
    fn test_commit_is_atomic() {
        let dir = tempdir().unwrap();
        let kv = Arc::new(FaultyKv {
            inner: RedbBackend::new(dir.path().join("test.redb")).unwrap(),
            armed: AtomicBool::new(false),
        });
        let engine = VersioningEngine::new(kv.clone());

        let cs = engine.new_staging_changeset().unwrap();
        for path in ["/a/one", "/a/two", "/a/three"] {
            engine.write_file(path, b"data", Some(cs.num)).unwrap();
            engine.associate_file(cs.num, path).unwrap();
        }
        engine.finalize_associated_files(cs.num).unwrap();

        kv.armed.store(true, Ordering::SeqCst);
        assert!(matches!(
            engine.commit(cs.num, false),
            Err(VersioningError::Storage(_))
        ));

        for path in ["/a/one", "/a/two", "/a/three"] {
            assert!(matches!(
                engine.read_file(path),
                Err(VersioningError::FileNotFound { .. })
            ));
        }
        assert_eq!(
            engine.get_changeset(cs.num).unwrap().status,
            ChangesetStatus::Finalized
        );
        assert_eq!(engine.list_files(cs.num).unwrap().len(), 3);
        assert!(engine.last_committed_changeset().unwrap().is_none());

        kv.armed.store(false, Ordering::SeqCst);
        engine.commit(cs.num, false).unwrap();
        assert_eq!(engine.read_file("/a/two").unwrap().changeset, cs.num);
    }

    #[test]
    fn test_concurrent_commits_one_wins() {
        let (_dir, engine) = make_engine();
        let cs = engine.new_staging_changeset().unwrap();
        engine.write_file("/a/foo", b"foo!", Some(cs.num)).unwrap();

        let engine = &engine;
        let num = cs.num;
        let results: Vec<Result<Changeset>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(move || engine.commit(num, true)))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, VersioningError::AlreadyCommitted { .. })));
        assert_eq!(engine.get_file_versions("/a/foo", None).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_file_removes_on_commit() {
        let (_dir, engine) = make_engine();
        let c1 = engine.new_staging_changeset().unwrap();
        engine.write_file("/a/foo", b"foo!", Some(c1.num)).unwrap();
        engine.commit(c1.num, true).unwrap();

        assert!(matches!(
            engine.delete_file("/a/foo", None),
            Err(VersioningError::WriteWithoutChangeset { .. })
        ));

        let c2 = engine.new_staging_changeset().unwrap();
        let tombstone = engine.delete_file("/a/foo", Some(c2.num)).unwrap();
        assert!(tombstone.deleted);
        assert!(engine.list_files(c2.num).unwrap()["/a/foo"].deleted);
        // Still visible until the delete is committed
        assert_eq!(engine.read_file("/a/foo").unwrap().changeset, c1.num);

        engine.associate_file(c2.num, "/a/foo").unwrap();
        let finalized = engine.finalize_associated_files(c2.num).unwrap();
        assert!(finalized.associated_files["/a/foo"].deleted);
        let committed = engine.commit(c2.num, false).unwrap();
        assert!(committed.associated_files["/a/foo"].deleted);

        assert!(matches!(
            engine.read_file("/a/foo"),
            Err(VersioningError::FileNotFound { .. })
        ));
        let versions = engine.get_file_versions("/a/foo", None).unwrap();
        assert_eq!(versions.len(), 2);
        assert!(versions[0].deleted);
        assert_eq!(versions[0].changeset, c2.num);

        // A later write brings the path back
        let c3 = engine.new_staging_changeset().unwrap();
        engine.write_file("/a/foo", b"again", Some(c3.num)).unwrap();
        engine.commit(c3.num, true).unwrap();
        assert_eq!(engine.read_file("/a/foo").unwrap().content, b"again");
    }

    #[test]
    fn test_delete_and_write_in_one_commit() {
        let (_dir, engine) = make_engine();
        let c1 = engine.new_staging_changeset().unwrap();
        engine.write_file("/a/old", b"old", Some(c1.num)).unwrap();
        engine.commit(c1.num, true).unwrap();

        let c2 = engine.new_staging_changeset().unwrap();
        engine.delete_file("/a/old", Some(c2.num)).unwrap();
        engine.write_file("/a/new", b"new", Some(c2.num)).unwrap();
        engine.commit(c2.num, true).unwrap();

        assert!(engine.read_file("/a/old").is_err());
        assert_eq!(engine.read_file("/a/new").unwrap().changeset, c2.num);
    }

    #[test]
    fn test_delete_rejected_outside_staging() {
        let (_dir, engine) = make_engine();
        let cs = engine.new_staging_changeset().unwrap();
        engine.write_file("/a/foo", b"foo!", Some(cs.num)).unwrap();
        engine.associate_file(cs.num, "/a/foo").unwrap();
        engine.finalize_associated_files(cs.num).unwrap();

        assert!(matches!(
            engine.delete_file("/a/foo", Some(cs.num)),
            Err(VersioningError::AssociationState { .. })
        ));
        assert!(matches!(
            engine.revert_file(cs.num, "/a/foo"),
            Err(VersioningError::AssociationState { .. })
        ));

        engine.commit(cs.num, false).unwrap();
        assert!(matches!(
            engine.delete_file("/a/foo", Some(cs.num)),
            Err(VersioningError::AlreadyCommitted { .. })
        ));
        assert!(matches!(
            engine.revert_file(cs.num, "/a/foo"),
            Err(VersioningError::AlreadyCommitted { .. })
        ));
    }

    #[test]
    fn test_revert_file() {
        let (_dir, engine) = make_engine();
        let cs = engine.new_staging_changeset().unwrap();
        engine.write_file("/a/foo", b"foo!", Some(cs.num)).unwrap();
        engine.write_file("/a/bar", b"bar!", Some(cs.num)).unwrap();
        engine.associate_file(cs.num, "/a/foo").unwrap();
        engine.associate_file(cs.num, "/a/bar").unwrap();

        let reverted = engine.revert_file(cs.num, "/a/bar").unwrap();
        assert_eq!(reverted.associated_paths(), vec!["/a/foo"]);
        assert_eq!(
            engine.list_files(cs.num).unwrap().keys().collect::<Vec<_>>(),
            vec!["/a/foo"]
        );

        // Untouched path is a no-op
        engine.revert_file(cs.num, "/a/other").unwrap();

        // Manifest matches again without the reverted path
        engine.finalize_associated_files(cs.num).unwrap();
        engine.commit(cs.num, false).unwrap();
        assert!(engine.read_file("/a/foo").is_ok());
        assert!(matches!(
            engine.read_file("/a/bar"),
            Err(VersioningError::FileNotFound { .. })
        ));
    }

    #[test]
    fn test_revert_staged_delete_keeps_file() {
        let (_dir, engine) = make_engine();
        let c1 = engine.new_staging_changeset().unwrap();
        engine.write_file("/a/foo", b"foo!", Some(c1.num)).unwrap();
        engine.commit(c1.num, true).unwrap();

        let c2 = engine.new_staging_changeset().unwrap();
        engine.delete_file("/a/foo", Some(c2.num)).unwrap();
        engine.revert_file(c2.num, "/a/foo").unwrap();

        assert!(matches!(
            engine.commit(c2.num, true),
            Err(VersioningError::EmptyChangeset { .. })
        ));
        assert_eq!(engine.read_file("/a/foo").unwrap().content, b"foo!");
    }

    #[test]
    fn test_changeset_locks_are_released() {
        let (_dir, engine) = make_engine();

        for _ in 0..20 {
            let cs = engine.new_staging_changeset().unwrap();
            engine.write_file("/a/foo", b"foo!", Some(cs.num)).unwrap();
            engine.commit(cs.num, true).unwrap();
            let _ = engine.write_file("/a/foo", b"late", Some(cs.num));
        }
        let _ = engine.write_file("/a/foo", b"x", Some(ChangesetNum::new(999)));

        let locks = engine.locks.lock();
        assert!(locks.len() <= 1);
        assert!(locks.values().all(|lock| lock.upgrade().is_none()));
    }

    #[test]
    fn test_read_never_committed() {
        let (_dir, engine) = make_engine();
        assert!(matches!(
            engine.read_file("/nope"),
            Err(VersioningError::FileNotFound { .. })
        ));
        assert!(engine.get_file_versions("/nope", Some(5)).unwrap().is_empty());
        assert!(matches!(
            engine.get_changeset(ChangesetNum::new(9)),
            Err(VersioningError::ChangesetNotFound { .. })
        ));
    }
}
