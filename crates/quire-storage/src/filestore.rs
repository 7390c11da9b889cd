use crate::{KVStore, KeyEncoder, Result, StorageError};
use chrono::Utc;
use quire_core::{
    from_json, to_json, Changeset, ChangesetNum, FileRecord, FileVersion, PendingWrite,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Durable file tree with per-changeset staging areas
///
/// Committed content is only ever changed by [`FileStore::apply_committed`],
/// which moves staged writes into the committed view in one transaction.
pub struct FileStore {
    kv: Arc<dyn KVStore>,
}

impl FileStore {
    /// Create a FileStore over any key-value backend
    pub fn new(kv: Arc<dyn KVStore>) -> Self {
        Self { kv }
    }

    /// Latest committed state of a path
    pub fn read(&self, path: &str) -> Result<Option<FileRecord>> {
        debug!("Reading file: {}", path);

        match self.kv.get(KeyEncoder::file_key(path).as_bytes())? {
            Some(data) => Ok(Some(from_json(&data)?)),
            None => Ok(None),
        }
    }

    /// Stage a write under a changeset
    ///
    /// A later write to the same path in the same changeset replaces the
    /// earlier one.
    pub fn write(
        &self,
        path: &str,
        content: &[u8],
        changeset: ChangesetNum,
    ) -> Result<PendingWrite> {
        debug!("Staging write of {} bytes to {} in changeset {}", content.len(), path, changeset);

        self.stage(PendingWrite::new(path, content.to_vec(), changeset))
    }

    /// Stage removal of a path under a changeset
    ///
    /// Replaces any write staged for the path in the same changeset.
    pub fn delete(&self, path: &str, changeset: ChangesetNum) -> Result<PendingWrite> {
        debug!("Staging delete of {} in changeset {}", path, changeset);
        self.stage(PendingWrite::tombstone(path, changeset))
    }

    fn stage(&self, pending: PendingWrite) -> Result<PendingWrite> {
        let key = KeyEncoder::pending_key(pending.changeset, &pending.path);
        self.kv.put(key.as_bytes(), &to_json(&pending)?)?;
        Ok(pending)
    }

    /// Drop the staged write of a path, returning whether there was one
    pub fn discard_pending(&self, changeset: ChangesetNum, path: &str) -> Result<bool> {
        let key = KeyEncoder::pending_key(changeset, path);
        let mut txn = self.kv.transaction()?;
        let existed = txn.get(key.as_bytes())?.is_some();
        if existed {
            txn.delete(key.as_bytes())?;
            txn.commit()?;
            debug!("Discarded staged write of {} in changeset {}", path, changeset);
        }
        Ok(existed)
    }

    /// Every staged write of a changeset, keyed by path
    pub fn get_pending_writes(
        &self,
        changeset: ChangesetNum,
    ) -> Result<BTreeMap<String, PendingWrite>> {
        let prefix = KeyEncoder::pending_prefix(changeset);
        let mut writes = BTreeMap::new();

        for (_key, data) in self.kv.scan(prefix.as_bytes())? {
            let pending: PendingWrite = from_json(&data)?;
            writes.insert(pending.path.clone(), pending);
        }

        debug!("Changeset {} has {} pending writes", changeset, writes.len());
        Ok(writes)
    }

    /// Apply staged writes to the committed view, atomically
    ///
    /// In a single transaction: every path in `paths` gets its staged content
    /// and a back-reference to the changeset (or is removed, for a
    /// tombstone), a version entry is recorded,
    /// all of the changeset's staged writes are cleared, and `record` (which
    /// the caller has already moved to its committed state) is stored. Either
    /// all of that becomes visible or none of it does.
    pub fn apply_committed(
        &self,
        record: &Changeset,
        paths: &BTreeSet<String>,
    ) -> Result<BTreeSet<String>> {
        let num = record.num;
        let pending = self.get_pending_writes(num)?;

        // Resolve everything before opening the write transaction
        let mut staged = Vec::with_capacity(paths.len());
        for path in paths {
            let write = pending
                .get(path)
                .ok_or_else(|| StorageError::pending_write_missing(num.get(), path.clone()))?;
            staged.push(write);
        }

        let modified = Utc::now();
        let mut txn = self.kv.transaction()?;

        for write in &staged {
            let file_key = KeyEncoder::file_key(&write.path);
            if write.deleted {
                txn.delete(file_key.as_bytes())?;
            } else {
                let file = FileRecord {
                    path: write.path.clone(),
                    content: write.content.clone(),
                    changeset: num,
                    modified,
                };
                txn.put(file_key.as_bytes(), &to_json(&file)?)?;
            }

            let version = FileVersion {
                path: write.path.clone(),
                changeset: num,
                size: write.size(),
                created: modified,
                deleted: write.deleted,
            };
            txn.put(
                KeyEncoder::version_key(&write.path, num).as_bytes(),
                &to_json(&version)?,
            )?;
        }

        for path in pending.keys() {
            txn.delete(KeyEncoder::pending_key(num, path).as_bytes())?;
        }

        txn.put(KeyEncoder::changeset_key(num).as_bytes(), &to_json(record)?)?;
        txn.put(
            KeyEncoder::LAST_COMMITTED.as_bytes(),
            num.get().to_string().as_bytes(),
        )?;

        txn.commit()?;

        info!("Applied {} files from changeset {}", staged.len(), num);
        Ok(paths.clone())
    }

    /// Allocate the next changeset number
    pub fn allocate_changeset_num(&self) -> Result<ChangesetNum> {
        let mut txn = self.kv.transaction()?;

        let last = match txn.get(KeyEncoder::CHANGESET_COUNTER.as_bytes())? {
            Some(data) => parse_num(KeyEncoder::CHANGESET_COUNTER, &data)?,
            None => ChangesetNum::new(0),
        };
        let next = last.next();

        txn.put(
            KeyEncoder::CHANGESET_COUNTER.as_bytes(),
            next.get().to_string().as_bytes(),
        )?;
        txn.commit()?;

        Ok(next)
    }

    /// Load a changeset record
    pub fn get_changeset(&self, num: ChangesetNum) -> Result<Option<Changeset>> {
        match self.kv.get(KeyEncoder::changeset_key(num).as_bytes())? {
            Some(data) => Ok(Some(from_json(&data)?)),
            None => Ok(None),
        }
    }

    /// Store a changeset record
    pub fn put_changeset(&self, changeset: &Changeset) -> Result<()> {
        debug!("Storing {}", changeset);
        self.kv.put(
            KeyEncoder::changeset_key(changeset.num).as_bytes(),
            &to_json(changeset)?,
        )
    }

    /// Committed revisions of a path, newest first
    pub fn file_versions(&self, path: &str, limit: usize) -> Result<Vec<FileVersion>> {
        let prefix = KeyEncoder::version_prefix(path);
        let entries = self.kv.scan(prefix.as_bytes())?;

        entries
            .iter()
            .rev()
            .take(limit)
            .map(|(_key, data)| from_json::<FileVersion>(data).map_err(StorageError::from))
            .collect()
    }

    /// Number of the most recently committed changeset
    pub fn last_committed(&self) -> Result<Option<ChangesetNum>> {
        match self.kv.get(KeyEncoder::LAST_COMMITTED.as_bytes())? {
            Some(data) => Ok(Some(parse_num(KeyEncoder::LAST_COMMITTED, &data)?)),
            None => Ok(None),
        }
    }
}

fn parse_num(key: &str, data: &[u8]) -> Result<ChangesetNum> {
    String::from_utf8_lossy(data)
        .parse::<u64>()
        .map(ChangesetNum::new)
        .map_err(|e| {
            StorageError::serialization_error(
                format!("Invalid changeset number under {}: {}", key, e),
                Some(Box::new(e)),
            )
        })
}
