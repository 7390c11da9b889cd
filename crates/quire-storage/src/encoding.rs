use quire_core::ChangesetNum;

/// Key encoder for storage keys
///
/// Layout:
/// - `file{path}`: committed [`FileRecord`](quire_core::FileRecord)
/// - `pending/{num:020}{path}`: staged [`PendingWrite`](quire_core::PendingWrite)
/// - `changeset/{num:020}`: [`Changeset`](quire_core::Changeset) record
/// - `version{path}\0{num:020}`: [`FileVersion`](quire_core::FileVersion)
/// - `meta/...`: counters and pointers
///
/// Changeset numbers are zero padded so lexicographic key order matches
/// numeric order.
pub struct KeyEncoder;

impl KeyEncoder {
    /// Counter holding the last allocated changeset number
    pub const CHANGESET_COUNTER: &'static str = "meta/changeset_counter";

    /// Pointer to the most recently committed changeset
    pub const LAST_COMMITTED: &'static str = "meta/last_committed";

    /// Key of the committed record for a path
    pub fn file_key(path: &str) -> String {
        format!("file{}", path)
    }

    /// Key of a staged write
    pub fn pending_key(changeset: ChangesetNum, path: &str) -> String {
        format!("pending/{:020}{}", changeset.get(), path)
    }

    /// Prefix covering every staged write of a changeset
    pub fn pending_prefix(changeset: ChangesetNum) -> String {
        format!("pending/{:020}/", changeset.get())
    }

    /// Key of a changeset record
    pub fn changeset_key(changeset: ChangesetNum) -> String {
        format!("changeset/{:020}", changeset.get())
    }

    /// Key of one committed revision of a path
    pub fn version_key(path: &str, changeset: ChangesetNum) -> String {
        format!("version{}\0{:020}", path, changeset.get())
    }

    /// Prefix covering every revision of exactly one path
    pub fn version_prefix(path: &str) -> String {
        format!("version{}\0", path)
    }
}
