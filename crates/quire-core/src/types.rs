use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Monotonically assigned changeset identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangesetNum(pub u64);

impl ChangesetNum {
    /// Create a new ChangesetNum
    pub fn new(num: u64) -> Self {
        Self(num)
    }

    /// Get the raw number
    pub fn get(&self) -> u64 {
        self.0
    }

    /// The number following this one
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for ChangesetNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ChangesetNum {
    fn from(num: u64) -> Self {
        Self(num)
    }
}

/// Lifecycle state of a changeset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangesetStatus {
    /// Accepting writes and associations
    Staging,
    /// Association list frozen, ready to commit
    Finalized,
    /// Applied to the file tree, immutable
    Committed,
}

impl ChangesetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangesetStatus::Staging => "STAGING",
            ChangesetStatus::Finalized => "FINALIZED",
            ChangesetStatus::Committed => "COMMITTED",
        }
    }
}

impl fmt::Display for ChangesetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file associated with a changeset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociatedFile {
    /// Absolute file path
    pub path: String,
    /// When the association was made
    pub associated: DateTime<Utc>,
    /// Size of the staged content, captured at finalization
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Time of the staged write, captured at finalization
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub written: Option<DateTime<Utc>>,
    /// Whether the staged write removes the path
    #[serde(default, skip_serializing_if = "is_false")]
    pub deleted: bool,
}

impl AssociatedFile {
    /// Create a new, not yet finalized association
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            associated: Utc::now(),
            size: None,
            written: None,
            deleted: false,
        }
    }
}

/// A batch of staged file writes with an explicit lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Changeset {
    pub num: ChangesetNum,
    pub status: ChangesetStatus,
    /// Associated files, keyed by path
    #[serde(default)]
    pub associated_files: BTreeMap<String, AssociatedFile>,
    pub created: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub committed: Option<DateTime<Utc>>,
}

impl Changeset {
    /// Create a new staging changeset
    pub fn staging(num: ChangesetNum) -> Self {
        Self {
            num,
            status: ChangesetStatus::Staging,
            associated_files: BTreeMap::new(),
            created: Utc::now(),
            committed: None,
        }
    }

    pub fn is_staging(&self) -> bool {
        self.status == ChangesetStatus::Staging
    }

    pub fn is_committed(&self) -> bool {
        self.status == ChangesetStatus::Committed
    }

    /// Whether `get_files()` can give a stable answer
    pub fn files_finalized(&self) -> bool {
        matches!(
            self.status,
            ChangesetStatus::Finalized | ChangesetStatus::Committed
        )
    }

    /// Associated paths in deterministic order
    pub fn associated_paths(&self) -> Vec<String> {
        self.associated_files.keys().cloned().collect()
    }
}

impl fmt::Display for Changeset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "changeset {} ({})", self.num, self.status)
    }
}

/// A write staged under a changeset, not yet visible to readers
///
/// A tombstone (`deleted`) carries no content and removes the path on commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingWrite {
    pub path: String,
    pub content: Vec<u8>,
    pub changeset: ChangesetNum,
    pub written: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub deleted: bool,
}

impl PendingWrite {
    pub fn new(path: impl Into<String>, content: Vec<u8>, changeset: ChangesetNum) -> Self {
        Self {
            path: path.into(),
            content,
            changeset,
            written: Utc::now(),
            deleted: false,
        }
    }

    /// Stage removal of `path`
    pub fn tombstone(path: impl Into<String>, changeset: ChangesetNum) -> Self {
        Self {
            deleted: true,
            ..Self::new(path, Vec::new(), changeset)
        }
    }

    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }
}

/// Committed state of a path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    pub content: Vec<u8>,
    /// The changeset that committed this content
    pub changeset: ChangesetNum,
    pub modified: DateTime<Utc>,
}

/// One committed revision of a path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileVersion {
    pub path: String,
    pub changeset: ChangesetNum,
    pub size: u64,
    pub created: DateTime<Utc>,
    /// This revision removed the path
    #[serde(default, skip_serializing_if = "is_false")]
    pub deleted: bool,
}

/// Metadata of a file as seen through a changeset, without content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub path: String,
    pub changeset: ChangesetNum,
    pub size: u64,
    pub written: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub deleted: bool,
}

impl From<&PendingWrite> for FileInfo {
    fn from(write: &PendingWrite) -> Self {
        Self {
            path: write.path.clone(),
            changeset: write.changeset,
            size: write.size(),
            written: write.written,
            deleted: write.deleted,
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Check that a path is an absolute, normalized file path
///
/// `/a/foo` is valid; `a/foo`, `/a/`, `/a//foo`, `/a/./foo` and `/a/../foo`
/// are not. Control characters are rejected anywhere in the path, NUL
/// separates the path from the changeset number in version keys.
pub fn is_valid_path(path: &str) -> bool {
    let Some(rest) = path.strip_prefix('/') else {
        return false;
    };
    !rest.is_empty()
        && !rest.chars().any(char::is_control)
        && rest
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..")
}
