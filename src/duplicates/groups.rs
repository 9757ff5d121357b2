//! Duplicate groups: file rows sharing one strong hash.

use crate::storage::FileRecord;

/// Two or more file rows with the same computed strong hash.
///
/// Members are ordered by row id, i.e. by insertion. The first member is the
/// canonical copy that deletion keeps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    /// Lowercase hex SHA-1 shared by every member
    pub hash: String,
    /// Members in insertion order
    pub files: Vec<FileRecord>,
}

impl DuplicateGroup {
    /// Create a group, ordering `files` by row id.
    #[must_use]
    pub fn new(hash: String, mut files: Vec<FileRecord>) -> Self {
        files.sort_by_key(|f| f.id);
        Self { hash, files }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// The copy that is kept.
    #[must_use]
    pub fn keeper(&self) -> Option<&FileRecord> {
        self.files.first()
    }

    /// Every member after the keeper.
    #[must_use]
    pub fn redundant(&self) -> &[FileRecord] {
        self.files.get(1..).unwrap_or_default()
    }

    /// Size of one copy (all members share the content).
    #[must_use]
    pub fn size(&self) -> u64 {
        self.keeper().map_or(0, |f| f.size)
    }

    /// Bytes held by the redundant copies.
    #[must_use]
    pub fn wasted_space(&self) -> u64 {
        self.redundant().iter().map(|f| f.size).sum()
    }
}

/// Totals over a set of groups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct GroupSummary {
    pub groups: usize,
    /// Members across all groups
    pub files: usize,
    pub wasted_bytes: u64,
}

impl GroupSummary {
    pub fn add(&mut self, group: &DuplicateGroup) {
        self.groups += 1;
        self.files += group.len();
        self.wasted_bytes += group.wasted_space();
    }
}
