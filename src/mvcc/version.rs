//! VersionedData - One entry of a version chain
//!
//! - Carries a value or an explicit tombstone
//! - `version` is supplied by the writer and never changes
//! - The commit stamp moves from None to Some exactly once, at commit
//!
//! Readers never mutate a VersionedData.

use serde::{Deserialize, Serialize};

use super::CommitId;

/// A single versioned value.
///
/// Tombstones carry no value; `value()` returns None for them regardless of
/// what was written.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedData {
    value: Option<Vec<u8>>,
    version: u64,
    commit: Option<CommitId>,
    deleted: bool,
}

impl VersionedData {
    /// Creates an uncommitted value entry.
    pub fn write(value: Vec<u8>, version: u64) -> Self {
        Self {
            value: Some(value),
            version,
            commit: None,
            deleted: false,
        }
    }

    /// Creates an uncommitted tombstone entry.
    pub fn tombstone(version: u64) -> Self {
        Self {
            value: None,
            version,
            commit: None,
            deleted: true,
        }
    }

    /// Rebuilds an entry read back from durable storage.
    pub fn restore(
        value: Option<Vec<u8>>,
        version: u64,
        commit: Option<CommitId>,
        deleted: bool,
    ) -> Self {
        Self {
            value: if deleted { None } else { value },
            version,
            commit,
            deleted,
        }
    }

    /// Returns the value, or None for tombstones.
    #[inline]
    pub fn value(&self) -> Option<&[u8]> {
        if self.deleted {
            None
        } else {
            self.value.as_deref()
        }
    }

    /// Returns the writer-supplied version number.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Returns the commit stamp, if committed.
    #[inline]
    pub fn commit_id(&self) -> Option<CommitId> {
        self.commit
    }

    #[inline]
    pub fn is_committed(&self) -> bool {
        self.commit.is_some()
    }

    #[inline]
    pub fn is_tombstone(&self) -> bool {
        self.deleted
    }

    /// Returns a committed copy stamped with `commit_id`.
    pub fn committed_as(&self, commit_id: CommitId) -> Self {
        let mut copy = self.clone();
        copy.commit = Some(commit_id);
        copy
    }

    /// Stamps this entry as committed.
    ///
    /// An entry that already carries a stamp keeps it.
    pub(crate) fn mark_committed(&mut self, commit_id: CommitId) {
        if self.commit.is_none() {
            self.commit = Some(commit_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_starts_uncommitted() {
        let entry = VersionedData::write(b"v".to_vec(), 3);
        assert_eq!(entry.value(), Some(&b"v"[..]));
        assert_eq!(entry.version(), 3);
        assert!(!entry.is_committed());
        assert!(!entry.is_tombstone());
    }

    #[test]
    fn test_tombstone_hides_value() {
        let entry = VersionedData::tombstone(5);
        assert!(entry.is_tombstone());
        assert_eq!(entry.value(), None);

        let restored = VersionedData::restore(Some(b"ignored".to_vec()), 5, None, true);
        assert_eq!(restored.value(), None);
    }

    #[test]
    fn test_commit_stamp_is_set_once() {
        let mut entry = VersionedData::write(b"v".to_vec(), 1);
        entry.mark_committed(CommitId::new(4));
        entry.mark_committed(CommitId::new(9));
        assert_eq!(entry.commit_id(), Some(CommitId::new(4)));
    }

    #[test]
    fn test_committed_as_leaves_original_untouched() {
        let entry = VersionedData::write(b"v".to_vec(), 1);
        let stamped = entry.committed_as(CommitId::new(2));

        assert!(!entry.is_committed());
        assert_eq!(stamped.commit_id(), Some(CommitId::new(2)));
        assert_eq!(stamped.version(), entry.version());
    }
}
