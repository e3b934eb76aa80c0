//! VersionChain - Version history for one (keyspace, key)
//!
//! - Entries are kept in append order
//! - Every appended entry gets a handle that stays valid until it is removed
//! - Removal happens only through retraction (abort, supersession) or GC

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::VersionedData;

/// Handle to one entry of a chain.
///
/// Handles are allocated in increasing order, so ordering by handle is
/// ordering by append time.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct EntryId(u64);

impl EntryId {
    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// The complete version history of a single key.
#[derive(Clone, Debug, Default)]
pub struct VersionChain {
    entries: BTreeMap<EntryId, VersionedData>,
    next_entry: u64,
}

impl VersionChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a chain from entries in append order (oldest first).
    pub fn with_entries(entries: Vec<VersionedData>) -> Self {
        let mut chain = Self::new();
        for entry in entries {
            chain.append(entry);
        }
        chain
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends an entry and returns its handle.
    pub fn append(&mut self, entry: VersionedData) -> EntryId {
        let id = EntryId(self.next_entry);
        self.next_entry += 1;
        self.entries.insert(id, entry);
        id
    }

    /// Removes an entry by handle.
    ///
    /// Returns None if the handle is no longer present.
    pub fn retract(&mut self, id: EntryId) -> Option<VersionedData> {
        self.entries.remove(&id)
    }

    pub fn get(&self, id: EntryId) -> Option<&VersionedData> {
        self.entries.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: EntryId) -> Option<&mut VersionedData> {
        self.entries.get_mut(&id)
    }

    /// Returns the most recently appended entry.
    pub fn newest(&self) -> Option<&VersionedData> {
        self.entries.values().next_back()
    }

    /// Iterates entries oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (EntryId, &VersionedData)> {
        self.entries.iter().map(|(id, entry)| (*id, entry))
    }

    /// Iterates entries newest first.
    pub fn iter_newest_first(&self) -> impl Iterator<Item = (EntryId, &VersionedData)> {
        self.iter().rev()
    }

    /// Iterates the committed entries, oldest first.
    pub fn committed_entries(&self) -> impl Iterator<Item = (EntryId, &VersionedData)> {
        self.iter().filter(|(_, entry)| entry.is_committed())
    }

    /// Returns the highest commit stamp present in the chain.
    pub fn latest_commit(&self) -> Option<super::CommitId> {
        self.entries.values().filter_map(|e| e.commit_id()).max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mvcc::CommitId;

    fn committed(value: &[u8], version: u64, commit: u64) -> VersionedData {
        VersionedData::write(value.to_vec(), version).committed_as(CommitId::new(commit))
    }

    #[test]
    fn test_append_assigns_increasing_handles() {
        let mut chain = VersionChain::new();
        let a = chain.append(VersionedData::write(b"a".to_vec(), 1));
        let b = chain.append(VersionedData::write(b"b".to_vec(), 2));

        assert!(a < b);
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.newest().unwrap().value(), Some(&b"b"[..]));
    }

    #[test]
    fn test_retract_removes_only_that_entry() {
        let mut chain = VersionChain::new();
        let a = chain.append(VersionedData::write(b"a".to_vec(), 1));
        let b = chain.append(VersionedData::write(b"b".to_vec(), 2));

        let removed = chain.retract(b).unwrap();
        assert_eq!(removed.value(), Some(&b"b"[..]));
        assert!(chain.get(a).is_some());
        assert!(chain.retract(b).is_none());
        assert_eq!(chain.newest().unwrap().value(), Some(&b"a"[..]));
    }

    #[test]
    fn test_handles_not_reused_after_retract() {
        let mut chain = VersionChain::new();
        let a = chain.append(VersionedData::write(b"a".to_vec(), 1));
        chain.retract(a);
        let b = chain.append(VersionedData::write(b"b".to_vec(), 2));
        assert_ne!(a, b);
    }

    #[test]
    fn test_newest_first_iteration() {
        let chain = VersionChain::with_entries(vec![
            committed(b"1", 1, 1),
            committed(b"2", 2, 2),
            committed(b"3", 3, 3),
        ]);

        let versions: Vec<u64> = chain.iter_newest_first().map(|(_, e)| e.version()).collect();
        assert_eq!(versions, vec![3, 2, 1]);
    }

    #[test]
    fn test_committed_entries_and_latest_commit() {
        let mut chain = VersionChain::with_entries(vec![committed(b"1", 1, 1), committed(b"2", 2, 4)]);
        chain.append(VersionedData::write(b"3".to_vec(), 3));

        assert_eq!(chain.committed_entries().count(), 2);
        assert_eq!(chain.latest_commit(), Some(CommitId::new(4)));
    }
}
