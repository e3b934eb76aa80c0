//! Per-identity transaction state

use std::collections::{BTreeMap, HashMap};

use crate::mvcc::{CommitId, EntryId, VersionedData};

/// Everything one identity's open transaction has staged or observed.
///
/// The deferred queue outlives transactions: commit and abort leave it alone
/// and only `offload_store` drains it.
#[derive(Debug)]
pub(crate) struct Workspace {
    keyspace: String,
    /// Latest staged entry per key, with its chain handle
    pending: BTreeMap<String, (EntryId, VersionedData)>,
    /// First value observed per key under REPEATABLE_READ / SERIALIZABLE
    read_cache: HashMap<String, Vec<u8>>,
    /// Commit observed per key under SERIALIZABLE; None = nothing visible
    read_set: BTreeMap<String, Option<CommitId>>,
    deferred: Vec<(String, Vec<u8>)>,
    /// Every chain entry appended during the open transaction
    appended: Vec<(String, EntryId)>,
    snapshot: Option<CommitId>,
}

impl Workspace {
    pub(crate) fn new(keyspace: impl Into<String>) -> Self {
        Self {
            keyspace: keyspace.into(),
            pending: BTreeMap::new(),
            read_cache: HashMap::new(),
            read_set: BTreeMap::new(),
            deferred: Vec::new(),
            appended: Vec::new(),
            snapshot: None,
        }
    }

    pub(crate) fn keyspace(&self) -> &str {
        &self.keyspace
    }

    /// Records a staged entry. A later write to the same key replaces the
    /// pending one; both handles stay in `appended`.
    pub(crate) fn stage(&mut self, key: &str, id: EntryId, entry: VersionedData) {
        self.appended.push((key.to_string(), id));
        self.pending.insert(key.to_string(), (id, entry));
    }

    pub(crate) fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub(crate) fn pending(&self) -> impl Iterator<Item = (&String, &(EntryId, VersionedData))> {
        self.pending.iter()
    }

    pub(crate) fn cached(&self, key: &str) -> Option<&[u8]> {
        self.read_cache.get(key).map(Vec::as_slice)
    }

    pub(crate) fn cache(&mut self, key: &str, value: Vec<u8>) {
        self.read_cache.entry(key.to_string()).or_insert(value);
    }

    /// Records the first observation of `key`; later ones are ignored.
    pub(crate) fn record_read(&mut self, key: &str, observed: Option<CommitId>) {
        self.read_set.entry(key.to_string()).or_insert(observed);
    }

    pub(crate) fn read_set(&self) -> impl Iterator<Item = (&String, &Option<CommitId>)> {
        self.read_set.iter()
    }

    /// Pins the snapshot boundary of the first REPEATABLE_READ / SERIALIZABLE read.
    pub(crate) fn pin_snapshot(&mut self, boundary: CommitId) {
        self.snapshot.get_or_insert(boundary);
    }

    pub(crate) fn snapshot(&self) -> Option<CommitId> {
        self.snapshot
    }

    pub(crate) fn push_deferred(&mut self, key: String, value: Vec<u8>) {
        self.deferred.push((key, value));
    }

    /// Pops the most recently deferred pair.
    pub(crate) fn pop_deferred(&mut self) -> Option<(String, Vec<u8>)> {
        self.deferred.pop()
    }

    pub(crate) fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    /// Ends the open transaction, returning what it staged and appended.
    pub(crate) fn finish(
        &mut self,
    ) -> (
        BTreeMap<String, (EntryId, VersionedData)>,
        Vec<(String, EntryId)>,
    ) {
        self.read_cache.clear();
        self.read_set.clear();
        self.snapshot = None;
        (
            std::mem::take(&mut self.pending),
            std::mem::take(&mut self.appended),
        )
    }
}
