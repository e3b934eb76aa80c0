//! # Persistence Adapter Trait
//!
//! The transaction engine writes committed entries through this trait and
//! reads chains back when a key is not resident. Adapters own their own
//! synchronization; every method takes `&self`.

use super::errors::StorageResult;
use crate::mvcc::{CommitId, VersionedData};

/// Durable backing store for version chains.
pub trait PersistenceAdapter: Send + Sync + std::fmt::Debug {
    /// Persist one committed entry.
    ///
    /// Writing the same (key, commit id) twice leaves one entry.
    fn put(&self, keyspace: &str, key: &str, entry: &VersionedData) -> StorageResult<()>;

    /// Persist all entries of one commit, all or nothing.
    fn put_batch(&self, keyspace: &str, entries: &[(String, VersionedData)]) -> StorageResult<()> {
        for (key, entry) in entries {
            self.put(keyspace, key, entry)?;
        }
        Ok(())
    }

    /// Load the durable chain of one key, oldest first.
    fn load_chain(&self, keyspace: &str, key: &str) -> StorageResult<Vec<VersionedData>>;

    /// Replace the durable chain of one key with `retained`.
    fn trim_chain(&self, keyspace: &str, key: &str, retained: &[VersionedData])
        -> StorageResult<()>;

    /// List every key with a durable chain in `keyspace`.
    fn keys(&self, keyspace: &str) -> StorageResult<Vec<String>>;

    /// Highest commit id ever made durable.
    fn highest_commit(&self) -> StorageResult<Option<CommitId>>;
}

/// Appends `entry` to a durable chain unless its commit id is already there.
///
/// Returns whether the chain changed.
pub(crate) fn merge_entry(chain: &mut Vec<VersionedData>, entry: &VersionedData) -> bool {
    if let Some(commit) = entry.commit_id() {
        if chain.iter().any(|existing| existing.commit_id() == Some(commit)) {
            return false;
        }
    }
    chain.push(entry.clone());
    true
}
