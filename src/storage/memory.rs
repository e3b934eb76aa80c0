//! In-process persistence adapter
//!
//! Keeps chains in a HashMap. Used by tests and by engines that do not need
//! durability. `fail_next_writes` makes the next writes fail with
//! `StorageError::Injected`, leaving the stored state untouched.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::adapter::{merge_entry, PersistenceAdapter};
use super::errors::{StorageError, StorageResult};
use crate::mvcc::{CommitId, VersionedData};

#[derive(Debug, Default)]
struct MemoryState {
    chains: HashMap<(String, String), Vec<VersionedData>>,
    highest_commit: Option<CommitId>,
    failures_armed: u32,
}

/// HashMap-backed adapter with failure injection.
#[derive(Debug, Default)]
pub struct MemoryAdapter {
    state: Mutex<MemoryState>,
    writes: AtomicU64,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` write calls (put, put_batch, trim_chain) fail.
    pub fn fail_next_writes(&self, n: u32) {
        self.lock().failures_armed = n;
    }

    /// Number of successful write calls.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl MemoryState {
    fn consume_failure(&mut self, operation: &str) -> StorageResult<()> {
        if self.failures_armed > 0 {
            self.failures_armed -= 1;
            return Err(StorageError::Injected(format!("{} failed", operation)));
        }
        Ok(())
    }

    fn apply(&mut self, keyspace: &str, key: &str, entry: &VersionedData) {
        let chain = self
            .chains
            .entry((keyspace.to_string(), key.to_string()))
            .or_default();
        merge_entry(chain, entry);
        if let Some(commit) = entry.commit_id() {
            self.highest_commit = self.highest_commit.max(Some(commit));
        }
    }
}

impl PersistenceAdapter for MemoryAdapter {
    fn put(&self, keyspace: &str, key: &str, entry: &VersionedData) -> StorageResult<()> {
        let mut state = self.lock();
        state.consume_failure("put")?;
        state.apply(keyspace, key, entry);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn put_batch(&self, keyspace: &str, entries: &[(String, VersionedData)]) -> StorageResult<()> {
        let mut state = self.lock();
        state.consume_failure("put_batch")?;
        for (key, entry) in entries {
            state.apply(keyspace, key, entry);
        }
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn load_chain(&self, keyspace: &str, key: &str) -> StorageResult<Vec<VersionedData>> {
        let state = self.lock();
        Ok(state
            .chains
            .get(&(keyspace.to_string(), key.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    fn trim_chain(
        &self,
        keyspace: &str,
        key: &str,
        retained: &[VersionedData],
    ) -> StorageResult<()> {
        let mut state = self.lock();
        state.consume_failure("trim_chain")?;
        state
            .chains
            .insert((keyspace.to_string(), key.to_string()), retained.to_vec());
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn keys(&self, keyspace: &str) -> StorageResult<Vec<String>> {
        let state = self.lock();
        let mut keys: Vec<String> = state
            .chains
            .keys()
            .filter(|(space, _)| space == keyspace)
            .map(|(_, key)| key.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn highest_commit(&self) -> StorageResult<Option<CommitId>> {
        Ok(self.lock().highest_commit)
    }
}
