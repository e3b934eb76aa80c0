//! Transaction Engine - MVCC over identity-scoped keyspaces
//!
//! The engine owns every resident version chain, every identity workspace
//! and the commit authority, all behind one lock. The persistence adapter is
//! called while that lock is held, so commit identity assignment and the
//! durable write form a single critical section.
//!
//! # Commit protocol
//!
//! 1. SERIALIZABLE read sets are validated against the chains
//! 2. The next commit identity is proposed
//! 3. Pending entries, stamped with it, go to the adapter in one batch
//! 4. Only then is the counter advanced and the chain entries stamped
//!
//! A failure in 1 or 3 leaves the workspace and the counter untouched.
//!
//! # Chain residency
//!
//! A chain becomes resident when a key with durable history is first
//! touched, or when a key is first written. It is hydrated from
//! `PersistenceAdapter::load_chain` and stays in memory while it holds
//! entries. Reading a key with no history leaves nothing behind, and an
//! abort that empties a chain removes it. The engine assumes it is the only
//! writer of its adapter.

use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use super::config::EngineConfig;
use super::errors::{TxnError, TxnResult};
use super::session::Session;
use super::workspace::Workspace;
use crate::mvcc::{
    CommitAuthority, CommitId, IsolationLevel, ReadView, Retention, SnapshotFloor, VersionChain,
    VersionedData, Visibility,
};
use crate::observability::{log_event_with_fields, EngineMetrics, Event, ObservationScope};
use crate::storage::{PersistenceAdapter, StorageResult};

type ChainKey = (String, String);

#[derive(Debug, Default)]
struct EngineState {
    chains: HashMap<ChainKey, VersionChain>,
    workspaces: HashMap<String, Workspace>,
    authority: CommitAuthority,
}

impl EngineState {
    fn workspace(&self, identity: &str) -> TxnResult<&Workspace> {
        self.workspaces
            .get(identity)
            .ok_or_else(|| TxnError::UnregisteredIdentity(identity.to_string()))
    }

    fn workspace_mut(&mut self, identity: &str) -> TxnResult<&mut Workspace> {
        self.workspaces
            .get_mut(identity)
            .ok_or_else(|| TxnError::UnregisteredIdentity(identity.to_string()))
    }

    fn keyspace_of(&self, identity: &str) -> TxnResult<String> {
        Ok(self.workspace(identity)?.keyspace().to_string())
    }

    /// Snapshot boundaries pinned by open transactions in `keyspace`.
    fn snapshot_floor(&self, keyspace: &str) -> SnapshotFloor {
        SnapshotFloor::from_boundaries(
            self.workspaces
                .values()
                .filter(|ws| ws.keyspace() == keyspace)
                .filter_map(Workspace::snapshot),
        )
    }
}

/// Returns the resident chain of `(keyspace, key)`, hydrating it if needed.
fn resident_chain<'s>(
    chains: &'s mut HashMap<ChainKey, VersionChain>,
    adapter: &dyn PersistenceAdapter,
    keyspace: &str,
    key: &str,
) -> StorageResult<&'s mut VersionChain> {
    match chains.entry((keyspace.to_string(), key.to_string())) {
        Entry::Occupied(slot) => Ok(slot.into_mut()),
        Entry::Vacant(slot) => {
            let durable = adapter.load_chain(keyspace, key)?;
            Ok(slot.insert(VersionChain::with_entries(durable)))
        }
    }
}

/// Outcome of one garbage collection pass over a keyspace.
struct CollectionRun {
    keys_trimmed: usize,
    versions_collected: usize,
    low_water_mark: Option<CommitId>,
}

/// Returns the chain of `(keyspace, key)` if it has any entries.
///
/// Durable history is hydrated and made resident; a key with none is not.
fn existing_chain<'s>(
    chains: &'s mut HashMap<ChainKey, VersionChain>,
    adapter: &dyn PersistenceAdapter,
    keyspace: &str,
    key: &str,
) -> StorageResult<Option<&'s VersionChain>> {
    match chains.entry((keyspace.to_string(), key.to_string())) {
        Entry::Occupied(slot) => Ok(Some(slot.into_mut())),
        Entry::Vacant(slot) => {
            let durable = adapter.load_chain(keyspace, key)?;
            if durable.is_empty() {
                return Ok(None);
            }
            Ok(Some(slot.insert(VersionChain::with_entries(durable))))
        }
    }
}

/// Multi-version transactional key-value engine.
#[derive(Debug)]
pub struct TransactionEngine {
    config: EngineConfig,
    adapter: Arc<dyn PersistenceAdapter>,
    state: Mutex<EngineState>,
    metrics: EngineMetrics,
}

impl TransactionEngine {
    /// Opens an engine over `adapter`, resuming the commit counter after the
    /// highest durable commit.
    pub fn open(config: EngineConfig, adapter: Arc<dyn PersistenceAdapter>) -> TxnResult<Self> {
        let durable = adapter.highest_commit()?;
        let authority = CommitAuthority::resume_from(durable);

        let commit = authority.current().to_string();
        let isolation = config.default_isolation.as_str();
        log_event_with_fields(
            Event::EngineOpened,
            &[("commit_id", commit.as_str()), ("default_isolation", isolation)],
        );

        Ok(Self {
            config,
            adapter,
            state: Mutex::new(EngineState {
                authority,
                ..EngineState::default()
            }),
            metrics: EngineMetrics::new(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    /// Highest accepted commit identity.
    pub fn current_commit(&self) -> CommitId {
        self.lock().authority.current()
    }

    pub fn identity_count(&self) -> usize {
        self.lock().workspaces.len()
    }

    /// Registers `identity` with its own keyspace.
    ///
    /// Returns false if the identity already existed.
    pub fn register(&self, identity: &str) -> bool {
        self.register_in(identity, identity)
    }

    /// Registers `identity` inside `keyspace`, which other identities may share.
    ///
    /// Re-registering keeps the original keyspace and returns false.
    pub fn register_in(&self, identity: &str, keyspace: &str) -> bool {
        let mut state = self.lock();
        if state.workspaces.contains_key(identity) {
            return false;
        }
        state
            .workspaces
            .insert(identity.to_string(), Workspace::new(keyspace));
        self.metrics.increment_identities();

        log_event_with_fields(
            Event::IdentityRegistered,
            &[("identity", identity), ("keyspace", keyspace)],
        );
        true
    }

    /// Returns true if `identity` has been registered.
    pub fn is_registered(&self, identity: &str) -> bool {
        self.lock().workspaces.contains_key(identity)
    }

    /// Opens a session for a registered identity at the default isolation level.
    pub fn session(&self, identity: &str) -> TxnResult<Session<'_>> {
        self.session_with(identity, self.config.default_isolation)
    }

    pub fn session_with(&self, identity: &str, isolation: IsolationLevel) -> TxnResult<Session<'_>> {
        if !self.is_registered(identity) {
            return Err(TxnError::UnregisteredIdentity(identity.to_string()));
        }
        Ok(Session::new(self, identity, isolation))
    }

    // ------------------------------------------------------------------
    // Write path
    // ------------------------------------------------------------------

    /// Appends an uncommitted entry to the chain and records it as pending.
    fn stage(
        &self,
        state: &mut EngineState,
        identity: &str,
        key: &str,
        entry: VersionedData,
    ) -> TxnResult<()> {
        let keyspace = state.keyspace_of(identity)?;
        let chain = resident_chain(&mut state.chains, self.adapter.as_ref(), &keyspace, key)?;
        let id = chain.append(entry.clone());
        state.workspace_mut(identity)?.stage(key, id, entry);
        Ok(())
    }

    /// Stages a write of `value` carrying `write_version`.
    pub fn write(
        &self,
        identity: &str,
        key: &str,
        value: Vec<u8>,
        write_version: u64,
    ) -> TxnResult<()> {
        let mut state = self.lock();
        self.stage(&mut state, identity, key, VersionedData::write(value, write_version))?;
        self.metrics.increment_writes();
        Ok(())
    }

    /// Stages a tombstone at the current commit counter.
    pub fn delete(&self, identity: &str, key: &str) -> TxnResult<()> {
        let mut state = self.lock();
        let version = state.authority.current().value();
        self.stage(&mut state, identity, key, VersionedData::tombstone(version))?;
        self.metrics.increment_deletes();
        Ok(())
    }

    /// Queues a write outside the open transaction.
    pub fn store(&self, identity: &str, key: &str, value: Vec<u8>) -> TxnResult<()> {
        let mut state = self.lock();
        state
            .workspace_mut(identity)?
            .push_deferred(key.to_string(), value);
        Ok(())
    }

    /// Moves every deferred write into the open transaction, newest first.
    ///
    /// Each pair is staged like `write` at the current commit counter.
    /// Returns how many pairs were merged. If hydrating a chain fails, the
    /// failed pair and everything older stay queued.
    pub fn offload_store(&self, identity: &str) -> TxnResult<usize> {
        let mut state = self.lock();
        let version = state.authority.current().value();

        let mut merged = 0;
        loop {
            let Some((key, value)) = state.workspace_mut(identity)?.pop_deferred() else {
                break;
            };
            let entry = VersionedData::write(value.clone(), version);
            if let Err(e) = self.stage(&mut state, identity, &key, entry) {
                state.workspace_mut(identity)?.push_deferred(key, value);
                return Err(e);
            }
            merged += 1;
        }

        if merged > 0 {
            self.metrics.add_offloaded(merged as u64);
            let count = merged.to_string();
            log_event_with_fields(
                Event::DeferredOffloaded,
                &[("identity", identity), ("merged", count.as_str())],
            );
        }
        Ok(merged)
    }

    // ------------------------------------------------------------------
    // Read path
    // ------------------------------------------------------------------

    /// Reads `key` under `level`.
    ///
    /// `transaction_version` bounds REPEATABLE_READ and SERIALIZABLE reads;
    /// the other levels ignore it. Unknown keys read as `None`.
    pub fn read(
        &self,
        identity: &str,
        key: &str,
        transaction_version: u64,
        level: IsolationLevel,
    ) -> TxnResult<Option<Vec<u8>>> {
        let mut guard = self.lock();
        let state = &mut *guard;
        let keyspace = state.keyspace_of(identity)?;
        self.metrics.increment_reads();

        match level {
            IsolationLevel::ReadUncommitted => {
                let chain =
                    existing_chain(&mut state.chains, self.adapter.as_ref(), &keyspace, key)?;
                Ok(chain.and_then(|chain| Visibility::newest(chain).value().map(<[u8]>::to_vec)))
            }
            IsolationLevel::ReadCommitted => {
                let view = state.authority.current_snapshot();
                let chain =
                    existing_chain(&mut state.chains, self.adapter.as_ref(), &keyspace, key)?;
                Ok(chain.and_then(|chain| {
                    Visibility::committed_at(chain, view)
                        .value()
                        .map(<[u8]>::to_vec)
                }))
            }
            IsolationLevel::RepeatableRead | IsolationLevel::Serializable => {
                if let Some(cached) = state.workspace(identity)?.cached(key) {
                    return Ok(Some(cached.to_vec()));
                }

                let view = ReadView::at_version(transaction_version);
                let chain =
                    existing_chain(&mut state.chains, self.adapter.as_ref(), &keyspace, key)?;
                let (value, observed) = match chain {
                    Some(chain) => {
                        let visible = Visibility::committed_at(chain, view);
                        (visible.value().map(<[u8]>::to_vec), visible.observed_commit())
                    }
                    None => (None, None),
                };

                let workspace = state.workspace_mut(identity)?;
                workspace.pin_snapshot(view.upper_bound());
                if let Some(value) = &value {
                    workspace.cache(key, value.clone());
                }
                if level == IsolationLevel::Serializable {
                    workspace.record_read(key, observed);
                }
                Ok(value)
            }
        }
    }

    // ------------------------------------------------------------------
    // Commit / abort
    // ------------------------------------------------------------------

    /// Commits the open transaction of `identity`.
    ///
    /// Returns the assigned commit identity, or `None` if nothing was
    /// pending (the counter does not move, read state is still cleared).
    pub fn commit(&self, identity: &str) -> TxnResult<Option<CommitId>> {
        let mut guard = self.lock();
        let state = &mut *guard;
        let workspace = state.workspace(identity)?;
        let keyspace = workspace.keyspace().to_string();

        for (key, observed) in workspace.read_set() {
            let latest = state
                .chains
                .get(&(keyspace.clone(), key.clone()))
                .and_then(VersionChain::latest_commit);
            if latest > *observed {
                self.metrics.increment_serialization_conflicts();
                log_event_with_fields(
                    Event::SerializationConflict,
                    &[("identity", identity), ("key", key.as_str())],
                );
                return Err(TxnError::SerializationConflict {
                    identity: identity.to_string(),
                    key: key.clone(),
                });
            }
        }

        if !workspace.has_pending() {
            state.workspace_mut(identity)?.finish();
            return Ok(None);
        }

        let commit_id = state.authority.next_commit_id();
        let batch: Vec<(String, VersionedData)> = workspace
            .pending()
            .map(|(key, (_, entry))| (key.clone(), entry.committed_as(commit_id)))
            .collect();

        if let Err(e) = self.adapter.put_batch(&keyspace, &batch) {
            self.metrics.increment_commit_failures();
            let attempted = commit_id.to_string();
            let reason = e.to_string();
            log_event_with_fields(
                Event::CommitFailed,
                &[
                    ("commit_id", attempted.as_str()),
                    ("identity", identity),
                    ("reason", reason.as_str()),
                ],
            );
            return Err(e.into());
        }

        state.authority.mark_committed(commit_id)?;

        let (pending, appended) = state.workspace_mut(identity)?.finish();
        let mut superseded = 0u64;
        for (key, entry_id) in appended {
            let current = pending.get(&key).map(|(id, _)| *id);
            if current == Some(entry_id) {
                continue;
            }
            if let Some(chain) = state.chains.get_mut(&(keyspace.clone(), key)) {
                if chain.get(entry_id).is_some_and(|e| !e.is_committed()) {
                    chain.retract(entry_id);
                    superseded += 1;
                }
            }
        }
        for (key, (entry_id, entry)) in pending {
            let chain = state.chains.entry((keyspace.clone(), key)).or_default();
            match chain.get_mut(entry_id) {
                Some(resident) => resident.mark_committed(commit_id),
                None => {
                    chain.append(entry.committed_as(commit_id));
                }
            }
        }

        self.metrics.increment_commits();
        self.metrics.add_retracted_entries(superseded);
        let committed = commit_id.to_string();
        let entries = batch.len().to_string();
        log_event_with_fields(
            Event::CommitApplied,
            &[
                ("commit_id", committed.as_str()),
                ("entries", entries.as_str()),
                ("identity", identity),
            ],
        );
        Ok(Some(commit_id))
    }

    /// Rolls back the open transaction of `identity`.
    ///
    /// Every chain entry it appended is retracted. The deferred queue is
    /// kept. Returns the number of retracted entries.
    pub fn abort(&self, identity: &str) -> TxnResult<usize> {
        let mut guard = self.lock();
        let state = &mut *guard;
        let keyspace = state.keyspace_of(identity)?;
        let (_, appended) = state.workspace_mut(identity)?.finish();

        let mut retracted = 0;
        for (key, entry_id) in appended {
            let chain_key = (keyspace.clone(), key);
            let Some(chain) = state.chains.get_mut(&chain_key) else {
                continue;
            };
            if chain.get(entry_id).is_some_and(|e| !e.is_committed()) {
                chain.retract(entry_id);
                retracted += 1;
            }
            if chain.is_empty() {
                state.chains.remove(&chain_key);
            }
        }

        self.metrics.increment_aborts();
        self.metrics.add_retracted_entries(retracted as u64);
        let count = retracted.to_string();
        log_event_with_fields(
            Event::TransactionAborted,
            &[("identity", identity), ("retracted", count.as_str())],
        );
        Ok(retracted)
    }

    // ------------------------------------------------------------------
    // Garbage collection
    // ------------------------------------------------------------------

    /// Trims every chain in the keyspace of `identity` to `max_versions`.
    ///
    /// Returns the number of keys whose chain was trimmed.
    pub fn garbage_collect(&self, identity: &str, max_versions: usize) -> TxnResult<usize> {
        let mut guard = self.lock();
        let state = &mut *guard;
        let keyspace = state.keyspace_of(identity)?;

        let scope = ObservationScope::with_fields(
            "GC",
            &[("identity", identity), ("keyspace", keyspace.as_str())],
        );
        match self.collect_keyspace(state, &keyspace, max_versions) {
            Ok(run) => {
                self.metrics
                    .record_gc_run(run.keys_trimmed as u64, run.versions_collected as u64);
                let keys = run.keys_trimmed.to_string();
                let versions = run.versions_collected.to_string();
                let floor = run
                    .low_water_mark
                    .map_or_else(|| "none".to_string(), |c| c.to_string());
                scope.complete_with_fields(&[
                    ("keys_trimmed", keys.as_str()),
                    ("low_water_mark", floor.as_str()),
                    ("versions_collected", versions.as_str()),
                ]);
                Ok(run.keys_trimmed)
            }
            Err(e) => {
                scope.fail(&e.to_string());
                Err(e)
            }
        }
    }

    /// Runs `garbage_collect` with the configured `gc_max_versions`.
    pub fn garbage_collect_default(&self, identity: &str) -> TxnResult<usize> {
        self.garbage_collect(identity, self.config.gc_max_versions)
    }

    fn collect_keyspace(
        &self,
        state: &mut EngineState,
        keyspace: &str,
        max_versions: usize,
    ) -> TxnResult<CollectionRun> {
        for key in self.adapter.keys(keyspace)? {
            existing_chain(&mut state.chains, self.adapter.as_ref(), keyspace, &key)?;
        }

        let floor = state.snapshot_floor(keyspace);
        let keys: BTreeSet<String> = state
            .chains
            .keys()
            .filter(|(space, _)| space == keyspace)
            .map(|(_, key)| key.clone())
            .collect();

        let mut keys_trimmed = 0;
        let mut versions_collected = 0;
        for key in keys {
            let Some(chain) = state.chains.get_mut(&(keyspace.to_string(), key.clone())) else {
                continue;
            };
            let plan = Retention::plan(chain, max_versions, self.config.gc_retention, &floor);
            if plan.is_empty() {
                continue;
            }

            let retained: Vec<VersionedData> = chain
                .committed_entries()
                .filter(|(id, _)| !plan.contains(*id))
                .map(|(_, entry)| entry.clone())
                .collect();
            self.adapter.trim_chain(keyspace, &key, &retained)?;

            let dropped = plan.apply(chain);
            keys_trimmed += 1;
            versions_collected += dropped;

            let dropped = dropped.to_string();
            let remaining = chain.len().to_string();
            log_event_with_fields(
                Event::ChainTrimmed,
                &[
                    ("dropped", dropped.as_str()),
                    ("key", key.as_str()),
                    ("remaining", remaining.as_str()),
                ],
            );
        }

        Ok(CollectionRun {
            keys_trimmed,
            versions_collected,
            low_water_mark: floor.low_water_mark(),
        })
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    /// Returns a copy of the resident chain of `key` in the keyspace of
    /// `identity`, hydrating it if needed.
    pub fn chain_snapshot(&self, identity: &str, key: &str) -> TxnResult<Vec<VersionedData>> {
        let mut guard = self.lock();
        let state = &mut *guard;
        let keyspace = state.keyspace_of(identity)?;
        let chain = existing_chain(&mut state.chains, self.adapter.as_ref(), &keyspace, key)?;
        Ok(chain
            .map(|chain| chain.iter().map(|(_, entry)| entry.clone()).collect())
            .unwrap_or_default())
    }

    /// Number of chains currently held in memory, across all keyspaces.
    pub fn resident_chain_count(&self) -> usize {
        self.lock().chains.len()
    }

    /// Number of deferred writes queued for `identity`.
    pub fn deferred_len(&self, identity: &str) -> TxnResult<usize> {
        Ok(self.lock().workspace(identity)?.deferred_len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mvcc::RetentionPolicy;
    use crate::storage::MemoryAdapter;

    fn engine_with(adapter: Arc<MemoryAdapter>) -> TransactionEngine {
        TransactionEngine::open(EngineConfig::default(), adapter).unwrap()
    }

    fn engine() -> TransactionEngine {
        engine_with(Arc::new(MemoryAdapter::new()))
    }

    fn read(engine: &TransactionEngine, id: &str, key: &str, level: IsolationLevel) -> Option<Vec<u8>> {
        let version = engine.current_commit().value();
        engine.read(id, key, version, level).unwrap()
    }

    #[test]
    fn test_register_is_idempotent() {
        let engine = engine();
        assert!(engine.register("alice"));
        assert!(!engine.register("alice"));
        assert_eq!(engine.identity_count(), 1);
        assert_eq!(engine.metrics().identities(), 1);
    }

    #[test]
    fn test_unregistered_identity_rejected() {
        let engine = engine();
        let err = engine.write("ghost", "k", b"v".to_vec(), 0).unwrap_err();
        assert!(matches!(err, TxnError::UnregisteredIdentity(ref id) if id == "ghost"));
        assert!(engine.commit("ghost").is_err());
    }

    #[test]
    fn test_commit_advances_counter_once() {
        let engine = engine();
        engine.register("alice");
        engine.write("alice", "x", b"1".to_vec(), 0).unwrap();
        engine.write("alice", "y", b"2".to_vec(), 0).unwrap();

        assert_eq!(engine.commit("alice").unwrap(), Some(CommitId::new(1)));
        assert_eq!(engine.current_commit(), CommitId::new(1));
        assert_eq!(read(&engine, "alice", "y", IsolationLevel::ReadCommitted), Some(b"2".to_vec()));
    }

    #[test]
    fn test_empty_commit_does_not_advance() {
        let engine = engine();
        engine.register("alice");
        assert_eq!(engine.commit("alice").unwrap(), None);
        assert_eq!(engine.current_commit(), CommitId::ORIGIN);
    }

    #[test]
    fn test_read_committed_hides_pending() {
        let engine = engine();
        engine.register("alice");
        engine.write("alice", "x", b"1".to_vec(), 0).unwrap();

        assert_eq!(read(&engine, "alice", "x", IsolationLevel::ReadCommitted), None);
        assert_eq!(
            read(&engine, "alice", "x", IsolationLevel::ReadUncommitted),
            Some(b"1".to_vec())
        );
    }

    #[test]
    fn test_superseded_write_leaves_one_entry() {
        let engine = engine();
        engine.register("alice");
        engine.write("alice", "x", b"1".to_vec(), 0).unwrap();
        engine.write("alice", "x", b"2".to_vec(), 0).unwrap();
        engine.commit("alice").unwrap();

        let chain = engine.chain_snapshot("alice", "x").unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].value(), Some(&b"2"[..]));
        assert_eq!(engine.metrics().snapshot().retracted_entries, 1);
    }

    #[test]
    fn test_abort_retracts_entries() {
        let engine = engine();
        engine.register("alice");
        engine.write("alice", "x", b"1".to_vec(), 0).unwrap();
        engine.delete("alice", "y").unwrap();

        assert_eq!(engine.abort("alice").unwrap(), 2);
        assert_eq!(read(&engine, "alice", "x", IsolationLevel::ReadUncommitted), None);
        assert!(engine.chain_snapshot("alice", "x").unwrap().is_empty());
        assert_eq!(engine.commit("alice").unwrap(), None);
    }

    #[test]
    fn test_delete_makes_key_absent() {
        let engine = engine();
        engine.register("alice");
        engine.write("alice", "x", b"1".to_vec(), 0).unwrap();
        engine.commit("alice").unwrap();
        engine.delete("alice", "x").unwrap();
        engine.commit("alice").unwrap();

        assert_eq!(read(&engine, "alice", "x", IsolationLevel::ReadCommitted), None);
        let chain = engine.chain_snapshot("alice", "x").unwrap();
        assert!(chain[1].is_tombstone());
        assert_eq!(chain[1].version(), 1);
    }

    #[test]
    fn test_offload_store_lifo() {
        let engine = engine();
        engine.register("alice");
        engine.store("alice", "k", b"first".to_vec()).unwrap();
        engine.store("alice", "k", b"second".to_vec()).unwrap();
        assert_eq!(engine.deferred_len("alice").unwrap(), 2);

        assert_eq!(engine.offload_store("alice").unwrap(), 2);
        engine.commit("alice").unwrap();

        // The oldest deferred pair is offloaded last and wins
        assert_eq!(
            read(&engine, "alice", "k", IsolationLevel::ReadCommitted),
            Some(b"first".to_vec())
        );
        assert_eq!(engine.deferred_len("alice").unwrap(), 0);
    }

    #[test]
    fn test_deferred_queue_survives_abort() {
        let engine = engine();
        engine.register("alice");
        engine.store("alice", "k", b"v".to_vec()).unwrap();
        engine.abort("alice").unwrap();
        assert_eq!(engine.deferred_len("alice").unwrap(), 1);
    }

    #[test]
    fn test_repeatable_read_pins_first_value() {
        let engine = engine();
        engine.register_in("reader", "shared");
        engine.register_in("writer", "shared");

        engine.write("writer", "k", b"v1".to_vec(), 0).unwrap();
        engine.commit("writer").unwrap();

        let snapshot = engine.current_commit().value();
        let first = engine
            .read("reader", "k", snapshot, IsolationLevel::RepeatableRead)
            .unwrap();

        engine.write("writer", "k", b"v2".to_vec(), 0).unwrap();
        engine.commit("writer").unwrap();

        let later = engine.current_commit().value();
        let second = engine
            .read("reader", "k", later, IsolationLevel::RepeatableRead)
            .unwrap();
        assert_eq!(first, Some(b"v1".to_vec()));
        assert_eq!(second, first);
    }

    #[test]
    fn test_serializable_conflict_keeps_workspace() {
        let adapter = Arc::new(MemoryAdapter::new());
        let engine = engine_with(adapter.clone());
        engine.register_in("a", "shared");
        engine.register_in("b", "shared");

        let snapshot = engine.current_commit().value();
        assert_eq!(
            engine.read("a", "k", snapshot, IsolationLevel::Serializable).unwrap(),
            None
        );
        engine.write("a", "out", b"a".to_vec(), snapshot).unwrap();

        engine.write("b", "k", b"b".to_vec(), 0).unwrap();
        engine.commit("b").unwrap();

        let err = engine.commit("a").unwrap_err();
        assert!(matches!(err, TxnError::SerializationConflict { ref key, .. } if key == "k"));
        assert_eq!(engine.current_commit(), CommitId::new(1));
        assert_eq!(
            read(&engine, "a", "out", IsolationLevel::ReadUncommitted),
            Some(b"a".to_vec())
        );

        engine.abort("a").unwrap();
        engine.write("a", "out", b"a".to_vec(), 1).unwrap();
        assert_eq!(engine.commit("a").unwrap(), Some(CommitId::new(2)));
        assert_eq!(engine.metrics().snapshot().serialization_conflicts, 1);
    }

    #[test]
    fn test_persistence_failure_keeps_workspace() {
        let adapter = Arc::new(MemoryAdapter::new());
        let engine = engine_with(adapter.clone());
        engine.register("alice");
        engine.write("alice", "x", b"1".to_vec(), 0).unwrap();

        adapter.fail_next_writes(1);
        let err = engine.commit("alice").unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(engine.current_commit(), CommitId::ORIGIN);
        assert_eq!(read(&engine, "alice", "x", IsolationLevel::ReadCommitted), None);

        assert_eq!(engine.commit("alice").unwrap(), Some(CommitId::new(1)));
        assert_eq!(adapter.load_chain("alice", "x").unwrap().len(), 1);
    }

    #[test]
    fn test_counter_resumes_from_adapter() {
        let adapter = Arc::new(MemoryAdapter::new());
        {
            let engine = engine_with(adapter.clone());
            engine.register("alice");
            engine.write("alice", "x", b"1".to_vec(), 0).unwrap();
            engine.commit("alice").unwrap();
        }

        let engine = engine_with(adapter);
        engine.register("alice");
        assert_eq!(engine.current_commit(), CommitId::new(1));
        assert_eq!(
            read(&engine, "alice", "x", IsolationLevel::ReadCommitted),
            Some(b"1".to_vec())
        );
    }

    #[test]
    fn test_garbage_collect_trims_chain_and_adapter() {
        let adapter = Arc::new(MemoryAdapter::new());
        let engine = engine_with(adapter.clone());
        engine.register("alice");
        for i in 1..=5u8 {
            engine.write("alice", "k", vec![i], 0).unwrap();
            engine.commit("alice").unwrap();
        }

        assert_eq!(engine.garbage_collect("alice", 2).unwrap(), 1);
        assert_eq!(engine.chain_snapshot("alice", "k").unwrap().len(), 2);
        assert_eq!(adapter.load_chain("alice", "k").unwrap().len(), 2);
        assert_eq!(read(&engine, "alice", "k", IsolationLevel::ReadCommitted), Some(vec![5]));

        let snap = engine.metrics().snapshot();
        assert_eq!(snap.gc_runs, 1);
        assert_eq!(snap.versions_collected, 3);
    }

    #[test]
    fn test_snapshot_aware_gc_keeps_pinned_entry() {
        let adapter = Arc::new(MemoryAdapter::new());
        let config = EngineConfig {
            gc_retention: RetentionPolicy::SnapshotAware,
            ..EngineConfig::default()
        };
        let engine = TransactionEngine::open(config, adapter).unwrap();
        engine.register_in("reader", "shared");
        engine.register_in("writer", "shared");

        engine.write("writer", "k", b"v1".to_vec(), 0).unwrap();
        engine.commit("writer").unwrap();
        engine
            .read("reader", "other", 1, IsolationLevel::RepeatableRead)
            .unwrap();
        for i in 2..=4u8 {
            engine.write("writer", "k", vec![i], 0).unwrap();
            engine.commit("writer").unwrap();
        }

        engine.garbage_collect("writer", 1).unwrap();
        assert_eq!(
            engine.read("reader", "k", 1, IsolationLevel::RepeatableRead).unwrap(),
            Some(b"v1".to_vec())
        );
        assert_eq!(engine.chain_snapshot("writer", "k").unwrap().len(), 2);
    }
}
