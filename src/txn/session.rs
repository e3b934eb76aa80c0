//! Identity-bound facade over the engine

use super::engine::TransactionEngine;
use super::errors::TxnResult;
use crate::mvcc::{CommitId, IsolationLevel};

/// One identity's view of the engine.
///
/// Reads run at the session's isolation level and, for REPEATABLE_READ and
/// SERIALIZABLE, at the snapshot version taken by the last `begin`. Writes
/// carry the same snapshot version.
#[derive(Debug)]
pub struct Session<'e> {
    engine: &'e TransactionEngine,
    identity: String,
    isolation: IsolationLevel,
    snapshot: CommitId,
}

impl<'e> Session<'e> {
    pub(crate) fn new(engine: &'e TransactionEngine, identity: &str, isolation: IsolationLevel) -> Self {
        Self {
            engine,
            identity: identity.to_string(),
            isolation,
            snapshot: engine.current_commit(),
        }
    }

    /// Moves the snapshot to the current commit counter.
    pub fn begin(&mut self) -> CommitId {
        self.snapshot = self.engine.current_commit();
        self.snapshot
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn isolation(&self) -> IsolationLevel {
        self.isolation
    }

    pub fn set_isolation(&mut self, isolation: IsolationLevel) {
        self.isolation = isolation;
    }

    pub fn snapshot(&self) -> CommitId {
        self.snapshot
    }

    pub fn read(&self, key: &str) -> TxnResult<Option<Vec<u8>>> {
        self.engine
            .read(&self.identity, key, self.snapshot.value(), self.isolation)
    }

    pub fn write(&self, key: &str, value: impl Into<Vec<u8>>) -> TxnResult<()> {
        self.engine
            .write(&self.identity, key, value.into(), self.snapshot.value())
    }

    pub fn delete(&self, key: &str) -> TxnResult<()> {
        self.engine.delete(&self.identity, key)
    }

    pub fn store(&self, key: &str, value: impl Into<Vec<u8>>) -> TxnResult<()> {
        self.engine.store(&self.identity, key, value.into())
    }

    pub fn offload_store(&self) -> TxnResult<usize> {
        self.engine.offload_store(&self.identity)
    }

    /// Commits and, on success, begins again at the new counter.
    pub fn commit(&mut self) -> TxnResult<Option<CommitId>> {
        let committed = self.engine.commit(&self.identity)?;
        self.begin();
        Ok(committed)
    }

    pub fn abort(&mut self) -> TxnResult<usize> {
        let retracted = self.engine.abort(&self.identity)?;
        self.begin();
        Ok(retracted)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::storage::MemoryAdapter;
    use crate::txn::{EngineConfig, TxnError};

    fn engine() -> TransactionEngine {
        TransactionEngine::open(EngineConfig::default(), Arc::new(MemoryAdapter::new())).unwrap()
    }

    #[test]
    fn test_session_requires_registration() {
        let engine = engine();
        assert!(matches!(
            engine.session("ghost"),
            Err(TxnError::UnregisteredIdentity(_))
        ));
    }

    #[test]
    fn test_session_round_trip() {
        let engine = engine();
        engine.register("alice");
        let mut session = engine.session("alice").unwrap();
        assert_eq!(session.isolation(), IsolationLevel::ReadCommitted);

        session.write("greeting", "hello").unwrap();
        assert_eq!(session.read("greeting").unwrap(), None);
        assert_eq!(session.commit().unwrap(), Some(CommitId::new(1)));
        assert_eq!(session.snapshot(), CommitId::new(1));
        assert_eq!(session.read("greeting").unwrap(), Some(b"hello".to_vec()));
    }

    #[test]
    fn test_begin_refreshes_snapshot() {
        let engine = engine();
        engine.register_in("a", "shared");
        engine.register_in("b", "shared");
        let mut reader = engine
            .session_with("a", IsolationLevel::RepeatableRead)
            .unwrap();
        let mut writer = engine.session("b").unwrap();

        writer.write("k", "v").unwrap();
        writer.commit().unwrap();
        assert_eq!(reader.read("k").unwrap(), None);

        reader.abort().unwrap();
        assert_eq!(reader.snapshot(), CommitId::new(1));
        assert_eq!(reader.read("k").unwrap(), Some(b"v".to_vec()));
    }
}
