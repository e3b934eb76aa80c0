//! Observable engine events
//!
//! Events are explicit and typed. Each carries the severity it is logged at.

use std::fmt;

use super::logger::Severity;

/// Observable events in the transaction engine and its stores
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Lifecycle
    /// Engine opened, commit counter seeded
    EngineOpened,
    /// Configuration file loaded
    ConfigLoaded,
    /// New identity and workspace created
    IdentityRegistered,

    // Transactions
    /// Commit persisted and applied
    CommitApplied,
    /// Commit rejected by the persistence adapter
    CommitFailed,
    /// Serializable read set invalidated by a later commit
    SerializationConflict,
    /// Open transaction rolled back
    TransactionAborted,
    /// Deferred writes merged into the open transaction
    DeferredOffloaded,

    // Garbage collection
    /// One chain trimmed
    ChainTrimmed,

    // Chain log
    /// Chain log replayed
    StoreOpened,
    /// Torn final frame discarded
    StoreTornTail,
    /// Undecodable frame before the tail (FATAL)
    StoreCorruption,
}

impl Event {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::EngineOpened => "ENGINE_OPENED",
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::IdentityRegistered => "IDENTITY_REGISTERED",
            Event::CommitApplied => "COMMIT_APPLIED",
            Event::CommitFailed => "COMMIT_FAILED",
            Event::SerializationConflict => "SERIALIZATION_CONFLICT",
            Event::TransactionAborted => "TRANSACTION_ABORTED",
            Event::DeferredOffloaded => "DEFERRED_OFFLOADED",
            Event::ChainTrimmed => "CHAIN_TRIMMED",
            Event::StoreOpened => "STORE_OPENED",
            Event::StoreTornTail => "STORE_TORN_TAIL",
            Event::StoreCorruption => "STORE_CORRUPTION",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::CommitApplied
            | Event::IdentityRegistered
            | Event::TransactionAborted
            | Event::DeferredOffloaded
            | Event::ChainTrimmed => Severity::Trace,
            Event::EngineOpened | Event::ConfigLoaded | Event::StoreOpened => Severity::Info,
            Event::SerializationConflict | Event::StoreTornTail => Severity::Warn,
            Event::CommitFailed => Severity::Error,
            Event::StoreCorruption => Severity::Fatal,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
