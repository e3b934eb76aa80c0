//! atomix - MVCC transactional key-value engine
//!
//! - `mvcc`: version chains, isolation levels, visibility, commit ordering
//!   and garbage-collection planning
//! - `txn`: the transaction engine, sessions and engine configuration
//! - `storage`: persistence adapters (in-memory, append-only file log)
//! - `observability`: structured logging, events and counters
//! - `cli`: the `atomix` command-line driver

pub mod cli;
pub mod mvcc;
pub mod observability;
pub mod storage;
pub mod txn;
