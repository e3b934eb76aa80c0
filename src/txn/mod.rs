//! Transaction engine
//!
//! - `TransactionEngine`: chains, workspaces and the commit authority
//!   behind one lock, writing through a `PersistenceAdapter`
//! - `Session`: identity-bound pass-through
//! - `EngineConfig`: isolation default and garbage-collection settings

mod config;
mod engine;
mod errors;
mod session;
mod workspace;

pub use config::{EngineConfig, DEFAULT_GC_MAX_VERSIONS};
pub use engine::TransactionEngine;
pub use errors::{TxnError, TxnResult};
pub use session::Session;
