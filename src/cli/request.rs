//! Requests accepted by `atomix exec`
//!
//! Each line is a JSON object tagged by `op`:
//!
//! ```text
//! {"op":"register","identity":"alice"}
//! {"op":"register","identity":"bob","keyspace":"shared"}
//! {"op":"write","identity":"alice","key":"k","value":"v"}
//! {"op":"read","identity":"alice","key":"k","isolation":"REPEATABLE_READ","version":3}
//! {"op":"commit","identity":"alice"}
//! ```
//!
//! Values travel as UTF-8 strings.

use serde::Deserialize;

use crate::mvcc::IsolationLevel;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Register {
        identity: String,
        #[serde(default)]
        keyspace: Option<String>,
    },
    Write {
        identity: String,
        key: String,
        value: String,
        /// Defaults to the current commit counter
        #[serde(default)]
        version: Option<u64>,
    },
    Delete {
        identity: String,
        key: String,
    },
    Store {
        identity: String,
        key: String,
        value: String,
    },
    OffloadStore {
        identity: String,
    },
    Read {
        identity: String,
        key: String,
        /// Defaults to the engine's default isolation level
        #[serde(default)]
        isolation: Option<IsolationLevel>,
        /// Defaults to the current commit counter
        #[serde(default)]
        version: Option<u64>,
    },
    Commit {
        identity: String,
    },
    Abort {
        identity: String,
    },
    Gc {
        identity: String,
        #[serde(default)]
        max_versions: Option<usize>,
    },
    Metrics,
}

impl Request {
    /// Parses one request line.
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    /// Name of the operation, as written in the `op` tag.
    pub fn op(&self) -> &'static str {
        match self {
            Request::Register { .. } => "register",
            Request::Write { .. } => "write",
            Request::Delete { .. } => "delete",
            Request::Store { .. } => "store",
            Request::OffloadStore { .. } => "offload_store",
            Request::Read { .. } => "read",
            Request::Commit { .. } => "commit",
            Request::Abort { .. } => "abort",
            Request::Gc { .. } => "gc",
            Request::Metrics => "metrics",
        }
    }
}
