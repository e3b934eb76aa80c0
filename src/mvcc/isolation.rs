//! Transaction isolation levels

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Isolation level selected per read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IsolationLevel {
    /// Newest chain entry, committed or not.
    ReadUncommitted,
    /// Latest committed entry at the current commit counter.
    #[default]
    ReadCommitted,
    /// First read of a key pins its value for the transaction.
    RepeatableRead,
    /// Repeatable read plus commit-time validation of the read set.
    Serializable,
}

impl IsolationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ_UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ_COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE_READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }

    /// Returns true if reads under this level pin values in the read cache.
    pub fn pins_snapshot(&self) -> bool {
        matches!(
            self,
            IsolationLevel::RepeatableRead | IsolationLevel::Serializable
        )
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown isolation level name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownIsolationLevel(pub String);

impl fmt::Display for UnknownIsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown isolation level: '{}'", self.0)
    }
}

impl std::error::Error for UnknownIsolationLevel {}

impl FromStr for IsolationLevel {
    type Err = UnknownIsolationLevel;

    /// Accepts `READ_COMMITTED`, `read committed`, `read-committed` and so on.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .map(|c| match c {
                ' ' | '-' => '_',
                c => c.to_ascii_uppercase(),
            })
            .collect();

        match normalized.as_str() {
            "READ_UNCOMMITTED" => Ok(IsolationLevel::ReadUncommitted),
            "READ_COMMITTED" => Ok(IsolationLevel::ReadCommitted),
            "REPEATABLE_READ" => Ok(IsolationLevel::RepeatableRead),
            "SERIALIZABLE" => Ok(IsolationLevel::Serializable),
            _ => Err(UnknownIsolationLevel(s.to_string())),
        }
    }
}
