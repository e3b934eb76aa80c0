//! Engine configuration
//!
//! Loaded from the `engine` section of the CLI configuration file. Every
//! field has a default, so `{}` is a valid configuration.

use serde::{Deserialize, Serialize};

use crate::mvcc::{IsolationLevel, RetentionPolicy};
use crate::observability::Severity;

/// Default chain length kept by garbage collection.
pub const DEFAULT_GC_MAX_VERSIONS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Isolation level used by sessions that do not choose one.
    #[serde(default)]
    pub default_isolation: IsolationLevel,

    /// Versions kept per chain when no explicit bound is given.
    #[serde(default = "default_gc_max_versions")]
    pub gc_max_versions: usize,

    #[serde(default)]
    pub gc_retention: RetentionPolicy,

    /// Minimum severity written to the log.
    #[serde(default)]
    pub log_level: Severity,
}

fn default_gc_max_versions() -> usize {
    DEFAULT_GC_MAX_VERSIONS
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_isolation: IsolationLevel::default(),
            gc_max_versions: DEFAULT_GC_MAX_VERSIONS,
            gc_retention: RetentionPolicy::default(),
            log_level: Severity::default(),
        }
    }
}

impl EngineConfig {
    /// Checks values serde cannot reject on its own.
    pub fn validate(&self) -> Result<(), String> {
        if self.gc_max_versions == 0 {
            return Err("gc_max_versions must be at least 1".to_string());
        }
        Ok(())
    }
}
