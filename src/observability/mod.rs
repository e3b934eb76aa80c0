//! Observability for the transaction engine
//!
//! - Structured logging (one JSON line per event, stderr)
//! - Typed lifecycle events
//! - Lock-free engine counters
//!
//! Observability never changes engine behavior: logging failures are
//! swallowed and counters are read without the engine lock.
//!
//! # Usage
//!
//! ```ignore
//! use atomix::observability::{log_event_with_fields, Event, Logger, Severity};
//!
//! Logger::set_min_severity(Severity::Warn);
//! log_event_with_fields(Event::CommitApplied, &[("commit_id", "7")]);
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{EngineMetrics, MetricsSnapshot};
pub use scope::ObservationScope;

/// Log an event at its own severity
pub fn log_event(event: Event) {
    Logger::log(event.severity(), event.as_str(), &[]);
}

/// Log an event at its own severity with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}
