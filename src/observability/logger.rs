//! Structured JSON logger
//!
//! Every event is a single JSON object on its own stderr line. Keys are
//! sorted, so two calls with the same fields produce identical bytes.
//! stdout is left to the CLI response stream.

use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Per-operation detail (scope begin markers)
    Trace,
    #[default]
    Info,
    Warn,
    Error,
    /// Durable state cannot be trusted
    Fatal,
}

const LEVELS: [Severity; 5] = [
    Severity::Trace,
    Severity::Info,
    Severity::Warn,
    Severity::Error,
    Severity::Fatal,
];

impl Severity {
    /// Upper-case label written in the `severity` field
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        if wanted == "WARNING" {
            return Ok(Severity::Warn);
        }
        LEVELS
            .into_iter()
            .find(|level| level.as_str() == wanted)
            .ok_or_else(|| format!("unknown log level: {}", s))
    }
}

static MIN_SEVERITY: AtomicU8 = AtomicU8::new(Severity::Info as u8);

/// Process-wide structured logger
pub struct Logger;

impl Logger {
    /// Drops every later event below `severity`.
    pub fn set_min_severity(severity: Severity) {
        MIN_SEVERITY.store(severity as u8, Ordering::Relaxed);
    }

    pub fn min_severity() -> Severity {
        let raw = usize::from(MIN_SEVERITY.load(Ordering::Relaxed));
        LEVELS.get(raw).copied().unwrap_or(Severity::Fatal)
    }

    pub fn enabled(severity: Severity) -> bool {
        severity >= Self::min_severity()
    }

    pub fn log(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        if Self::enabled(severity) {
            emit(&mut io::stderr().lock(), severity, event, fields);
        }
    }

    pub fn trace(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Trace, event, fields);
    }

    pub fn info(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Info, event, fields);
    }

    pub fn warn(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Warn, event, fields);
    }

    pub fn error(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Error, event, fields);
    }

    pub fn fatal(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Fatal, event, fields);
    }
}

/// Builds the JSON object for one event.
///
/// `event` and `severity` are reserved; a caller field with either name is
/// ignored.
fn render(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
    let mut line = Map::new();
    for (key, value) in fields {
        line.insert((*key).to_string(), Value::from(*value));
    }
    line.insert("event".to_string(), Value::from(event));
    line.insert("severity".to_string(), Value::from(severity.as_str()));

    let mut rendered = Value::Object(line).to_string();
    rendered.push('\n');
    rendered
}

fn emit<W: Write>(writer: &mut W, severity: Severity, event: &str, fields: &[(&str, &str)]) {
    // Write errors are swallowed
    let _ = writer
        .write_all(render(severity, event, fields).as_bytes())
        .and_then(|_| writer.flush());
}

#[cfg(test)]
pub(crate) fn capture_log(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
    let mut buffer = Vec::new();
    emit(&mut buffer, severity, event, fields);
    String::from_utf8(buffer).unwrap()
}
