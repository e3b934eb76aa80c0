//! CLI command implementations
//!
//! Every command loads the configuration file first. `init` creates the
//! chain log; the other commands refuse to run until it exists.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::mvcc::VersionedData;
use crate::observability::{log_event_with_fields, Event, Logger};
use crate::storage::{FileAdapter, CHAIN_LOG_FILE};
use crate::txn::{EngineConfig, TransactionEngine, TxnResult};

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{read_request_lines, write_error, write_response};
use super::request::Request;

/// Configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory (required)
    pub data_dir: String,

    #[serde(default)]
    pub engine: EngineConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::Config(format!("failed to read {}: {}", path.display(), e)))?;

        let config: Config = serde_json::from_str(&content)
            .map_err(|e| CliError::Config(format!("invalid config JSON: {}", e)))?;

        config.validate()?;

        let path = path.display().to_string();
        log_event_with_fields(
            Event::ConfigLoaded,
            &[("data_dir", config.data_dir.as_str()), ("path", path.as_str())],
        );
        Ok(config)
    }

    fn validate(&self) -> CliResult<()> {
        if self.data_dir.trim().is_empty() {
            return Err(CliError::Config("data_dir must not be empty".to_string()));
        }
        self.engine.validate().map_err(CliError::Config)
    }

    /// Get data directory as Path
    pub fn data_path(&self) -> &Path {
        Path::new(&self.data_dir)
    }
}

/// Main CLI entry point
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Init { config } => init(&config),
        Command::Exec { config } => exec(&config),
        Command::Gc {
            config,
            identity,
            max_versions,
        } => gc(&config, &identity, max_versions),
        Command::Inspect {
            config,
            identity,
            key,
        } => inspect(&config, &identity, &key),
    }
}

fn is_initialized(data_dir: &Path) -> bool {
    data_dir.join(CHAIN_LOG_FILE).exists()
}

/// Create the data directory and an empty chain log
pub fn init(config_path: &Path) -> CliResult<()> {
    let config = Config::load(config_path)?;
    Logger::set_min_severity(config.engine.log_level);
    let data_dir = config.data_path();

    if is_initialized(data_dir) {
        return Err(CliError::AlreadyInitialized);
    }

    let adapter = FileAdapter::open(data_dir)?;

    write_response(
        &mut io::stdout(),
        json!({
            "initialized": true,
            "data_dir": config.data_dir,
            "log": adapter.path().display().to_string(),
        }),
    )
}

/// Open the engine over the configured data directory
fn open_engine(config: &Config) -> CliResult<TransactionEngine> {
    Logger::set_min_severity(config.engine.log_level);
    let data_dir = config.data_path();

    if !is_initialized(data_dir) {
        return Err(CliError::NotInitialized);
    }

    let adapter = Arc::new(FileAdapter::open(data_dir)?);
    Ok(TransactionEngine::open(config.engine.clone(), adapter)?)
}

/// Serve JSON-lines requests from stdin until EOF
pub fn exec(config_path: &Path) -> CliResult<()> {
    let config = Config::load(config_path)?;
    let engine = open_engine(&config)?;

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    execute(&engine, stdin.lock(), &mut stdout)?;
    Ok(())
}

/// Executes every request line from `reader`, writing one response per line.
///
/// Request failures become error responses; only I/O failures stop the loop.
/// Returns the number of requests that succeeded.
pub fn execute<R: BufRead, W: Write>(
    engine: &TransactionEngine,
    reader: R,
    writer: &mut W,
) -> CliResult<usize> {
    let mut succeeded = 0;
    for line in read_request_lines(reader) {
        let line = line?;
        let request = match Request::parse(&line) {
            Ok(request) => request,
            Err(e) => {
                let err = CliError::InvalidRequest(e.to_string());
                let message = err.to_string();
                write_error(writer, err.code(), &message)?;
                continue;
            }
        };

        let op = request.op();
        match handle_request(engine, request) {
            Ok(data) => {
                write_response(writer, data)?;
                succeeded += 1;
            }
            Err(e) => write_error(writer, e.code(), &format!("{} failed: {}", op, e))?,
        }
    }
    Ok(succeeded)
}

fn handle_request(engine: &TransactionEngine, request: Request) -> TxnResult<Value> {
    match request {
        Request::Register { identity, keyspace } => {
            let keyspace = keyspace.unwrap_or_else(|| identity.clone());
            let created = engine.register_in(&identity, &keyspace);
            Ok(json!({"registered": created, "keyspace": keyspace}))
        }
        Request::Write {
            identity,
            key,
            value,
            version,
        } => {
            let version = version.unwrap_or_else(|| engine.current_commit().value());
            engine.write(&identity, &key, value.into_bytes(), version)?;
            Ok(json!({"staged": key}))
        }
        Request::Delete { identity, key } => {
            engine.delete(&identity, &key)?;
            Ok(json!({"staged": key}))
        }
        Request::Store {
            identity,
            key,
            value,
        } => {
            engine.store(&identity, &key, value.into_bytes())?;
            Ok(json!({"deferred": engine.deferred_len(&identity)?}))
        }
        Request::OffloadStore { identity } => {
            let merged = engine.offload_store(&identity)?;
            Ok(json!({"merged": merged}))
        }
        Request::Read {
            identity,
            key,
            isolation,
            version,
        } => {
            let isolation = isolation.unwrap_or(engine.config().default_isolation);
            let version = version.unwrap_or_else(|| engine.current_commit().value());
            let value = engine.read(&identity, &key, version, isolation)?;
            Ok(json!({
                "key": key,
                "isolation": isolation.as_str(),
                "value": value.map(|v| String::from_utf8_lossy(&v).into_owned()),
            }))
        }
        Request::Commit { identity } => {
            let commit_id = engine.commit(&identity)?;
            Ok(json!({"commit_id": commit_id.map(|c| c.value())}))
        }
        Request::Abort { identity } => {
            let retracted = engine.abort(&identity)?;
            Ok(json!({"retracted": retracted}))
        }
        Request::Gc {
            identity,
            max_versions,
        } => {
            let max_versions = max_versions.unwrap_or(engine.config().gc_max_versions);
            let keys_trimmed = engine.garbage_collect(&identity, max_versions)?;
            Ok(json!({"keys_trimmed": keys_trimmed}))
        }
        Request::Metrics => {
            let mut data = json!(engine.metrics().snapshot());
            data["resident_chains"] = json!(engine.resident_chain_count());
            Ok(data)
        }
    }
}

/// Trim every chain in an identity's keyspace
pub fn gc(config_path: &Path, identity: &str, max_versions: Option<usize>) -> CliResult<()> {
    let config = Config::load(config_path)?;
    let engine = open_engine(&config)?;
    engine.register(identity);

    let max_versions = max_versions.unwrap_or(config.engine.gc_max_versions);
    let keys_trimmed = engine.garbage_collect(identity, max_versions)?;

    write_response(
        &mut io::stdout(),
        json!({
            "identity": identity,
            "max_versions": max_versions,
            "keys_trimmed": keys_trimmed,
        }),
    )
}

/// Print the durable chain of one key
pub fn inspect(config_path: &Path, identity: &str, key: &str) -> CliResult<()> {
    let config = Config::load(config_path)?;
    let engine = open_engine(&config)?;
    engine.register(identity);

    let chain = engine.chain_snapshot(identity, key)?;
    write_response(
        &mut io::stdout(),
        json!({
            "key": key,
            "current_commit": engine.current_commit().value(),
            "entries": chain.iter().map(entry_json).collect::<Vec<_>>(),
        }),
    )
}

fn entry_json(entry: &VersionedData) -> Value {
    json!({
        "version": entry.version(),
        "commit_id": entry.commit_id().map(|c| c.value()),
        "deleted": entry.is_tombstone(),
        "value": entry.value().map(|v| String::from_utf8_lossy(v).into_owned()),
    })
}
