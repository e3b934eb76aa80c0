//! CLI module for atomix
//!
//! Provides command-line interface for:
//! - init: Create the data directory and chain log
//! - exec: Serve JSON-lines engine requests from stdin
//! - gc: Collect one identity's keyspace
//! - inspect: Print one key's version chain

mod args;
mod commands;
mod errors;
mod io;
mod request;

pub use args::{Cli, Command};
pub use commands::{execute, exec, gc, init, inspect, run, run_command, Config};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_request_lines, write_error, write_response};
pub use request::Request;
