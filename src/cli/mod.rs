//! CLI module for ledgerdb
//!
//! Thin front end over the consumer API: put, get, delete, scan, history,
//! range, metrics, audit, beacon, verify-beacon. Engine errors keep their
//! `LEDGER_*` codes and turn into a non-zero exit status.

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, GlobalArgs};
pub use commands::{execute, run, run_command};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::write_response;
