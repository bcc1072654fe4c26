//! ledgerdb CLI entry point
//!
//! Parses arguments and dispatches to the CLI module. On failure the error
//! code and message are printed to stderr and the process exits non-zero.
//! All logic lives in the CLI module.

use ledgerdb::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
