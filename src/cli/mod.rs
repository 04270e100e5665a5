//! CLI module for pfscluster
//!
//! Provides command-line interface for:
//! - check: replay a recorded replica snapshot through the quorum resolver

mod args;
mod commands;
mod errors;
mod io;
mod snapshot;

pub use args::{Cli, Command};
pub use commands::{check, run, run_command, CheckRequest};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_response, write_response_to};
pub use snapshot::{SlotRecord, Snapshot};
