//! CLI module for bootctl
//!
//! Thin wrapper over the boot control service. Each invocation opens the
//! service, runs one command, and exits with a sysexits-style status:
//! 0 on success, 64 on bad usage, 70 when the call fails or a boolean query
//! answers false, 78 on a bad config file.

mod args;
mod commands;
mod errors;

use std::ffi::OsString;
use std::io::{self, Write};

use clap::Parser;

pub use args::{Cli, Command};
pub use commands::{execute, load_config, log_severity, open_service, run_command};
pub use errors::{CliError, CliErrorCode, CliResult, EX_CONFIG, EX_OK, EX_SOFTWARE, EX_USAGE};

/// Main CLI entry point; returns the process exit status.
///
/// This is the only function that main.rs should call.
pub fn run() -> i32 {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    run_from(std::env::args_os(), &mut out)
}

/// Parse `args` and run, writing command output to `out`.
///
/// Usage errors and error messages go to stderr.
pub fn run_from<I, T, W>(args: I, out: &mut W) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    W: Write,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version land here too, on stdout
            let _ = e.print();
            return if e.use_stderr() { EX_USAGE } else { EX_OK };
        }
    };

    match execute(&cli, out) {
        Ok(()) => EX_OK,
        Err(e) => {
            if !e.message().is_empty() {
                eprintln!("{}", e.message());
            }
            e.exit_status()
        }
    }
}
