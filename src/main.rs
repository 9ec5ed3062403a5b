//! bootctl entry point
//!
//! Parsing, configuration and dispatch all live in `cli::run`; this only
//! turns its result into the process exit status.

use bootctl::cli;

fn main() {
    std::process::exit(cli::run());
}
