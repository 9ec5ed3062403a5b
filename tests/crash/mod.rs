//! Crash testing framework for bootctl
//!
//! - Each scenario drives the real binary as a subprocess
//! - Crashes are injected via `BOOTCTL_CRASH_POINT`
//! - After the crash the metadata is reloaded and must hold the state from
//!   before the interrupted command or the state after it, never a mix

pub mod harness;
pub mod scenarios;
pub mod utils;

pub use harness::*;
pub use utils::*;
