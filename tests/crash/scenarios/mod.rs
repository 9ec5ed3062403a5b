//! Crash scenarios
//!
//! - `commit`: crashes inside a slot-table commit
//! - `first_boot`: crashes while writing the initial fallback record

pub mod commit;
pub mod first_boot;
