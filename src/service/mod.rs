//! Boot control service
//!
//! `BootControl` is the single entry point the CLI (or any other caller)
//! uses. It binds the slot state machine to a durable `MetadataStore` and
//! makes every mutation atomic with respect to both concurrent callers and
//! power loss.
//!
//! Startup resolves the running slot once (`current_slot::detect`) and
//! optionally checks the partition layout against the slot count.

pub mod current_slot;
pub mod partitions;

mod control;
mod retry;

pub use control::{BootControl, ServiceOptions};
pub use partitions::{LayoutMismatch, PartitionLayout};
pub use retry::{RetryPolicy, DEFAULT_COMMIT_BACKOFF, DEFAULT_COMMIT_RETRIES};
