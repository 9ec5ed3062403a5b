//! Boot slot state machine
//!
//! Computes the active slot, validates slot transitions and enforces the
//! retry/priority policy. Operates purely on in-memory state; persistence is
//! the metadata store's job and serialization is the service's.
//!
//! # Invariants
//!
//! - An unbootable slot is never the active slot
//! - Exactly one bootable slot holds the top priority after any transition
//! - The running slot never changes for the lifetime of a state
//! - Marking a slot successful is idempotent

mod errors;
mod machine;
mod state;

pub use errors::{BootControlError, BootControlResult};
pub use machine::{BootAttempt, InvariantViolation, SlotStateMachine};
pub use state::{
    BootControlState, SlotMetadata, SlotTable, DEFAULT_MAX_RETRIES, MAX_PRIORITY,
    MAX_RETRIES_LIMIT,
};
