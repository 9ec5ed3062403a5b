//! Boot control error types
//!
//! Error codes:
//! - BOOTCTL_INVALID_SLOT
//! - BOOTCTL_NO_BOOTABLE_SLOT
//! - BOOTCTL_CURRENT_SLOT_UNKNOWN
//! - BOOTCTL_UNSUPPORTED_SLOT_COUNT
//! - storage codes are passed through from `StorageError`

use thiserror::Error;

use crate::metadata::StorageError;
use crate::slot::{Slot, MAX_SLOTS};

/// Errors surfaced by the state machine and the service facade
#[derive(Debug, Error)]
pub enum BootControlError {
    /// Slot index outside `[0, num_slots)`
    #[error("Invalid slot {slot} (device has {num_slots} slots)")]
    InvalidSlot { slot: Slot, num_slots: usize },

    /// Every slot is unbootable
    #[error("No bootable slot")]
    NoBootableSlot,

    /// The running slot could not be determined at startup
    #[error("Cannot determine current slot: {0}")]
    CurrentSlotUnknown(String),

    /// Slot count outside `1..=MAX_SLOTS`
    #[error("Unsupported slot count {num_slots} (must be 1 to {max})", max = MAX_SLOTS)]
    UnsupportedSlotCount { num_slots: usize },

    /// Persisted store failure
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl BootControlError {
    /// Stable error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidSlot { .. } => "BOOTCTL_INVALID_SLOT",
            Self::NoBootableSlot => "BOOTCTL_NO_BOOTABLE_SLOT",
            Self::CurrentSlotUnknown(_) => "BOOTCTL_CURRENT_SLOT_UNKNOWN",
            Self::UnsupportedSlotCount { .. } => "BOOTCTL_UNSUPPORTED_SLOT_COUNT",
            Self::Storage(e) => e.code(),
        }
    }

    /// Shorthand for `InvalidSlot`
    pub fn invalid_slot(slot: Slot, num_slots: usize) -> Self {
        Self::InvalidSlot { slot, num_slots }
    }

    /// Whether the error came from an out-of-range slot argument
    pub fn is_invalid_slot(&self) -> bool {
        matches!(self, Self::InvalidSlot { .. })
    }
}

/// Result type for boot control operations
pub type BootControlResult<T> = Result<T, BootControlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            BootControlError::invalid_slot(Slot::new(5), 2).code(),
            "BOOTCTL_INVALID_SLOT"
        );
        assert_eq!(BootControlError::NoBootableSlot.code(), "BOOTCTL_NO_BOOTABLE_SLOT");
        assert_eq!(
            BootControlError::UnsupportedSlotCount { num_slots: 5 }.code(),
            "BOOTCTL_UNSUPPORTED_SLOT_COUNT"
        );
        assert_eq!(
            BootControlError::from(StorageError::corrupt("bad magic")).code(),
            "BOOTCTL_STORAGE_CORRUPT"
        );
    }

    #[test]
    fn test_invalid_slot_display() {
        let err = BootControlError::invalid_slot(Slot::new(7), 2);
        let display = err.to_string();
        assert!(display.contains("7"));
        assert!(display.contains("2 slots"));
        assert!(err.is_invalid_slot());
    }
}
