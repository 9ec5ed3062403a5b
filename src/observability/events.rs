//! Observable boot control events
//!
//! Events are explicit and typed; the string form is the `event` field of
//! the log line.

use std::fmt;

use super::logger::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Service lifecycle
    /// Service opened and ready to serve calls
    ServiceOpen,
    /// Running slot resolved
    CurrentSlotDetected,

    // Store
    /// Committed metadata loaded
    StoreLoaded,
    /// No metadata ever written
    StoreUninitialized,
    /// Metadata present but no bank valid
    StoreCorrupt,
    /// Safe default state written after a failed load
    FallbackCommitted,
    /// Commit failed with a transient fault and will be retried
    CommitRetry,
    /// Commit failed for good
    CommitFailed,

    // Slot transitions
    SlotActivated,
    SlotMarkedSuccessful,
    SlotMarkedUnbootable,
    /// Bootloader consumed a boot attempt
    BootAttempt,
    /// Retry budget exhausted, slot demoted to unbootable
    SlotDemoted,

    // Layout
    /// Partition names disagree with the provisioned slot count
    PartitionLayoutMismatch,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ServiceOpen => "SERVICE_OPEN",
            Event::CurrentSlotDetected => "CURRENT_SLOT_DETECTED",
            Event::StoreLoaded => "STORE_LOADED",
            Event::StoreUninitialized => "STORE_UNINITIALIZED",
            Event::StoreCorrupt => "STORE_CORRUPT",
            Event::FallbackCommitted => "FALLBACK_COMMITTED",
            Event::CommitRetry => "COMMIT_RETRY",
            Event::CommitFailed => "COMMIT_FAILED",
            Event::SlotActivated => "SLOT_ACTIVATED",
            Event::SlotMarkedSuccessful => "SLOT_MARKED_SUCCESSFUL",
            Event::SlotMarkedUnbootable => "SLOT_MARKED_UNBOOTABLE",
            Event::BootAttempt => "BOOT_ATTEMPT",
            Event::SlotDemoted => "SLOT_DEMOTED",
            Event::PartitionLayoutMismatch => "PARTITION_LAYOUT_MISMATCH",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::StoreCorrupt
            | Event::CommitRetry
            | Event::SlotDemoted
            | Event::PartitionLayoutMismatch => Severity::Warn,
            Event::CommitFailed => Severity::Error,
            Event::CurrentSlotDetected | Event::BootAttempt => Severity::Trace,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
