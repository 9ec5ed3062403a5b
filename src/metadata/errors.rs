//! Metadata store error types
//!
//! Error codes:
//! - BOOTCTL_STORAGE_UNINITIALIZED: nothing has ever been committed
//! - BOOTCTL_STORAGE_CORRUPT: bytes present, no bank passes validation
//! - BOOTCTL_STORAGE_IO_FAILURE: the medium failed a read, write, sync or lock
//! - BOOTCTL_STORAGE_UNENCODABLE: the table cannot be stored in a record

use std::io;

use thiserror::Error;

/// Persisted store failure
#[derive(Debug, Error)]
pub enum StorageError {
    /// The region is missing or blank
    #[error("Slot metadata has never been written")]
    Uninitialized,

    /// No bank holds a valid record
    #[error("Slot metadata is corrupt: {reason}")]
    Corrupt { reason: String },

    /// Underlying medium error; no partial success may be assumed
    #[error("Slot metadata I/O failure: {context}: {source}")]
    IoFailure {
        context: String,
        #[source]
        source: io::Error,
    },

    /// Table the record format cannot hold; nothing was written
    #[error("Slot metadata cannot be encoded: {reason}")]
    Unencodable { reason: String },
}

impl StorageError {
    pub fn corrupt(reason: impl Into<String>) -> Self {
        Self::Corrupt {
            reason: reason.into(),
        }
    }

    pub fn unencodable(reason: impl Into<String>) -> Self {
        Self::Unencodable {
            reason: reason.into(),
        }
    }

    pub fn io_failure(context: impl Into<String>, source: io::Error) -> Self {
        Self::IoFailure {
            context: context.into(),
            source,
        }
    }

    /// Stable error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::Uninitialized => "BOOTCTL_STORAGE_UNINITIALIZED",
            Self::Corrupt { .. } => "BOOTCTL_STORAGE_CORRUPT",
            Self::IoFailure { .. } => "BOOTCTL_STORAGE_IO_FAILURE",
            Self::Unencodable { .. } => "BOOTCTL_STORAGE_UNENCODABLE",
        }
    }

    /// Load-time integrity failures, recovered by falling back to a safe state
    pub fn is_recoverable_at_load(&self) -> bool {
        matches!(self, Self::Uninitialized | Self::Corrupt { .. })
    }

    /// Medium faults worth one more attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::IoFailure { .. })
    }
}

/// Result type for store operations
pub type StorageResult<T> = Result<T, StorageError>;
