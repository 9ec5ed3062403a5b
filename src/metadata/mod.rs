//! Persisted slot metadata store
//!
//! Holds the canonical slot table across reboots in a small fixed-size
//! region, the way a bootloader control block does.
//!
//! # Design Principles
//!
//! - Two banks, written alternately; never overwrite the current record
//! - Checksum-verified on every load
//! - Highest valid generation wins
//! - Sync before a commit reports success
//!
//! # Guarantees
//!
//! - A crash at any point of `commit` leaves either the old or the new table
//! - A failed `commit` never touches the bank holding the current record

mod checksum;
mod errors;
mod medium;
mod record;
mod store;

pub use checksum::compute_checksum;
pub use errors::{StorageError, StorageResult};
pub use medium::{BlockMedium, FileMedium, MemoryMedium};
pub use record::{MetadataRecord, FORMAT_MAJOR, FORMAT_MINOR, RECORD_MAGIC, RECORD_SIZE};
pub use store::{BankedStore, FileStore, MetadataStore, BANK_COUNT, REGION_SIZE};
