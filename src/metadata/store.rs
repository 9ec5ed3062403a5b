//! Two-bank metadata store
//!
//! The region holds two record banks. A commit always writes the bank that
//! does not hold the current record, stamped with the next generation, then
//! syncs. A write torn by power loss can only damage the bank being written,
//! so the last committed record survives intact and `load()` returns either
//! the fully-old or the fully-new state.

use std::path::PathBuf;

use super::errors::{StorageError, StorageResult};
use super::medium::{BlockMedium, FileMedium};
use super::record::{MetadataRecord, RECORD_SIZE};
use crate::boot::SlotTable;
use crate::crash_point::{maybe_crash, points};

/// Number of record banks in the region
pub const BANK_COUNT: usize = 2;

/// Total region size
pub const REGION_SIZE: usize = RECORD_SIZE * BANK_COUNT;

/// Durable, crash-safe home of the slot table
pub trait MetadataStore: Send {
    /// Read the latest committed table.
    ///
    /// Fails with `Uninitialized` or `Corrupt` when no valid record exists.
    fn load(&mut self) -> StorageResult<SlotTable>;

    /// Atomically replace the committed table.
    ///
    /// On error the caller must not assume the new table landed. The bank
    /// holding the previous record is never touched, so a later `load()`
    /// returns one of the two tables whole.
    fn commit(&mut self, table: &SlotTable) -> StorageResult<()>;

    /// Take the store's exclusive lock, waiting for any other holder.
    ///
    /// A read-modify-write cycle must `load` and `commit` under one lock so
    /// no other writer commits in between.
    fn lock(&mut self) -> StorageResult<()>;

    /// Release the lock taken by `lock`
    fn unlock(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Head {
    bank: usize,
    generation: u64,
}

/// Ping-pong store over any `BlockMedium`
pub struct BankedStore<M> {
    medium: M,
    num_slots: usize,
    head: Option<Head>,
}

/// Store backed by a file or block device
pub type FileStore = BankedStore<FileMedium>;

impl FileStore {
    pub fn open_path(path: impl Into<PathBuf>, num_slots: usize) -> Self {
        Self::new(FileMedium::new(path), num_slots)
    }
}

impl<M: BlockMedium> BankedStore<M> {
    pub fn new(medium: M, num_slots: usize) -> Self {
        Self {
            medium,
            num_slots,
            head: None,
        }
    }

    pub fn medium(&self) -> &M {
        &self.medium
    }

    /// Generation of the record last loaded or committed
    pub fn generation(&self) -> Option<u64> {
        self.head.map(|h| h.generation)
    }

    /// Bank holding the record last loaded or committed
    pub fn current_bank(&self) -> Option<usize> {
        self.head.map(|h| h.bank)
    }

    fn bank_offset(bank: usize) -> u64 {
        (bank * RECORD_SIZE) as u64
    }
}

impl<M: BlockMedium> MetadataStore for BankedStore<M> {
    fn load(&mut self) -> StorageResult<SlotTable> {
        self.head = None;

        let region = self
            .medium
            .read_region(REGION_SIZE)
            .map_err(|e| StorageError::io_failure("reading slot metadata region", e))?;

        let region = match region {
            Some(r) if r.iter().any(|b| *b != 0) => r,
            _ => return Err(StorageError::Uninitialized),
        };

        let mut best: Option<(usize, MetadataRecord)> = None;
        let mut rejected = Vec::new();

        for bank in 0..BANK_COUNT {
            let start = bank * RECORD_SIZE;
            let Some(bytes) = region.get(start..start + RECORD_SIZE) else {
                rejected.push(format!("bank {}: truncated", bank));
                continue;
            };
            match MetadataRecord::decode(bytes, self.num_slots) {
                Ok(record) => {
                    let newer = best
                        .as_ref()
                        .map_or(true, |(_, b)| record.generation > b.generation);
                    if newer {
                        best = Some((bank, record));
                    }
                }
                Err(reason) => rejected.push(format!("bank {}: {}", bank, reason)),
            }
        }

        match best {
            Some((bank, record)) => {
                self.head = Some(Head {
                    bank,
                    generation: record.generation,
                });
                Ok(record.table)
            }
            None => Err(StorageError::corrupt(rejected.join("; "))),
        }
    }

    fn commit(&mut self, table: &SlotTable) -> StorageResult<()> {
        if table.len() != self.num_slots {
            return Err(StorageError::unencodable(format!(
                "table has {} slots, device has {}",
                table.len(),
                self.num_slots
            )));
        }

        let (bank, generation) = match self.head {
            Some(head) => ((head.bank + 1) % BANK_COUNT, head.generation + 1),
            None => (0, 1),
        };
        let record = MetadataRecord::new(generation, table.clone())
            .encode()
            .map_err(StorageError::unencodable)?;

        maybe_crash(points::STORE_BEFORE_WRITE);
        self.medium
            .write_at(Self::bank_offset(bank), &record)
            .map_err(|e| StorageError::io_failure(format!("writing bank {}", bank), e))?;

        maybe_crash(points::STORE_AFTER_WRITE);
        self.medium
            .sync()
            .map_err(|e| StorageError::io_failure(format!("syncing bank {}", bank), e))?;

        maybe_crash(points::STORE_AFTER_SYNC);
        self.head = Some(Head { bank, generation });
        Ok(())
    }

    fn lock(&mut self) -> StorageResult<()> {
        self.medium
            .lock()
            .map_err(|e| StorageError::io_failure("locking slot metadata", e))
    }

    fn unlock(&mut self) {
        self.medium.unlock();
    }
}
