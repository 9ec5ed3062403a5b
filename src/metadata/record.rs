//! Fixed-size metadata record layout
//!
//! ```text
//! +--------+------+----------------------------------------------+
//! | Offset | Size | Field                                        |
//! +--------+------+----------------------------------------------+
//! |      0 |    4 | Magic (u32 LE)                               |
//! |      4 |    2 | Format major version (u16 LE)                |
//! |      6 |    2 | Format minor version (u16 LE)                |
//! |      8 |    8 | Generation counter (u64 LE)                  |
//! |     16 |    1 | Slot count                                   |
//! |     17 |   15 | Reserved                                     |
//! |     32 |   16 | Slot entries, 4 bytes each, MAX_SLOTS of them |
//! |     48 |   76 | Reserved                                     |
//! |    124 |    4 | CRC32 of bytes 0..124 (u32 LE)               |
//! +--------+------+----------------------------------------------+
//! ```
//!
//! Slot entry: `retries_left`, `priority`, `flags` (bit 0 bootable, bit 1
//! successful), one reserved byte. Unused entries are zero.

use super::checksum::{seal, verify_sealed};
use crate::boot::{SlotMetadata, SlotTable, MAX_PRIORITY};
use crate::slot::MAX_SLOTS;

/// Record magic
pub const RECORD_MAGIC: u32 = 0x4C54_4342;

/// Format version written by this crate
pub const FORMAT_MAJOR: u16 = 1;
pub const FORMAT_MINOR: u16 = 0;

/// Size of one record (one bank)
pub const RECORD_SIZE: usize = 128;

const GENERATION_OFFSET: usize = 8;
const SLOT_COUNT_OFFSET: usize = 16;
const SLOTS_OFFSET: usize = 32;
const SLOT_ENTRY_SIZE: usize = 4;

const FLAG_BOOTABLE: u8 = 1 << 0;
const FLAG_SUCCESSFUL: u8 = 1 << 1;
const KNOWN_FLAGS: u8 = FLAG_BOOTABLE | FLAG_SUCCESSFUL;

/// One decoded bank
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRecord {
    /// Monotonic commit counter; the bank with the highest valid value wins
    pub generation: u64,
    pub table: SlotTable,
}

impl MetadataRecord {
    pub fn new(generation: u64, table: SlotTable) -> Self {
        Self { generation, table }
    }

    /// Serialize to a sealed `RECORD_SIZE` buffer.
    ///
    /// Fails for a table `decode` would reject, so a record that was
    /// written can always be read back.
    pub fn encode(&self) -> Result<[u8; RECORD_SIZE], String> {
        let slot_count = self.table.len();
        if slot_count == 0 || slot_count > MAX_SLOTS {
            return Err(format!("invalid slot count {}", slot_count));
        }

        let mut buf = [0u8; RECORD_SIZE];
        buf[0..4].copy_from_slice(&RECORD_MAGIC.to_le_bytes());
        buf[4..6].copy_from_slice(&FORMAT_MAJOR.to_le_bytes());
        buf[6..8].copy_from_slice(&FORMAT_MINOR.to_le_bytes());
        buf[GENERATION_OFFSET..GENERATION_OFFSET + 8]
            .copy_from_slice(&self.generation.to_le_bytes());
        buf[SLOT_COUNT_OFFSET] = slot_count as u8;

        for (i, meta) in self.table.slots().iter().enumerate() {
            if meta.priority > MAX_PRIORITY {
                return Err(format!("slot {} priority {} out of range", i, meta.priority));
            }
            let at = SLOTS_OFFSET + i * SLOT_ENTRY_SIZE;
            let mut flags = 0;
            if meta.bootable {
                flags |= FLAG_BOOTABLE;
            }
            if meta.successful {
                flags |= FLAG_SUCCESSFUL;
            }
            buf[at] = meta.retries_left;
            buf[at + 1] = meta.priority;
            buf[at + 2] = flags;
        }

        seal(&mut buf);
        Ok(buf)
    }

    /// Parse and validate one bank.
    ///
    /// `expected_slots` is the provisioned slot count; a record for a different
    /// layout is rejected like any other corruption.
    pub fn decode(bytes: &[u8], expected_slots: usize) -> Result<Self, String> {
        if bytes.len() != RECORD_SIZE {
            return Err(format!(
                "record is {} bytes, expected {}",
                bytes.len(),
                RECORD_SIZE
            ));
        }

        let magic = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if magic != RECORD_MAGIC {
            return Err(format!("invalid magic 0x{:08x}", magic));
        }

        if !verify_sealed(bytes) {
            return Err("checksum mismatch".to_string());
        }

        let major = u16::from_le_bytes([bytes[4], bytes[5]]);
        if major != FORMAT_MAJOR {
            return Err(format!("unsupported format version {}", major));
        }

        let mut generation = [0u8; 8];
        generation.copy_from_slice(&bytes[GENERATION_OFFSET..GENERATION_OFFSET + 8]);
        let generation = u64::from_le_bytes(generation);

        let slot_count = bytes[SLOT_COUNT_OFFSET] as usize;
        if slot_count != expected_slots {
            return Err(format!(
                "record has {} slots, device has {}",
                slot_count, expected_slots
            ));
        }
        if slot_count == 0 || slot_count > MAX_SLOTS {
            return Err(format!("invalid slot count {}", slot_count));
        }

        let mut slots = Vec::with_capacity(slot_count);
        for i in 0..slot_count {
            let at = SLOTS_OFFSET + i * SLOT_ENTRY_SIZE;
            let (retries_left, priority, flags) = (bytes[at], bytes[at + 1], bytes[at + 2]);
            if priority > MAX_PRIORITY {
                return Err(format!("slot {} priority {} out of range", i, priority));
            }
            if flags & !KNOWN_FLAGS != 0 {
                return Err(format!("slot {} has unknown flags 0x{:02x}", i, flags));
            }
            slots.push(SlotMetadata {
                bootable: flags & FLAG_BOOTABLE != 0,
                successful: flags & FLAG_SUCCESSFUL != 0,
                retries_left,
                priority,
            });
        }

        Ok(Self {
            generation,
            table: SlotTable::new(slots),
        })
    }
}
