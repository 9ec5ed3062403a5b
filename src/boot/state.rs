//! In-memory view of the slot metadata
//!
//! `SlotTable` is what gets persisted. `BootControlState` pairs it with the
//! running slot, which comes from the booted image and is never persisted.

use serde::Serialize;

use super::errors::{BootControlError, BootControlResult};
use crate::slot::Slot;

/// Highest slot priority; a freshly activated slot gets this value
pub const MAX_PRIORITY: u8 = 15;

/// Default boot attempts granted to a newly activated slot
pub const DEFAULT_MAX_RETRIES: u8 = 7;

/// Largest retry budget the record format allows to be configured
pub const MAX_RETRIES_LIMIT: u8 = 15;

/// Per-slot boot metadata
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SlotMetadata {
    /// Bootloader may attempt this slot
    pub bootable: bool,
    /// Slot completed a full boot since it was last activated
    pub successful: bool,
    /// Boot attempts left before automatic demotion
    pub retries_left: u8,
    /// Selection rank among bootable slots; higher wins
    pub priority: u8,
}

impl SlotMetadata {
    /// Metadata of a slot that has just been marked unbootable
    pub fn unbootable() -> Self {
        Self::default()
    }
}

/// Metadata for every provisioned slot, indexed by slot number
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SlotTable {
    slots: Vec<SlotMetadata>,
}

impl SlotTable {
    pub fn new(slots: Vec<SlotMetadata>) -> Self {
        Self { slots }
    }

    /// Table with every slot unbootable
    pub fn unprovisioned(num_slots: usize) -> Self {
        Self {
            slots: vec![SlotMetadata::unbootable(); num_slots],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, slot: Slot) -> Option<&SlotMetadata> {
        self.slots.get(slot.as_usize())
    }

    pub fn get_mut(&mut self, slot: Slot) -> Option<&mut SlotMetadata> {
        self.slots.get_mut(slot.as_usize())
    }

    pub fn slots(&self) -> &[SlotMetadata] {
        &self.slots
    }

    /// `(slot, metadata)` pairs in index order
    pub fn iter(&self) -> impl Iterator<Item = (Slot, &SlotMetadata)> {
        self.slots
            .iter()
            .enumerate()
            .map(|(i, m)| (Slot::new(i as u32), m))
    }

    /// Slot the bootloader will pick next.
    ///
    /// Highest priority among bootable slots; ties go to the lowest index.
    pub fn active_slot(&self) -> Option<Slot> {
        self.iter()
            .filter(|(_, m)| m.bootable)
            .fold(None, |best: Option<(Slot, u8)>, (slot, m)| match best {
                Some((_, p)) if p >= m.priority => best,
                _ => Some((slot, m.priority)),
            })
            .map(|(slot, _)| slot)
    }
}

/// Slot metadata plus the immutable running slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootControlState {
    table: SlotTable,
    current_slot: Slot,
}

impl BootControlState {
    pub fn new(table: SlotTable, current_slot: Slot) -> Self {
        Self {
            table,
            current_slot,
        }
    }

    pub fn table(&self) -> &SlotTable {
        &self.table
    }

    pub fn current_slot(&self) -> Slot {
        self.current_slot
    }

    pub fn num_slots(&self) -> usize {
        self.table.len()
    }

    /// Metadata for `slot`, or `InvalidSlot`
    pub fn slot(&self, slot: Slot) -> BootControlResult<&SlotMetadata> {
        self.table
            .get(slot)
            .ok_or_else(|| BootControlError::invalid_slot(slot, self.num_slots()))
    }

    /// Same state with a replaced table; the running slot never changes
    pub(crate) fn with_table(&self, table: SlotTable) -> Self {
        Self {
            table,
            current_slot: self.current_slot,
        }
    }

    /// Derived active slot, `NoBootableSlot` when all slots are unbootable
    pub fn active_slot(&self) -> BootControlResult<Slot> {
        self.table
            .active_slot()
            .ok_or(BootControlError::NoBootableSlot)
    }
}
