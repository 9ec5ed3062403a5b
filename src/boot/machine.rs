//! Slot state machine
//!
//! Pure transitions over `BootControlState`. Every operation takes the current
//! committed state and returns the next one; nothing here touches storage.
//! The caller commits the returned state or discards it.
//!
//! # Policy
//!
//! - Activating a slot gives it `MAX_PRIORITY` and a full retry budget, and
//!   re-ranks the other bootable slots beneath it in their previous order.
//! - An unsuccessful slot loses one retry per boot attempt and is demoted to
//!   unbootable when its budget reaches zero.
//! - A successful slot boots without consuming retries.

use std::fmt;

use super::errors::{BootControlError, BootControlResult};
use super::state::{
    BootControlState, SlotMetadata, SlotTable, DEFAULT_MAX_RETRIES, MAX_PRIORITY,
};
use crate::slot::Slot;

/// Outcome of one bootloader boot attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootAttempt {
    /// Slot the bootloader tried
    pub slot: Slot,
    /// Retries left on that slot after the attempt
    pub retries_left: u8,
    /// Whether the attempt exhausted the budget and demoted the slot
    pub demoted: bool,
}

/// Broken invariant found by `SlotStateMachine::check_invariants`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// Unbootable slot carries a nonzero priority
    UnbootableWithPriority { slot: Slot, priority: u8 },
    /// Two bootable slots share the top priority
    DuplicateTopPriority {
        first: Slot,
        second: Slot,
        priority: u8,
    },
    /// Priority above `MAX_PRIORITY`
    PriorityOutOfRange { slot: Slot, priority: u8 },
    /// Retry budget above the configured maximum
    RetriesOutOfRange { slot: Slot, retries_left: u8 },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnbootableWithPriority { slot, priority } => {
                write!(f, "slot {} is unbootable but has priority {}", slot, priority)
            }
            Self::DuplicateTopPriority {
                first,
                second,
                priority,
            } => write!(
                f,
                "slots {} and {} share top priority {}",
                first, second, priority
            ),
            Self::PriorityOutOfRange { slot, priority } => {
                write!(f, "slot {} has priority {} above {}", slot, priority, MAX_PRIORITY)
            }
            Self::RetriesOutOfRange { slot, retries_left } => {
                write!(f, "slot {} has {} retries left", slot, retries_left)
            }
        }
    }
}

/// Transition logic parameterized by the retry budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotStateMachine {
    max_retries: u8,
}

impl Default for SlotStateMachine {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}

impl SlotStateMachine {
    pub fn new(max_retries: u8) -> Self {
        Self { max_retries }
    }

    pub fn max_retries(&self) -> u8 {
        self.max_retries
    }

    /// State used when the store holds nothing trustworthy.
    ///
    /// Only the running slot is known to boot, so it is the only slot left
    /// bootable.
    pub fn fallback_state(
        &self,
        num_slots: usize,
        current: Slot,
    ) -> BootControlResult<BootControlState> {
        let mut table = SlotTable::unprovisioned(num_slots);
        let meta = table
            .get_mut(current)
            .ok_or_else(|| BootControlError::invalid_slot(current, num_slots))?;
        *meta = SlotMetadata {
            bootable: true,
            successful: true,
            retries_left: self.max_retries,
            priority: MAX_PRIORITY,
        };
        Ok(BootControlState::new(table, current))
    }

    /// Mark the running slot as having booted successfully.
    ///
    /// Idempotent: a second call produces an identical state.
    pub fn mark_boot_successful(
        &self,
        state: &BootControlState,
    ) -> BootControlResult<BootControlState> {
        let current = state.current_slot();
        let mut table = state.table().clone();
        let meta = table
            .get_mut(current)
            .ok_or_else(|| BootControlError::invalid_slot(current, state.num_slots()))?;
        meta.successful = true;
        meta.retries_left = self.max_retries;
        Ok(state.with_table(table))
    }

    /// Make `slot` the next slot to boot
    pub fn set_active_boot_slot(
        &self,
        state: &BootControlState,
        slot: Slot,
    ) -> BootControlResult<BootControlState> {
        state.slot(slot)?;
        let mut table = state.table().clone();

        // Previous order of the other bootable slots, best first
        let mut others: Vec<(Slot, u8)> = table
            .iter()
            .filter(|(s, m)| *s != slot && m.bootable)
            .map(|(s, m)| (s, m.priority))
            .collect();
        others.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        for (rank, (other, _)) in others.iter().enumerate() {
            if let Some(meta) = table.get_mut(*other) {
                meta.priority = MAX_PRIORITY.saturating_sub(1 + rank as u8);
            }
        }

        if let Some(meta) = table.get_mut(slot) {
            *meta = SlotMetadata {
                bootable: true,
                successful: false,
                retries_left: self.max_retries,
                priority: MAX_PRIORITY,
            };
        }

        Ok(state.with_table(table))
    }

    /// Forbid the bootloader from booting `slot`
    pub fn set_slot_as_unbootable(
        &self,
        state: &BootControlState,
        slot: Slot,
    ) -> BootControlResult<BootControlState> {
        state.slot(slot)?;
        let mut table = state.table().clone();
        if let Some(meta) = table.get_mut(slot) {
            *meta = SlotMetadata::unbootable();
        }
        Ok(state.with_table(table))
    }

    pub fn is_slot_bootable(
        &self,
        state: &BootControlState,
        slot: Slot,
    ) -> BootControlResult<bool> {
        Ok(state.slot(slot)?.bootable)
    }

    pub fn is_slot_marked_successful(
        &self,
        state: &BootControlState,
        slot: Slot,
    ) -> BootControlResult<bool> {
        Ok(state.slot(slot)?.successful)
    }

    /// Apply one boot attempt the way the bootloader does.
    ///
    /// The bootloader is a separate program; this keeps the retry policy in
    /// one place so both sides agree on it.
    pub fn record_boot_attempt(
        &self,
        state: &BootControlState,
    ) -> BootControlResult<(BootControlState, BootAttempt)> {
        let slot = state.active_slot()?;
        let mut table = state.table().clone();
        let meta = table
            .get_mut(slot)
            .ok_or_else(|| BootControlError::invalid_slot(slot, state.num_slots()))?;

        if meta.successful {
            let attempt = BootAttempt {
                slot,
                retries_left: meta.retries_left,
                demoted: false,
            };
            return Ok((state.with_table(table), attempt));
        }

        meta.retries_left = meta.retries_left.saturating_sub(1);
        let demoted = meta.retries_left == 0;
        if demoted {
            *meta = SlotMetadata::unbootable();
        }
        let attempt = BootAttempt {
            slot,
            retries_left: meta.retries_left,
            demoted,
        };
        Ok((state.with_table(table), attempt))
    }

    /// Collect every broken invariant in `state`
    pub fn check_invariants(&self, state: &BootControlState) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();
        let mut top: Option<(Slot, u8)> = None;
        let mut top_duplicate: Option<Slot> = None;

        for (slot, meta) in state.table().iter() {
            if meta.priority > MAX_PRIORITY {
                violations.push(InvariantViolation::PriorityOutOfRange {
                    slot,
                    priority: meta.priority,
                });
            }
            if meta.retries_left > self.max_retries {
                violations.push(InvariantViolation::RetriesOutOfRange {
                    slot,
                    retries_left: meta.retries_left,
                });
            }
            if !meta.bootable {
                if meta.priority != 0 {
                    violations.push(InvariantViolation::UnbootableWithPriority {
                        slot,
                        priority: meta.priority,
                    });
                }
                continue;
            }
            match top {
                Some((_, p)) if p > meta.priority => {}
                Some((_, p)) if p == meta.priority => {
                    top_duplicate.get_or_insert(slot);
                }
                _ => {
                    top = Some((slot, meta.priority));
                    top_duplicate = None;
                }
            }
        }

        if let (Some((first, priority)), Some(second)) = (top, top_duplicate) {
            violations.push(InvariantViolation::DuplicateTopPriority {
                first,
                second,
                priority,
            });
        }

        violations
    }
}
