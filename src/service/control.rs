//! Boot control service facade
//!
//! Owns the store and the committed state. Queries read the published
//! snapshot; mutations lock the store, reload it, compute the next state with
//! `SlotStateMachine`, commit it durably, and only then publish it.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard};

use super::partitions::PartitionLayout;
use super::retry::RetryPolicy;
use crate::boot::{
    BootAttempt, BootControlError, BootControlResult, BootControlState, InvariantViolation,
    SlotStateMachine, DEFAULT_MAX_RETRIES,
};
use crate::metadata::{MetadataStore, StorageError};
use crate::observability::{log_event, log_event_with_fields, Event};
use crate::slot::{Slot, DEFAULT_NUM_SLOTS, MAX_SLOTS};

/// Startup parameters for `BootControl::open`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceOptions {
    pub num_slots: usize,
    /// Slot the system is running from, resolved by the caller
    pub current_slot: Slot,
    pub max_retries: u8,
    pub retry: RetryPolicy,
    /// By-name partition directory checked against `num_slots`
    pub partition_dir: Option<PathBuf>,
}

impl ServiceOptions {
    pub fn new(num_slots: usize, current_slot: Slot) -> Self {
        Self {
            num_slots,
            current_slot,
            max_retries: DEFAULT_MAX_RETRIES,
            retry: RetryPolicy::default(),
            partition_dir: None,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u8) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_partition_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.partition_dir = Some(dir.into());
        self
    }
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self::new(DEFAULT_NUM_SLOTS, Slot::new(0))
    }
}

/// Store plus whether it may hold bytes the snapshot does not reflect
struct Transaction<S> {
    store: S,
    dirty: bool,
}

/// Slot management service.
///
/// Every read-modify-write runs under the store's exclusive lock and starts
/// from a fresh `load()`, so mutations from other processes sharing the
/// store are serialized with ours instead of overwritten. Mutations are
/// atomic: either the new state is durable and visible, or the call fails
/// and the visible state is unchanged. Queries read the snapshot published
/// by the last open or mutation and never block on a commit in progress.
pub struct BootControl<S> {
    machine: SlotStateMachine,
    retry: RetryPolicy,
    txn: Mutex<Transaction<S>>,
    committed: RwLock<BootControlState>,
}

impl<S: MetadataStore> BootControl<S> {
    /// Load committed metadata, writing the fallback state when the store
    /// holds nothing valid.
    pub fn open(mut store: S, options: ServiceOptions) -> BootControlResult<Self> {
        let ServiceOptions {
            num_slots,
            current_slot,
            max_retries,
            retry,
            partition_dir,
        } = options;

        if num_slots == 0 || num_slots > MAX_SLOTS {
            return Err(BootControlError::UnsupportedSlotCount { num_slots });
        }
        if !current_slot.in_range(num_slots) {
            return Err(BootControlError::invalid_slot(current_slot, num_slots));
        }
        if let Some(dir) = partition_dir {
            check_partition_layout(&dir, num_slots);
        }

        let machine = SlotStateMachine::new(max_retries);
        let state = with_store_lock(&mut store, |store| {
            load_or_recover(store, &machine, &retry, num_slots, current_slot)
        })?;

        for violation in machine.check_invariants(&state) {
            log_event_with_fields(
                Event::StoreCorrupt,
                &[("violation", &violation.to_string())],
            );
        }

        log_event_with_fields(
            Event::ServiceOpen,
            &[
                ("current_slot", &current_slot.to_string()),
                ("num_slots", &num_slots.to_string()),
            ],
        );

        Ok(Self {
            machine,
            retry,
            txn: Mutex::new(Transaction {
                store,
                dirty: false,
            }),
            committed: RwLock::new(state),
        })
    }

    pub fn get_number_slots(&self) -> usize {
        self.read().num_slots()
    }

    pub fn get_current_slot(&self) -> Slot {
        self.read().current_slot()
    }

    /// Highest-priority bootable slot
    pub fn get_active_boot_slot(&self) -> BootControlResult<Slot> {
        self.read().active_slot()
    }

    /// Record that the running slot booted successfully
    pub fn mark_boot_successful(&self) -> BootControlResult<()> {
        let slot = self.transact(|m, state| {
            Ok((m.mark_boot_successful(state)?, state.current_slot()))
        })?;
        log_event_with_fields(Event::SlotMarkedSuccessful, &[("slot", &slot.to_string())]);
        Ok(())
    }

    /// Make `slot` the next slot the bootloader tries
    pub fn set_active_boot_slot(&self, slot: Slot) -> BootControlResult<()> {
        self.transact(|m, state| Ok((m.set_active_boot_slot(state, slot)?, ())))?;
        log_event_with_fields(Event::SlotActivated, &[("slot", &slot.to_string())]);
        Ok(())
    }

    pub fn set_slot_as_unbootable(&self, slot: Slot) -> BootControlResult<()> {
        self.transact(|m, state| Ok((m.set_slot_as_unbootable(state, slot)?, ())))?;
        log_event_with_fields(Event::SlotMarkedUnbootable, &[("slot", &slot.to_string())]);
        Ok(())
    }

    pub fn is_slot_bootable(&self, slot: Slot) -> BootControlResult<bool> {
        self.machine.is_slot_bootable(&self.read(), slot)
    }

    pub fn is_slot_marked_successful(&self, slot: Slot) -> BootControlResult<bool> {
        self.machine.is_slot_marked_successful(&self.read(), slot)
    }

    /// Partition-name suffix for `slot`, `InvalidSlot` past the slot count
    pub fn get_suffix(&self, slot: Slot) -> BootControlResult<&'static str> {
        let num_slots = self.get_number_slots();
        if !slot.in_range(num_slots) {
            return Err(BootControlError::invalid_slot(slot, num_slots));
        }
        slot.suffix()
            .ok_or_else(|| BootControlError::invalid_slot(slot, num_slots))
    }

    /// Consume one boot attempt on the active slot, as the bootloader would
    pub fn record_boot_attempt(&self) -> BootControlResult<BootAttempt> {
        let attempt = self.transact(|m, state| m.record_boot_attempt(state))?;
        log_event_with_fields(
            Event::BootAttempt,
            &[
                ("retries_left", &attempt.retries_left.to_string()),
                ("slot", &attempt.slot.to_string()),
            ],
        );
        if attempt.demoted {
            log_event_with_fields(Event::SlotDemoted, &[("slot", &attempt.slot.to_string())]);
        }
        Ok(attempt)
    }

    /// Copy of the committed state
    pub fn snapshot(&self) -> BootControlState {
        self.read().clone()
    }

    pub fn check_invariants(&self) -> Vec<InvariantViolation> {
        self.machine.check_invariants(&self.read())
    }

    fn read(&self) -> RwLockReadGuard<'_, BootControlState> {
        self.committed.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> MutexGuard<'_, Transaction<S>> {
        self.txn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: BootControlState) {
        *self.committed.write().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Reload, compute, commit, publish.
    ///
    /// An unchanged state is not rewritten unless an earlier commit failed,
    /// since a failed commit may have landed on the medium anyway.
    fn transact<T>(
        &self,
        step: impl FnOnce(
            &SlotStateMachine,
            &BootControlState,
        ) -> BootControlResult<(BootControlState, T)>,
    ) -> BootControlResult<T> {
        let mut txn = self.lock();
        let Transaction { store, dirty } = &mut *txn;

        let (next, out) = with_store_lock(store, |store| {
            let current = self.reload(store, dirty)?;
            let (next, out) = step(&self.machine, &current)?;

            if next != current || *dirty {
                match self.retry.run("commit", || store.commit(next.table())) {
                    Ok(()) => *dirty = false,
                    Err(e) => {
                        *dirty = true;
                        return Err(e.into());
                    }
                }
            }
            Ok((next, out))
        })?;

        self.publish(next);
        Ok(out)
    }

    /// Latest committed state on the medium, which another process may have
    /// changed since our last look.
    ///
    /// If the medium no longer holds a valid record, the transaction starts
    /// from our own snapshot and the store is marked dirty so it gets written.
    fn reload(&self, store: &mut S, dirty: &mut bool) -> BootControlResult<BootControlState> {
        let snapshot = self.snapshot();
        match self.retry.run("load", || store.load()) {
            Ok(table) => Ok(snapshot.with_table(table)),
            Err(e) if e.is_recoverable_at_load() => {
                log_event_with_fields(Event::StoreCorrupt, &[("reason", &e.to_string())]);
                *dirty = true;
                Ok(snapshot)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Run `f` holding the store lock; the lock is released on every path.
fn with_store_lock<S: MetadataStore, T>(
    store: &mut S,
    f: impl FnOnce(&mut S) -> BootControlResult<T>,
) -> BootControlResult<T> {
    store.lock()?;
    let result = f(store);
    store.unlock();
    result
}

fn load_or_recover<S: MetadataStore>(
    store: &mut S,
    machine: &SlotStateMachine,
    retry: &RetryPolicy,
    num_slots: usize,
    current_slot: Slot,
) -> BootControlResult<BootControlState> {
    match retry.run("load", || store.load()) {
        Ok(table) => {
            log_event_with_fields(
                Event::StoreLoaded,
                &[("num_slots", &table.len().to_string())],
            );
            Ok(BootControlState::new(table, current_slot))
        }
        Err(e) if e.is_recoverable_at_load() => {
            match &e {
                StorageError::Corrupt { reason } => {
                    log_event_with_fields(Event::StoreCorrupt, &[("reason", reason)])
                }
                _ => log_event(Event::StoreUninitialized),
            }
            let fallback = machine.fallback_state(num_slots, current_slot)?;
            retry.run("commit", || store.commit(fallback.table()))?;
            log_event_with_fields(
                Event::FallbackCommitted,
                &[("current_slot", &current_slot.to_string())],
            );
            Ok(fallback)
        }
        Err(e) => Err(e.into()),
    }
}

fn check_partition_layout(dir: &std::path::Path, num_slots: usize) {
    match PartitionLayout::scan(dir) {
        Ok(layout) => {
            for mismatch in layout.check(num_slots) {
                log_event_with_fields(
                    Event::PartitionLayoutMismatch,
                    &[("detail", &mismatch.to_string())],
                );
            }
        }
        Err(e) => log_event_with_fields(
            Event::PartitionLayoutMismatch,
            &[
                ("dir", &dir.display().to_string()),
                ("error", &e.to_string()),
            ],
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boot::MAX_PRIORITY;
    use crate::metadata::{BankedStore, MemoryMedium, MetadataStore};
    use std::sync::Arc;
    use std::thread;

    fn open(medium: &MemoryMedium, current: u32) -> BootControl<BankedStore<MemoryMedium>> {
        let store = BankedStore::new(medium.clone(), 2);
        let options = ServiceOptions::new(2, Slot::new(current)).with_retry(RetryPolicy::none());
        BootControl::open(store, options).unwrap()
    }

    #[test]
    fn test_open_blank_store_commits_fallback() {
        let medium = MemoryMedium::new();
        let control = open(&medium, 1);
        assert_eq!(control.get_active_boot_slot().unwrap(), Slot::new(1));
        assert!(control.is_slot_marked_successful(Slot::new(1)).unwrap());
        assert!(!control.is_slot_bootable(Slot::new(0)).unwrap());
        assert_eq!(medium.write_count(), 1);

        // Reopening reads the fallback back instead of writing it again
        let reopened = open(&medium, 1);
        assert_eq!(reopened.snapshot(), control.snapshot());
        assert_eq!(medium.write_count(), 1);
    }

    #[test]
    fn test_open_rejects_current_out_of_range() {
        let store = BankedStore::new(MemoryMedium::new(), 2);
        let result = BootControl::open(store, ServiceOptions::new(2, Slot::new(3)));
        assert!(matches!(result, Err(BootControlError::InvalidSlot { .. })));
    }

    #[test]
    fn test_open_rejects_unsupported_slot_count() {
        for num_slots in [0, MAX_SLOTS + 1] {
            let medium = MemoryMedium::new();
            let store = BankedStore::new(medium.clone(), num_slots);
            let result = BootControl::open(store, ServiceOptions::new(num_slots, Slot::new(0)));
            assert!(matches!(
                result,
                Err(BootControlError::UnsupportedSlotCount { .. })
            ));
            assert_eq!(medium.write_count(), 0);
        }
    }

    #[test]
    fn test_two_services_serialize_through_the_store() {
        let medium = MemoryMedium::new();
        let first = open(&medium, 0);
        let second = open(&medium, 0);

        first.set_active_boot_slot(Slot::new(1)).unwrap();
        second.set_slot_as_unbootable(Slot::new(0)).unwrap();

        // The second mutation applied on top of the first, not over it
        assert_eq!(second.get_active_boot_slot().unwrap(), Slot::new(1));
        let reopened = open(&medium, 0);
        assert_eq!(reopened.get_active_boot_slot().unwrap(), Slot::new(1));
        assert!(!reopened.is_slot_bootable(Slot::new(0)).unwrap());
        assert!(reopened.check_invariants().is_empty());
    }

    #[test]
    fn test_services_on_threads_never_lose_commits() {
        let medium = MemoryMedium::new();
        open(&medium, 0);

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let control = open(&medium, 0);
                thread::spawn(move || {
                    for round in 0..10 {
                        control.set_active_boot_slot(Slot::new((i + round) % 2)).unwrap();
                        control.record_boot_attempt().unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // Each write that landed carried a fresh generation
        let mut store = BankedStore::new(medium.clone(), 2);
        store.load().unwrap();
        assert_eq!(store.generation(), Some(medium.write_count() as u64));
    }

    #[test]
    fn test_set_active_persists() {
        let medium = MemoryMedium::new();
        let control = open(&medium, 0);
        control.set_active_boot_slot(Slot::new(1)).unwrap();

        let reopened = open(&medium, 0);
        assert_eq!(reopened.get_active_boot_slot().unwrap(), Slot::new(1));
        let meta = *reopened.snapshot().slot(Slot::new(1)).unwrap();
        assert_eq!(meta.priority, MAX_PRIORITY);
    }

    #[test]
    fn test_invalid_slot_leaves_state_untouched() {
        let medium = MemoryMedium::new();
        let control = open(&medium, 0);
        let before = control.snapshot();
        let writes = medium.write_count();

        assert!(control.set_active_boot_slot(Slot::new(2)).unwrap_err().is_invalid_slot());
        assert!(control.set_slot_as_unbootable(Slot::new(9)).unwrap_err().is_invalid_slot());
        assert!(control.is_slot_bootable(Slot::new(2)).is_err());
        assert!(control.get_suffix(Slot::new(2)).is_err());

        assert_eq!(control.snapshot(), before);
        assert_eq!(medium.write_count(), writes);
    }

    #[test]
    fn test_unchanged_state_not_rewritten() {
        let medium = MemoryMedium::new();
        let control = open(&medium, 0);
        let writes = medium.write_count();
        control.mark_boot_successful().unwrap();
        control.mark_boot_successful().unwrap();
        assert_eq!(medium.write_count(), writes);
    }

    #[test]
    fn test_failed_commit_keeps_snapshot() {
        let medium = MemoryMedium::new();
        let control = open(&medium, 0);
        let before = control.snapshot();

        medium.fail_next_writes(1);
        let err = control.set_active_boot_slot(Slot::new(1)).unwrap_err();
        assert_eq!(err.code(), "BOOTCTL_STORAGE_IO_FAILURE");
        assert_eq!(control.snapshot(), before);
        assert_eq!(control.get_active_boot_slot().unwrap(), Slot::new(0));

        // Dirty store: even an unchanged state is written again
        let writes = medium.write_count();
        control.mark_boot_successful().unwrap();
        assert_eq!(medium.write_count(), writes + 1);
    }

    #[test]
    fn test_get_suffix() {
        let control = open(&MemoryMedium::new(), 0);
        assert_eq!(control.get_suffix(Slot::new(0)).unwrap(), "_a");
        assert_eq!(control.get_suffix(Slot::new(1)).unwrap(), "_b");
    }

    #[test]
    fn test_concurrent_mutations_serialize() {
        let medium = MemoryMedium::new();
        let control = Arc::new(open(&medium, 0));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let control = Arc::clone(&control);
                thread::spawn(move || {
                    control.set_active_boot_slot(Slot::new(i % 2)).unwrap();
                    control.get_active_boot_slot().unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(control.check_invariants().is_empty());
        let reopened = open(&medium, 0);
        assert_eq!(reopened.snapshot().table(), control.snapshot().table());
    }
}
