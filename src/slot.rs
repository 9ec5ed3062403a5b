//! Slot identifiers and suffix mapping
//!
//! A slot is one of a small, fixed set of redundant boot partitions. Partition
//! names carry the slot suffix (`boot_a`, `boot_b`, ...), so the suffix is the
//! only name a slot has outside this crate.

use std::fmt;

use serde::Serialize;

/// Upper bound on the number of slots a device can be provisioned with.
///
/// Bounded by the persisted record layout, which reserves one entry per slot.
pub const MAX_SLOTS: usize = 4;

/// Default slot count for A/B devices
pub const DEFAULT_NUM_SLOTS: usize = 2;

const SUFFIXES: [&str; MAX_SLOTS] = ["_a", "_b", "_c", "_d"];

/// Zero-based slot index.
///
/// Range checking against the provisioned slot count happens at the service
/// boundary, not here: a `Slot` is just the index a caller asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Slot(u32);

impl Slot {
    /// Create a slot from a raw index
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Raw index
    pub const fn index(self) -> u32 {
        self.0
    }

    /// Index as a table position
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Whether this slot exists on a device with `num_slots` slots
    pub fn in_range(self, num_slots: usize) -> bool {
        self.as_usize() < num_slots
    }

    /// Partition-name suffix for this slot (`"_a"` for slot 0).
    ///
    /// Returns `None` past `MAX_SLOTS`; callers check against the provisioned
    /// count themselves.
    pub fn suffix(self) -> Option<&'static str> {
        SUFFIXES.get(self.as_usize()).copied()
    }

    /// Reverse suffix lookup.
    ///
    /// Accepts both `"_b"` and bare `"b"`, the two spellings used on kernel
    /// command lines.
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        let letter = suffix.strip_prefix('_').unwrap_or(suffix);
        SUFFIXES
            .iter()
            .position(|s| &s[1..] == letter)
            .map(|i| Self(i as u32))
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Slot {
    fn from(index: u32) -> Self {
        Self(index)
    }
}

/// Ternary query result kept for callers bound to a fixed enum boundary.
///
/// Native callers use `Result<bool, BootControlError>`; this type exists for
/// the wire values `FALSE = 0`, `TRUE = 1`, `INVALID_SLOT = -1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum BoolResult {
    False = 0,
    True = 1,
    InvalidSlot = -1,
}

impl BoolResult {
    /// Wire value
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl<E> From<Result<bool, E>> for BoolResult {
    fn from(result: Result<bool, E>) -> Self {
        match result {
            Ok(true) => BoolResult::True,
            Ok(false) => BoolResult::False,
            Err(_) => BoolResult::InvalidSlot,
        }
    }
}
