//! Partition layout consistency
//!
//! Slotted partitions are named `<base><suffix>` (`boot_a`, `vendor_b`). A
//! device provisioned with N slots should carry every slotted base name for
//! each of the first N suffixes and for no others. Mismatches are reported,
//! never fatal: the slot table stays authoritative.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use crate::slot::Slot;

/// Slotted partition base names found on a device, with the slots present
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PartitionLayout {
    bases: BTreeMap<String, BTreeSet<Slot>>,
}

/// One base name whose slot copies disagree with the slot count
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutMismatch {
    pub base: String,
    /// In-range slots with no partition
    pub missing: Vec<Slot>,
    /// Partitions for slots past the slot count
    pub unexpected: Vec<Slot>,
}

impl fmt::Display for LayoutMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.base)?;
        for slot in &self.missing {
            write!(f, " missing slot {}", slot)?;
        }
        for slot in &self.unexpected {
            write!(f, " unexpected slot {}", slot)?;
        }
        Ok(())
    }
}

/// Split `name` into base name and slot, if it carries a slot suffix
fn split_slotted(name: &str) -> Option<(&str, Slot)> {
    let cut = name.rfind('_')?;
    let (base, suffix) = name.split_at(cut);
    if base.is_empty() || suffix.len() != 2 {
        return None;
    }
    Slot::from_suffix(suffix).map(|slot| (base, slot))
}

impl PartitionLayout {
    /// Build a layout from partition names; unslotted names are ignored
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut bases: BTreeMap<String, BTreeSet<Slot>> = BTreeMap::new();
        for name in names {
            if let Some((base, slot)) = split_slotted(name.as_ref()) {
                bases.entry(base.to_string()).or_default().insert(slot);
            }
        }
        Self { bases }
    }

    /// Read partition names from a by-name directory
    pub fn scan(dir: &Path) -> io::Result<Self> {
        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        Ok(Self::from_names(names))
    }

    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    /// Slots present for `base`
    pub fn slots_for(&self, base: &str) -> Option<&BTreeSet<Slot>> {
        self.bases.get(base)
    }

    /// Every base whose slot copies do not match `num_slots`
    pub fn check(&self, num_slots: usize) -> Vec<LayoutMismatch> {
        self.bases
            .iter()
            .filter_map(|(base, present)| {
                let missing: Vec<Slot> = (0..num_slots as u32)
                    .map(Slot::new)
                    .filter(|s| !present.contains(s))
                    .collect();
                let unexpected: Vec<Slot> = present
                    .iter()
                    .copied()
                    .filter(|s| !s.in_range(num_slots))
                    .collect();
                if missing.is_empty() && unexpected.is_empty() {
                    None
                } else {
                    Some(LayoutMismatch {
                        base: base.clone(),
                        missing,
                        unexpected,
                    })
                }
            })
            .collect()
    }
}
