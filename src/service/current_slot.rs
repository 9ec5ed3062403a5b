//! Running slot detection
//!
//! The bootloader tells the kernel which slot it booted through the kernel
//! command line, as `androidboot.slot_suffix=_b` or `androidboot.slot=b`.
//! When a key appears more than once the last occurrence wins, as it does for
//! the kernel itself.

use std::fs;
use std::path::Path;

use crate::boot::{BootControlError, BootControlResult};
use crate::observability::{log_event_with_fields, Event};
use crate::slot::Slot;

/// Default kernel command line location
pub const DEFAULT_CMDLINE_PATH: &str = "/proc/cmdline";

const SLOT_SUFFIX_KEY: &str = "androidboot.slot_suffix";
const SLOT_KEY: &str = "androidboot.slot";

/// Extract the booted slot from a kernel command line
pub fn parse_cmdline(cmdline: &str) -> Option<Slot> {
    cmdline
        .split_whitespace()
        .filter_map(|arg| arg.split_once('='))
        .filter(|(key, _)| *key == SLOT_SUFFIX_KEY || *key == SLOT_KEY)
        .filter_map(|(_, value)| Slot::from_suffix(value))
        .last()
}

/// Resolve the running slot once at startup.
///
/// An explicit override wins; otherwise the kernel command line at
/// `cmdline_path` is consulted.
pub fn detect(override_slot: Option<u32>, cmdline_path: &Path) -> BootControlResult<Slot> {
    if let Some(index) = override_slot {
        let slot = Slot::new(index);
        log_event_with_fields(
            Event::CurrentSlotDetected,
            &[("slot", &slot.to_string()), ("source", "override")],
        );
        return Ok(slot);
    }

    let cmdline = fs::read_to_string(cmdline_path).map_err(|e| {
        BootControlError::CurrentSlotUnknown(format!(
            "reading {}: {}",
            cmdline_path.display(),
            e
        ))
    })?;

    let slot = parse_cmdline(&cmdline).ok_or_else(|| {
        BootControlError::CurrentSlotUnknown(format!(
            "no {} in {}",
            SLOT_SUFFIX_KEY,
            cmdline_path.display()
        ))
    })?;

    log_event_with_fields(
        Event::CurrentSlotDetected,
        &[
            ("slot", &slot.to_string()),
            ("source", &cmdline_path.display().to_string()),
        ],
    );
    Ok(slot)
}
