//! CLI argument definitions using clap
//!
//! Commands:
//! - bootctl get-number-slots
//! - bootctl get-current-slot
//! - bootctl mark-boot-successful
//! - bootctl get-active-boot-slot
//! - bootctl set-active-boot-slot SLOT
//! - bootctl set-slot-as-unbootable SLOT
//! - bootctl is-slot-bootable SLOT
//! - bootctl is-slot-marked-successful SLOT
//! - bootctl get-suffix SLOT
//! - bootctl dump-metadata

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// bootctl - query and change A/B boot slot state
#[derive(Parser, Debug)]
#[command(name = "bootctl")]
#[command(version, about, long_about = None)]
#[command(after_help = "SLOT parameter is the zero-based slot-number.")]
pub struct Cli {
    /// Configuration file (default /etc/bootctl.json when present)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Slot metadata file, overriding the config
    #[arg(long, global = true, value_name = "PATH")]
    pub metadata: Option<PathBuf>,

    /// Running slot, skipping kernel command line detection
    #[arg(long, global = true, value_name = "SLOT")]
    pub current_slot: Option<u32>,

    /// Log more to stderr (-v info, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Prints number of slots
    GetNumberSlots,

    /// Prints currently running SLOT
    GetCurrentSlot,

    /// Mark current slot as GOOD
    MarkBootSuccessful,

    /// Prints the SLOT to load on next boot
    GetActiveBootSlot,

    /// On next boot, load and execute SLOT
    SetActiveBootSlot {
        #[arg(value_name = "SLOT")]
        slot: u32,
    },

    /// Mark SLOT as invalid
    SetSlotAsUnbootable {
        #[arg(value_name = "SLOT")]
        slot: u32,
    },

    /// Returns 0 only if SLOT is bootable
    IsSlotBootable {
        #[arg(value_name = "SLOT")]
        slot: u32,
    },

    /// Returns 0 only if SLOT is marked GOOD
    IsSlotMarkedSuccessful {
        #[arg(value_name = "SLOT")]
        slot: u32,
    },

    /// Prints suffix for SLOT
    GetSuffix {
        #[arg(value_name = "SLOT")]
        slot: u32,
    },

    /// Prints the committed slot metadata as JSON
    DumpMetadata,
}
