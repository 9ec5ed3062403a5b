//! CLI command implementations
//!
//! Startup sequence for every command:
//! 1. Load configuration and apply flag overrides
//! 2. Set the log filter
//! 3. Resolve the running slot
//! 4. Open the store and the boot control service
//! 5. Run exactly one command against the service

use std::io::Write;
use std::path::Path;

use crate::boot::BootControlResult;
use crate::config::{Config, DEFAULT_CONFIG_PATH};
use crate::metadata::{FileStore, MetadataStore};
use crate::observability::{Logger, Severity};
use crate::service::{current_slot, BootControl, ServiceOptions};
use crate::slot::Slot;

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};

/// Config file plus command line overrides, validated once both apply
pub fn load_config(cli: &Cli) -> CliResult<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(Path::new(DEFAULT_CONFIG_PATH))?,
    };

    if let Some(path) = &cli.metadata {
        config.metadata_path = path.clone();
    }
    if let Some(slot) = cli.current_slot {
        config.current_slot = Some(slot);
    }

    config.validate()?;
    Ok(config)
}

/// Log filter from the config, lowered by each `-v`
pub fn log_severity(config: &Config, verbose: u8) -> Severity {
    let configured = config.log_severity();
    match verbose {
        0 => configured,
        1 => configured.min(Severity::Info),
        _ => Severity::Trace,
    }
}

/// Resolve the running slot and open the service over the metadata file
pub fn open_service(config: &Config) -> CliResult<BootControl<FileStore>> {
    let open = || -> BootControlResult<BootControl<FileStore>> {
        let current = current_slot::detect(config.current_slot, &config.cmdline_path)?;
        let store = FileStore::open_path(&config.metadata_path, config.num_slots);

        let mut options = ServiceOptions::new(config.num_slots, current)
            .with_max_retries(config.max_retries)
            .with_retry(config.retry_policy());
        if let Some(dir) = &config.partition_dir {
            options = options.with_partition_dir(dir);
        }

        BootControl::open(store, options)
    };
    open().map_err(|e| CliError::command_failed("opening boot control", e))
}

/// Parse-independent entry: configure, open, run
pub fn execute<W: Write>(cli: &Cli, out: &mut W) -> CliResult<()> {
    let config = load_config(cli)?;
    Logger::set_min_severity(log_severity(&config, cli.verbose));
    let control = open_service(&config)?;
    run_command(&control, cli.command, out)
}

/// Run one command against an open service, writing its output to `out`
pub fn run_command<S, W>(control: &BootControl<S>, command: Command, out: &mut W) -> CliResult<()>
where
    S: MetadataStore,
    W: Write,
{
    match command {
        Command::GetNumberSlots => {
            writeln!(out, "{}", control.get_number_slots())?;
        }
        Command::GetCurrentSlot => {
            writeln!(out, "{}", control.get_current_slot())?;
        }
        Command::MarkBootSuccessful => {
            control
                .mark_boot_successful()
                .map_err(|e| CliError::command_failed("marking as having booted successfully", e))?;
        }
        Command::GetActiveBootSlot => {
            let slot = control
                .get_active_boot_slot()
                .map_err(|e| CliError::command_failed("getting active boot slot", e))?;
            writeln!(out, "{}", slot)?;
        }
        Command::SetActiveBootSlot { slot } => {
            control
                .set_active_boot_slot(Slot::new(slot))
                .map_err(|e| CliError::command_failed("setting active boot slot", e))?;
        }
        Command::SetSlotAsUnbootable { slot } => {
            control
                .set_slot_as_unbootable(Slot::new(slot))
                .map_err(|e| CliError::command_failed("setting slot as unbootable", e))?;
        }
        Command::IsSlotBootable { slot } => {
            check(
                control.is_slot_bootable(Slot::new(slot)),
                "checking whether slot is bootable",
            )?;
        }
        Command::IsSlotMarkedSuccessful { slot } => {
            check(
                control.is_slot_marked_successful(Slot::new(slot)),
                "checking whether slot is marked successful",
            )?;
        }
        Command::GetSuffix { slot } => {
            let suffix = control
                .get_suffix(Slot::new(slot))
                .map_err(|e| CliError::command_failed("getting suffix", e))?;
            writeln!(out, "{}", suffix)?;
        }
        Command::DumpMetadata => {
            let json = serde_json::to_string_pretty(&control.snapshot())?;
            writeln!(out, "{}", json)?;
        }
    }
    Ok(())
}

/// True is success; false and errors both fail, only errors print
fn check(result: BootControlResult<bool>, doing: &str) -> CliResult<()> {
    match result {
        Ok(true) => Ok(()),
        Ok(false) => Err(CliError::check_false()),
        Err(e) => Err(CliError::command_failed(doing, e)),
    }
}
