//! Crash point injection for durability testing
//!
//! Set `BOOTCTL_CRASH_POINT` to one of the names in [`points`] and the
//! process aborts when it reaches that point: no cleanup, no unwinding.
//! Crash tests run the real binary this way and then check what a fresh
//! process loads.
//!
//! ```bash
//! BOOTCTL_CRASH_POINT=store_after_write bootctl set-active-boot-slot 1
//! ```

use std::sync::OnceLock;

/// Environment variable naming the crash point
pub const CRASH_POINT_ENV: &str = "BOOTCTL_CRASH_POINT";

static CRASH_POINT: OnceLock<Option<String>> = OnceLock::new();

#[inline]
fn get_crash_point() -> Option<&'static str> {
    CRASH_POINT
        .get_or_init(|| std::env::var(CRASH_POINT_ENV).ok())
        .as_deref()
}

/// Whether `BOOTCTL_CRASH_POINT` equals `name`
#[inline]
pub fn crash_point_enabled(name: &str) -> bool {
    get_crash_point().map(|p| p == name).unwrap_or(false)
}

/// Abort the process if the named crash point is enabled.
///
/// No-op when `BOOTCTL_CRASH_POINT` is unset or names another point.
#[inline]
pub fn maybe_crash(name: &str) {
    if crash_point_enabled(name) {
        eprintln!("[CRASH] Triggering crash at point: {}", name);
        std::process::abort();
    }
}

/// All defined crash point names
pub mod points {
    /// Commit computed, nothing written
    pub const STORE_BEFORE_WRITE: &str = "store_before_write";
    /// Bank written, not yet synced
    pub const STORE_AFTER_WRITE: &str = "store_after_write";
    /// Bank synced, commit not yet acknowledged
    pub const STORE_AFTER_SYNC: &str = "store_after_sync";

    pub fn all() -> &'static [&'static str] {
        &[STORE_BEFORE_WRITE, STORE_AFTER_WRITE, STORE_AFTER_SYNC]
    }
}
