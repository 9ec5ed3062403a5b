//! Commit crash scenarios
//!
//! - Crash before write → old state
//! - Crash after write, before sync → old or new
//! - Crash after sync → new state
//! - Every crash leaves a device that keeps working

use crate::crash::harness::Device;
use crate::crash::utils::{assert_old_or_new, assert_table_consistent, expected_after};
use bootctl::crash_point::points;
use serde_json::Value;

const ACTIVATE_SLOT_1: [&str; 2] = ["set-active-boot-slot", "1"];

/// Device that has booted once, so a committed record exists
fn provisioned_device() -> Device {
    let device = Device::new();
    let result = device.run(&["get-active-boot-slot"]);
    assert_eq!(result.exit_code(), Some(0), "{}", result.stderr);
    assert_eq!(result.stdout, "0\n");
    device
}

/// `(old, new, actual)` tables around a crash at `crash_point`
fn crash_and_check(crash_point: &str, args: &[&str]) -> (Value, Value, Value) {
    let device = provisioned_device();
    let old = device.dump()["table"].clone();
    let new = expected_after(&device, args);
    assert_ne!(old, new, "command must change state for the scenario to mean anything");

    let result = device.run_with_crash_point(crash_point, args);
    assert!(result.crashed, "expected crash at {}: {:?}", crash_point, result);

    let actual = device.dump()["table"].clone();
    assert_old_or_new(crash_point, &args.join(" "), &old, &new, &actual);
    assert_table_consistent(&actual);
    (old, new, actual)
}

#[test]
fn test_set_active_crash_before_write_keeps_old() {
    let (old, _, actual) = crash_and_check(points::STORE_BEFORE_WRITE, &ACTIVATE_SLOT_1);
    assert_eq!(actual, old);
}

#[test]
fn test_set_active_crash_after_write_is_old_or_new() {
    crash_and_check(points::STORE_AFTER_WRITE, &ACTIVATE_SLOT_1);
}

#[test]
fn test_set_active_crash_after_sync_keeps_new() {
    let (_, new, actual) = crash_and_check(points::STORE_AFTER_SYNC, &ACTIVATE_SLOT_1);
    assert_eq!(actual, new);
}

#[test]
fn test_set_unbootable_crash_points() {
    for point in points::all() {
        let device = provisioned_device();
        let setup = device.run(&["set-active-boot-slot", "1"]);
        assert_eq!(setup.exit_code(), Some(0), "{}", setup.stderr);

        let args = ["set-slot-as-unbootable", "1"];
        let old = device.dump()["table"].clone();
        let new = expected_after(&device, &args);

        let result = device.run_with_crash_point(point, &args);
        assert!(result.crashed, "expected crash at {}", point);

        let actual = device.dump()["table"].clone();
        assert_old_or_new(point, "set-slot-as-unbootable 1", &old, &new, &actual);
        assert_table_consistent(&actual);
    }
}

#[test]
fn test_device_usable_after_crash() {
    let device = provisioned_device();
    let result = device.run_with_crash_point(points::STORE_AFTER_WRITE, &ACTIVATE_SLOT_1);
    assert!(result.crashed);

    let result = device.run(&["set-active-boot-slot", "1"]);
    assert_eq!(result.exit_code(), Some(0), "{}", result.stderr);
    let result = device.run(&["get-active-boot-slot"]);
    assert_eq!(result.stdout, "1\n");
}

#[test]
fn test_queries_never_hit_crash_points() {
    let device = provisioned_device();
    for point in points::all() {
        let result = device.run_with_crash_point(point, &["is-slot-bootable", "0"]);
        assert!(!result.crashed, "query crashed at {}", point);
        assert_eq!(result.exit_code(), Some(0));
    }
}
