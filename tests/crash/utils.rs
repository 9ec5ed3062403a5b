//! Crash testing utilities
//!
//! - Computing the post-command state on an uncrashed copy
//! - Old-or-new assertions
//! - Invariant checks on dumped state

use serde_json::Value;

use super::harness::{report_failure, Device};

/// Slot table the device would hold after `args` completes normally
pub fn expected_after(device: &Device, args: &[&str]) -> Value {
    let copy = device.clone_device();
    let result = copy.run(args);
    assert_eq!(result.exit_code(), Some(0), "reference run failed: {}", result.stderr);
    copy.dump()["table"].clone()
}

/// The reloaded table must equal exactly one of the two whole states
pub fn assert_old_or_new(
    crash_point: &str,
    operation: &str,
    old: &Value,
    new: &Value,
    actual: &Value,
) {
    if actual != old && actual != new {
        report_failure(
            crash_point,
            operation,
            &format!("{} or {}", old, new),
            &actual.to_string(),
        );
        panic!("state after crash at {} is neither old nor new", crash_point);
    }
}

/// Exactly one bootable slot holds the top priority, unbootable slots hold 0
pub fn assert_table_consistent(table: &Value) {
    let slots = table.as_array().expect("table must be an array");
    let mut top: Option<u64> = None;
    let mut top_count = 0;

    for slot in slots {
        let priority = slot["priority"].as_u64().unwrap();
        if slot["bootable"] != Value::Bool(true) {
            assert_eq!(priority, 0, "unbootable slot with priority: {}", table);
            continue;
        }
        match top {
            Some(p) if p > priority => {}
            Some(p) if p == priority => top_count += 1,
            _ => {
                top = Some(priority);
                top_count = 1;
            }
        }
    }

    assert!(top.is_some(), "no bootable slot: {}", table);
    assert_eq!(top_count, 1, "duplicate top priority: {}", table);
}
