//! First-boot crash scenarios
//!
//! The first command on a blank device commits the fallback record before
//! serving anything. A crash anywhere in that commit must leave a device
//! that still comes up with the fallback state.

use crate::crash::harness::Device;
use crate::crash::utils::assert_table_consistent;
use bootctl::crash_point::points;

#[test]
fn test_first_boot_crash_recovers_to_fallback() {
    let reference = Device::new();
    let fallback = reference.dump()["table"].clone();

    for point in points::all() {
        let device = Device::new();
        let result = device.run_with_crash_point(point, &["get-number-slots"]);
        assert!(result.crashed, "expected crash at {}", point);
        assert!(result.stdout.is_empty(), "no output before the fallback is durable");

        let state = device.dump();
        assert_eq!(state["table"], fallback, "crash at {}", point);
        assert_eq!(state["current_slot"], 0);
        assert_table_consistent(&state["table"]);
    }
}

#[test]
fn test_first_boot_without_crash() {
    let device = Device::new();
    let result = device.run(&["get-number-slots"]);
    assert_eq!(result.exit_code(), Some(0), "{}", result.stderr);
    assert_eq!(result.stdout, "2\n");
    assert!(device.metadata.exists());
}
