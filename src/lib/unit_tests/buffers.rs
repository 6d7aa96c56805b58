// SPDX-License-Identifier: Apache-2.0

use crate::{GlobalNetworkInfo, GniBuffers};

fn gni(version: &str) -> GlobalNetworkInfo {
    GlobalNetworkInfo {
        version: version.to_string(),
        ..Default::default()
    }
}

#[test]
fn test_buffers_start_without_applied() {
    let buffers = GniBuffers::new();
    assert!(buffers.applied().is_none());
    assert_eq!(buffers.current_index(), 0);
}

#[test]
fn test_buffers_publish_swaps_slots() {
    let mut buffers = GniBuffers::new();
    buffers.set_current(gni("v1"));
    buffers.publish_applied();

    assert_eq!(buffers.applied_index(), Some(0));
    assert_eq!(buffers.current_index(), 1);
    assert_eq!(buffers.applied().unwrap().version, "v1");
    // The next parse target starts from what was applied
    assert_eq!(buffers.current().version, "v1");

    buffers.set_current(gni("v2"));
    assert_eq!(buffers.applied().unwrap().version, "v1");
    buffers.publish_applied();
    assert_eq!(buffers.applied_index(), Some(1));
    assert_eq!(buffers.current_index(), 0);
    assert_eq!(buffers.applied().unwrap().version, "v2");

    let (current, applied) = buffers.current_and_applied();
    assert!(!std::ptr::eq(current, applied.unwrap()));
}

#[test]
fn test_buffers_invalidate_keeps_current() {
    let mut buffers = GniBuffers::new();
    buffers.set_current(gni("v1"));
    buffers.publish_applied();
    buffers.set_current(gni("v2"));
    buffers.invalidate_applied();

    assert!(buffers.applied().is_none());
    assert_eq!(buffers.current().version, "v2");
    assert_eq!(buffers.current_index(), 1);
}
