#![cfg(target_os = "linux")]

use std::io::Write;
use std::time::{Duration, Instant};

use sandman_hardware::input::{EventDevice, REOPEN_DELAY, event_size};
use sandman_traits::{DeviceNotice, InputSource};

fn key_record(code: u16, value: i32) -> Vec<u8> {
    let mut v = vec![0u8; event_size()];
    let off = std::mem::size_of::<libc::timeval>();
    v[off..off + 2].copy_from_slice(&1u16.to_ne_bytes());
    v[off + 2..off + 4].copy_from_slice(&code.to_ne_bytes());
    v[off + 4..off + 8].copy_from_slice(&value.to_ne_bytes());
    v
}

#[test]
fn missing_device_announces_disconnect_once() {
    let dir = tempfile::tempdir().unwrap();
    let mut dev = EventDevice::new(dir.path().join("event-missing"));
    let t0 = Instant::now();

    assert!(dev.poll(t0).is_empty());
    assert!(!dev.is_connected());
    assert_eq!(dev.take_notice(), Some(DeviceNotice::Disconnected));

    dev.poll(t0 + REOPEN_DELAY + Duration::from_millis(1));
    assert_eq!(dev.take_notice(), None);
}

#[test]
fn reopens_after_delay_and_reads_events() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("event0");
    let mut dev = EventDevice::new(&path);
    let t0 = Instant::now();
    dev.poll(t0);
    assert_eq!(dev.take_notice(), Some(DeviceNotice::Disconnected));

    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(&key_record(288, 1)).unwrap();
    f.write_all(&key_record(288, 0)).unwrap();
    f.flush().unwrap();

    // Too soon: stays closed.
    assert!(dev.poll(t0 + Duration::from_millis(200)).is_empty());
    assert!(!dev.is_connected());

    let events = dev.poll(t0 + REOPEN_DELAY);
    assert!(dev.is_connected());
    assert_eq!(dev.take_notice(), Some(DeviceNotice::Connected));
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].code, 288);
    assert_eq!(events[0].value, 1);
    assert_eq!(events[1].value, 0);
}
