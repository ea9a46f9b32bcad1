//! Event ordering and scaling tests for the emission layer

use std::cell::Cell;
use std::io;
use std::rc::Rc;

use ud_config::DeviceConfig;
use ud_core::codes::*;
use ud_device::{Device, DeviceError, DeviceResult, DeviceSetup, EventSink, InputEvent, RecordingSink};

fn setup_device() -> (Device, RecordingSink) {
    let sink = RecordingSink::new();
    let config = DeviceConfig {
        settle_time: 0.0,
        ..Default::default()
    };
    (Device::new(config, Box::new(sink.clone())), sink)
}

fn ev(ev_type: u16, code: u16, value: i32) -> InputEvent {
    InputEvent::new(ev_type, code, value)
}

// ==================== Lifecycle ====================

#[test]
fn test_device_opens_lazily_once() {
    let (mut device, sink) = setup_device();
    assert!(!device.is_open());
    assert!(sink.recording().setups.is_empty());

    device.sync().unwrap();
    device.sync().unwrap();
    device.open().unwrap();

    assert!(device.is_open());
    assert_eq!(sink.recording().setups.len(), 1);
    assert_eq!(device.sysname(), Some("recording0"));
}

#[test]
fn test_close_is_idempotent() {
    let (mut device, sink) = setup_device();
    device.open().unwrap();
    device.close().unwrap();
    device.close().unwrap();
    drop(device);
    assert_eq!(sink.recording().destroyed, 1);
}

#[test]
fn test_close_without_open_does_nothing() {
    let (device, sink) = setup_device();
    drop(device);
    assert_eq!(sink.recording().destroyed, 0);
}

#[test]
fn test_failed_setup_leaves_device_closed() {
    let config = DeviceConfig {
        settle_time: 0.0,
        ..Default::default()
    };
    let mut device = Device::new(config, Box::new(RecordingSink::failing()));
    let err = device.key(BTN_LEFT, true, true).unwrap_err();
    assert!(matches!(err, DeviceError::Setup { .. }));
    assert!(err.is_fatal());
    assert!(!device.is_open());
}

/// Sink whose `destroy` always fails
struct StubbornSink {
    destroy_calls: Rc<Cell<usize>>,
}

impl EventSink for StubbornSink {
    fn create(&mut self, _setup: &DeviceSetup) -> DeviceResult<Option<String>> {
        Ok(None)
    }

    fn emit(&mut self, _event: InputEvent) -> DeviceResult<()> {
        Ok(())
    }

    fn destroy(&mut self) -> DeviceResult<()> {
        self.destroy_calls.set(self.destroy_calls.get() + 1);
        Err(DeviceError::Io(io::Error::from(io::ErrorKind::BrokenPipe)))
    }
}

#[test]
fn test_failed_settle_destroys_device() {
    let destroy_calls = Rc::new(Cell::new(0));
    // Too long to hand to the kernel, so the settle wait fails
    let config = DeviceConfig {
        settle_time: 1e30,
        ..Default::default()
    };
    let sink = StubbornSink {
        destroy_calls: destroy_calls.clone(),
    };
    let mut device = Device::new(config, Box::new(sink));

    let err = device.open().unwrap_err();
    assert!(matches!(err, DeviceError::Setup { .. }), "{err}");
    assert!(!device.is_open());
    assert_eq!(destroy_calls.get(), 1);

    // Nothing left to destroy on drop
    drop(device);
    assert_eq!(destroy_calls.get(), 1);
}

// ==================== Keys ====================

#[test]
fn test_key_press_with_sync() {
    let (mut device, sink) = setup_device();
    device.key(30, true, true).unwrap();
    device.key(30, false, false).unwrap();
    assert_eq!(
        sink.events(),
        vec![ev(EV_KEY, 30, 1), ev(EV_SYN, SYN_REPORT, 0), ev(EV_KEY, 30, 0)]
    );
}

// ==================== Relative axes ====================

#[test]
fn test_wheel_emits_hires_before_sync() {
    let (mut device, sink) = setup_device();
    device.rel(REL_WHEEL, 1.0, true).unwrap();
    assert_eq!(
        sink.events(),
        vec![
            ev(EV_REL, REL_WHEEL, 1),
            ev(EV_REL, REL_WHEEL_HI_RES, 120),
            ev(EV_SYN, SYN_REPORT, 0),
        ]
    );
}

#[test]
fn test_fractional_wheel_truncates_legacy_value() {
    let (mut device, sink) = setup_device();
    device.rel(REL_HWHEEL, -0.5, false).unwrap();
    assert_eq!(
        sink.events(),
        vec![ev(EV_REL, REL_HWHEEL, 0), ev(EV_REL, REL_HWHEEL_HI_RES, -60)]
    );
}

#[test]
fn test_plain_relative_axis_has_no_partner() {
    let (mut device, sink) = setup_device();
    device.rel(REL_X, 12.9, false).unwrap();
    assert_eq!(sink.events(), vec![ev(EV_REL, REL_X, 12)]);
}

// ==================== Absolute axes ====================

#[test]
fn test_abs_scaling() {
    let (mut device, sink) = setup_device();
    device.abs(ABS_X, 25.0, false).unwrap();
    device.abs(ABS_Y, 100.0, false).unwrap();
    device.abs(ABS_Z, 0.0, true).unwrap();
    assert_eq!(
        sink.events(),
        vec![
            ev(EV_ABS, ABS_X, 250_000),
            ev(EV_ABS, ABS_Y, ABS_MAX_VALUE),
            ev(EV_ABS, ABS_Z, 0),
            ev(EV_SYN, SYN_REPORT, 0),
        ]
    );
}

#[test]
fn test_abs_out_of_range() {
    let (mut device, sink) = setup_device();
    let err = device.abs(ABS_X, 100.0001, true).unwrap_err();
    assert!(matches!(err, DeviceError::Range { .. }));
    assert!(!err.is_fatal());
    assert!(device.abs(ABS_X, -0.1, true).is_err());
    assert!(sink.events().is_empty());
}
