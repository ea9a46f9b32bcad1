//! Event sink backends
//!
//! A sink receives the fully resolved device description once and then a
//! stream of primitive events. The [`Device`](crate::Device) wrapper owns
//! ordering, scaling and lazy creation; sinks only deliver.

use std::cell::RefCell;
use std::rc::Rc;
use tracing::info;
use ud_core::codes::event_type_name;

use crate::error::DeviceResult;
use crate::setup::DeviceSetup;

/// A single primitive input event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    pub ev_type: u16,
    pub code: u16,
    pub value: i32,
}

impl InputEvent {
    pub fn new(ev_type: u16, code: u16, value: i32) -> Self {
        Self { ev_type, code, value }
    }
}

impl std::fmt::Display for InputEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} code 0x{:03X} value {}",
            event_type_name(self.ev_type),
            self.code,
            self.value
        )
    }
}

/// Destination for device setup and events
pub trait EventSink {
    /// Create the device described by `setup`; returns the kernel name if known
    fn create(&mut self, setup: &DeviceSetup) -> DeviceResult<Option<String>>;

    fn emit(&mut self, event: InputEvent) -> DeviceResult<()>;

    fn destroy(&mut self) -> DeviceResult<()>;

    /// Whether the consumer needs time to notice a freshly created device
    fn needs_settle(&self) -> bool {
        true
    }
}

/// Sink that logs events instead of creating a device
#[derive(Debug, Default)]
pub struct DryRunSink;

impl EventSink for DryRunSink {
    fn create(&mut self, setup: &DeviceSetup) -> DeviceResult<Option<String>> {
        info!(
            name = %setup.name,
            keys = setup.keys.len(),
            rel_axes = setup.rel_axes.len(),
            abs_axes = setup.abs_axes.len(),
            "[DRY RUN] create device"
        );
        Ok(None)
    }

    fn emit(&mut self, event: InputEvent) -> DeviceResult<()> {
        info!("[DRY RUN] event {}", event);
        Ok(())
    }

    fn destroy(&mut self) -> DeviceResult<()> {
        info!("[DRY RUN] destroy device");
        Ok(())
    }

    fn needs_settle(&self) -> bool {
        false
    }
}

/// Everything a [`RecordingSink`] has observed
#[derive(Debug, Default, Clone)]
pub struct Recording {
    pub setups: Vec<DeviceSetup>,
    pub events: Vec<InputEvent>,
    pub destroyed: usize,
}

/// Sink that records setup and events in memory
///
/// Clones share the same recording, so a test can keep one handle while the
/// device owns the other.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    recording: Rc<RefCell<Recording>>,
    fail_create: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose `create` always fails
    pub fn failing() -> Self {
        Self {
            fail_create: true,
            ..Self::default()
        }
    }

    pub fn recording(&self) -> Recording {
        self.recording.borrow().clone()
    }

    pub fn events(&self) -> Vec<InputEvent> {
        self.recording.borrow().events.clone()
    }

    pub fn clear_events(&self) {
        self.recording.borrow_mut().events.clear();
    }
}

impl EventSink for RecordingSink {
    fn create(&mut self, setup: &DeviceSetup) -> DeviceResult<Option<String>> {
        if self.fail_create {
            return Err(crate::DeviceError::Setup {
                path: "recording".into(),
                reason: "creation refused".to_string(),
            });
        }
        self.recording.borrow_mut().setups.push(setup.clone());
        Ok(Some("recording0".to_string()))
    }

    fn emit(&mut self, event: InputEvent) -> DeviceResult<()> {
        self.recording.borrow_mut().events.push(event);
        Ok(())
    }

    fn destroy(&mut self) -> DeviceResult<()> {
        self.recording.borrow_mut().destroyed += 1;
        Ok(())
    }
}
