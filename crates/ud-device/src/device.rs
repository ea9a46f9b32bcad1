//! Lazily created virtual device
//!
//! [`Device`] turns high-level requests into ordered primitive events. It
//! creates the device on first use, scales absolute percentages, pairs
//! wheel deltas with their high-resolution partners and frames batches
//! with synchronization events.

use tracing::{debug, trace, warn};
use ud_config::DeviceConfig;
use ud_core::codes::*;
use ud_core::{hires_partner, secs_to_duration, sleep_monotonic};

use crate::error::{DeviceError, DeviceResult};
use crate::setup::DeviceSetup;
use crate::sink::{DryRunSink, EventSink, InputEvent};
use crate::uinput::UinputSink;

/// Emulated input device
pub struct Device {
    config: DeviceConfig,
    sink: Box<dyn EventSink>,
    open: bool,
    sysname: Option<String>,
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("path", &self.config.path)
            .field("name", &self.config.name)
            .field("open", &self.open)
            .field("sysname", &self.sysname)
            .finish()
    }
}

impl Device {
    /// Create a closed device that will deliver to `sink`
    pub fn new(config: DeviceConfig, sink: Box<dyn EventSink>) -> Self {
        Self {
            config,
            sink,
            open: false,
            sysname: None,
        }
    }

    /// Device backed by the kernel uinput node named in `config`
    pub fn uinput(config: DeviceConfig) -> Self {
        let sink = UinputSink::new(config.path.clone());
        Self::new(config, Box::new(sink))
    }

    /// Device that only logs what it would do
    pub fn dry_run(config: DeviceConfig) -> Self {
        Self::new(config, Box::new(DryRunSink))
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Kernel name of the created device, when the backend reports one
    pub fn sysname(&self) -> Option<&str> {
        self.sysname.as_deref()
    }

    /// Create the device if it does not exist yet, then wait for it to settle.
    ///
    /// On failure the device stays closed and a later call retries.
    pub fn open(&mut self) -> DeviceResult<()> {
        if self.open {
            return Ok(());
        }
        let setup = DeviceSetup::from_config(&self.config);
        debug!(
            name = %setup.name,
            id = %setup.id,
            keys = setup.keys.len(),
            libinput_quirk = self.config.quirks.libinput,
            "creating device"
        );
        let sysname = self.sink.create(&setup)?;

        if self.sink.needs_settle() {
            debug!(settle_time = self.config.settle_time, "waiting for device to settle");
            if let Err(e) = sleep_monotonic(secs_to_duration(self.config.settle_time)) {
                if let Err(destroy_err) = self.sink.destroy() {
                    warn!(error = %destroy_err, "failed to destroy device after settle failure");
                }
                return Err(DeviceError::Setup {
                    path: self.config.path.clone(),
                    reason: format!("settle wait failed: {e}"),
                });
            }
        }
        self.sysname = sysname;
        self.open = true;
        Ok(())
    }

    /// Destroy the device if it was created. Safe to call repeatedly.
    pub fn close(&mut self) -> DeviceResult<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        self.sysname = None;
        self.sink.destroy()
    }

    fn emit(&mut self, ev_type: u16, code: u16, value: i32) -> DeviceResult<()> {
        let event = InputEvent::new(ev_type, code, value);
        trace!(%event, "emit");
        self.sink.emit(event)
    }

    /// Emit a synchronization report
    pub fn sync(&mut self) -> DeviceResult<()> {
        self.open()?;
        self.emit(EV_SYN, SYN_REPORT, 0)
    }

    /// Press or release a key, optionally followed by a sync
    pub fn key(&mut self, code: u16, pressed: bool, sync: bool) -> DeviceResult<()> {
        self.open()?;
        let value = if pressed { KEY_PRESS } else { KEY_RELEASE };
        self.emit(EV_KEY, code, value)?;
        if sync {
            self.emit(EV_SYN, SYN_REPORT, 0)?;
        }
        Ok(())
    }

    /// Move a relative axis by `delta`, truncated toward zero.
    ///
    /// Wheel axes also report `delta * factor` on their high-resolution
    /// partner, after the legacy event and before any sync.
    pub fn rel(&mut self, axis: u16, delta: f64, sync: bool) -> DeviceResult<()> {
        self.open()?;
        self.emit(EV_REL, axis, delta as i32)?;
        if let Some(hires) = hires_partner(axis) {
            self.emit(EV_REL, hires.hi, (delta * f64::from(hires.factor)) as i32)?;
        }
        if sync {
            self.emit(EV_SYN, SYN_REPORT, 0)?;
        }
        Ok(())
    }

    /// Set an absolute axis to `percent` of its range
    pub fn abs(&mut self, axis: u16, percent: f64, sync: bool) -> DeviceResult<()> {
        if !(0.0..=100.0).contains(&percent) {
            warn!(axis, percent, "absolute value out of range");
            return Err(DeviceError::Range { axis, value: percent });
        }
        self.open()?;
        let scaled = (f64::from(ABS_MAX_VALUE) * (percent / 100.0)) as i32;
        self.emit(EV_ABS, axis, scaled)?;
        if sync {
            self.emit(EV_SYN, SYN_REPORT, 0)?;
        }
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "failed to destroy device");
        }
    }
}
