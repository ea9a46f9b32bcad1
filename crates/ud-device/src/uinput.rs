//! Kernel uinput backend

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::PathBuf;
use tracing::{debug, info, trace};

use crate::error::{DeviceError, DeviceResult};
use crate::setup::DeviceSetup;
use crate::sink::{EventSink, InputEvent};

const UINPUT_MAX_NAME_SIZE: usize = 80;

#[repr(C)]
struct InputId {
    bustype: u16,
    vendor: u16,
    product: u16,
    version: u16,
}

#[repr(C)]
struct UinputSetup {
    id: InputId,
    name: [u8; UINPUT_MAX_NAME_SIZE],
    ff_effects_max: u32,
}

#[repr(C)]
struct InputAbsinfo {
    value: i32,
    minimum: i32,
    maximum: i32,
    fuzz: i32,
    flat: i32,
    resolution: i32,
}

#[repr(C)]
struct UinputAbsSetup {
    code: u16,
    absinfo: InputAbsinfo,
}

#[repr(C)]
struct RawInputEvent {
    time: libc::timeval,
    ev_type: u16,
    code: u16,
    value: i32,
}

const IOC_NONE: u64 = 0;
const IOC_WRITE: u64 = 1;
const IOC_READ: u64 = 2;
const UINPUT_IOCTL_BASE: u64 = b'U' as u64;

const fn ioc(dir: u64, nr: u64, size: usize) -> u64 {
    (dir << 30) | ((size as u64) << 16) | (UINPUT_IOCTL_BASE << 8) | nr
}

const UI_DEV_CREATE: u64 = ioc(IOC_NONE, 1, 0);
const UI_DEV_DESTROY: u64 = ioc(IOC_NONE, 2, 0);
const UI_DEV_SETUP: u64 = ioc(IOC_WRITE, 3, std::mem::size_of::<UinputSetup>());
const UI_ABS_SETUP: u64 = ioc(IOC_WRITE, 4, std::mem::size_of::<UinputAbsSetup>());
const UI_SET_EVBIT: u64 = ioc(IOC_WRITE, 100, std::mem::size_of::<libc::c_int>());
const UI_SET_KEYBIT: u64 = ioc(IOC_WRITE, 101, std::mem::size_of::<libc::c_int>());
const UI_SET_RELBIT: u64 = ioc(IOC_WRITE, 102, std::mem::size_of::<libc::c_int>());
const UI_SET_ABSBIT: u64 = ioc(IOC_WRITE, 103, std::mem::size_of::<libc::c_int>());
const UI_SET_PROPBIT: u64 = ioc(IOC_WRITE, 110, std::mem::size_of::<libc::c_int>());
const UI_GET_VERSION: u64 = ioc(IOC_READ, 45, std::mem::size_of::<libc::c_uint>());
const SYSNAME_LEN: usize = 64;
const UI_GET_SYSNAME: u64 = ioc(IOC_READ, 44, SYSNAME_LEN);

/// Sink writing to a uinput control node such as `/dev/uinput`
#[derive(Debug)]
pub struct UinputSink {
    path: PathBuf,
    file: Option<File>,
}

impl UinputSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    fn setup_error(&self, reason: impl Into<String>) -> DeviceError {
        DeviceError::Setup {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }

    fn ioctl_int(&self, file: &File, name: &str, request: u64, arg: u16) -> DeviceResult<()> {
        trace!(ioctl = name, arg, "uinput ioctl");
        // SAFETY: integer-argument ioctl on an open descriptor.
        let rc = unsafe {
            libc::ioctl(
                file.as_raw_fd(),
                request as libc::Ioctl,
                libc::c_int::from(arg),
            )
        };
        if rc == -1 {
            return Err(self.setup_error(format!("ioctl {name}: {}", io::Error::last_os_error())));
        }
        Ok(())
    }

    fn ioctl_ptr<T>(&self, file: &File, name: &str, request: u64, arg: *mut T) -> DeviceResult<()> {
        trace!(ioctl = name, "uinput ioctl");
        // SAFETY: `arg` points to a live value whose size is encoded in `request`.
        let rc = unsafe { libc::ioctl(file.as_raw_fd(), request as libc::Ioctl, arg) };
        if rc == -1 {
            return Err(self.setup_error(format!("ioctl {name}: {}", io::Error::last_os_error())));
        }
        Ok(())
    }

    fn configure(&self, file: &File, setup: &DeviceSetup) -> DeviceResult<()> {
        for &ev in &setup.event_types {
            self.ioctl_int(file, "UI_SET_EVBIT", UI_SET_EVBIT, ev)?;
        }
        for &prop in &setup.properties {
            self.ioctl_int(file, "UI_SET_PROPBIT", UI_SET_PROPBIT, prop)?;
        }
        for &key in &setup.keys {
            self.ioctl_int(file, "UI_SET_KEYBIT", UI_SET_KEYBIT, key)?;
        }
        for &axis in &setup.rel_axes {
            self.ioctl_int(file, "UI_SET_RELBIT", UI_SET_RELBIT, axis)?;
        }
        for &axis in &setup.abs_axes {
            self.ioctl_int(file, "UI_SET_ABSBIT", UI_SET_ABSBIT, axis)?;
        }
        for &axis in &setup.abs_axes {
            let mut abs = UinputAbsSetup {
                code: axis,
                absinfo: InputAbsinfo {
                    value: 0,
                    minimum: setup.abs_range.minimum,
                    maximum: setup.abs_range.maximum,
                    fuzz: 0,
                    flat: 0,
                    resolution: 0,
                },
            };
            self.ioctl_ptr(file, "UI_ABS_SETUP", UI_ABS_SETUP, &mut abs)?;
        }

        let mut dev = UinputSetup {
            id: InputId {
                bustype: setup.bus,
                vendor: setup.id.vendor,
                product: setup.id.product,
                version: setup.id.version,
            },
            name: [0; UINPUT_MAX_NAME_SIZE],
            ff_effects_max: 0,
        };
        let name = setup.name.as_bytes();
        let len = name.len().min(UINPUT_MAX_NAME_SIZE - 1);
        dev.name[..len].copy_from_slice(&name[..len]);
        self.ioctl_ptr(file, "UI_DEV_SETUP", UI_DEV_SETUP, &mut dev)?;

        self.ioctl_int(file, "UI_DEV_CREATE", UI_DEV_CREATE, 0)
    }

    fn sysname(&self, file: &File) -> Option<String> {
        let mut buf = [0u8; SYSNAME_LEN];
        self.ioctl_ptr(file, "UI_GET_SYSNAME", UI_GET_SYSNAME, buf.as_mut_ptr())
            .ok()?;
        let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        Some(String::from_utf8_lossy(&buf[..end]).into_owned())
    }

    fn protocol_version(&self, file: &File) -> Option<u32> {
        let mut version: libc::c_uint = 0;
        self.ioctl_ptr(file, "UI_GET_VERSION", UI_GET_VERSION, &mut version)
            .ok()?;
        Some(version)
    }
}

impl EventSink for UinputSink {
    fn create(&mut self, setup: &DeviceSetup) -> DeviceResult<Option<String>> {
        debug!(path = ?self.path, name = %setup.name, "opening uinput");
        let file = OpenOptions::new()
            .write(true)
            .custom_flags(libc::O_CLOEXEC)
            .open(&self.path)
            .map_err(|e| self.setup_error(e.to_string()))?;

        // Dropping `file` on failure closes the descriptor.
        self.configure(&file, setup)?;

        let sysname = self.sysname(&file);
        if let Some(version) = self.protocol_version(&file) {
            debug!("uinput protocol version 0x{:04X}", version);
        }
        info!(sysname = ?sysname, name = %setup.name, "created virtual device");
        self.file = Some(file);
        Ok(sysname)
    }

    fn emit(&mut self, event: InputEvent) -> DeviceResult<()> {
        let file = self.file.as_mut().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotConnected, "uinput device is not open")
        })?;

        let mut time = libc::timeval { tv_sec: 0, tv_usec: 0 };
        // SAFETY: `time` is a valid out-parameter; a null timezone is allowed.
        unsafe { libc::gettimeofday(&mut time, std::ptr::null_mut()) };
        let raw = RawInputEvent {
            time,
            ev_type: event.ev_type,
            code: event.code,
            value: event.value,
        };
        // SAFETY: `RawInputEvent` is `repr(C)` plain data; the slice covers exactly its bytes.
        let bytes = unsafe {
            std::slice::from_raw_parts(
                (&raw as *const RawInputEvent).cast::<u8>(),
                std::mem::size_of::<RawInputEvent>(),
            )
        };
        file.write_all(bytes)?;
        Ok(())
    }

    fn destroy(&mut self) -> DeviceResult<()> {
        if let Some(file) = self.file.take() {
            debug!(path = ?self.path, "destroying virtual device");
            self.ioctl_int(&file, "UI_DEV_DESTROY", UI_DEV_DESTROY, 0)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_struct_layouts_match_kernel_abi() {
        assert_eq!(std::mem::size_of::<UinputSetup>(), 92);
        assert_eq!(std::mem::size_of::<UinputAbsSetup>(), 28);
    }

    #[test]
    fn test_ioctl_numbers() {
        assert_eq!(UI_DEV_CREATE, 0x5501);
        assert_eq!(UI_DEV_DESTROY, 0x5502);
        assert_eq!(UI_SET_EVBIT, 0x4004_5564);
        assert_eq!(UI_DEV_SETUP, 0x405c_5503);
        assert_eq!(UI_ABS_SETUP, 0x401c_5504);
        assert_eq!(UI_GET_VERSION, 0x8004_552d);
    }

    #[test]
    fn test_missing_node_is_setup_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut sink = UinputSink::new(dir.path().join("no-such-uinput"));
        let setup = DeviceSetup::from_config(&ud_config::DeviceConfig::default());
        let err = sink.create(&setup).unwrap_err();
        assert!(matches!(err, DeviceError::Setup { .. }));
    }

    #[test]
    fn test_emit_before_create_fails() {
        let mut sink = UinputSink::new("/dev/null");
        assert!(sink.emit(InputEvent::new(0, 0, 0)).is_err());
    }
}
