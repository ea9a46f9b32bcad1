//! Virtual input device emission
//!
//! The emission layer sits between the script engine and the kernel. The
//! engine asks for keys, relative moves, absolute positions and syncs; the
//! [`Device`] orders, scales and frames them and hands primitive events to an
//! [`EventSink`].
//!
//! # Key Types
//!
//! - [`Device`] - Lazily created device with the high-level primitives
//! - [`EventSink`] - Backend trait receiving setup and events
//! - [`UinputSink`] - Kernel backend writing to `/dev/uinput`
//! - [`DryRunSink`] - Backend that only logs
//! - [`RecordingSink`] - In-memory backend for tests

mod device;
mod error;
mod setup;
mod sink;
mod uinput;

pub use device::Device;
pub use error::{DeviceError, DeviceResult};
pub use setup::{AbsRange, DeviceSetup};
pub use sink::{DryRunSink, EventSink, InputEvent, Recording, RecordingSink};
pub use uinput::UinputSink;
