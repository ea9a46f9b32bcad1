//! Device error types

use std::path::PathBuf;
use thiserror::Error;

/// Result type for device operations
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Errors raised by the emission layer
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Opening or configuring the virtual device failed
    #[error("device setup failed for {path}: {reason}")]
    Setup { path: PathBuf, reason: String },

    /// Writing an event failed after the device was created
    #[error("device write failed: {0}")]
    Io(#[from] std::io::Error),

    /// Absolute position outside 0..=100 percent
    #[error("absolute value {value} for axis 0x{axis:02X} is out of range 0..100")]
    Range { axis: u16, value: f64 },
}

impl DeviceError {
    /// Setup and I/O failures leave the device unusable
    pub fn is_fatal(&self) -> bool {
        !matches!(self, DeviceError::Range { .. })
    }
}
