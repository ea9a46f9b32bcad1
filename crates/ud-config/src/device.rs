//! Emulated device configuration
//!
//! Covers the `device:` section of a configuration file plus the string
//! forms accepted on the command line (`--dev-id 0x1234:0x5678`,
//! `--quirks -libinput`, `--settle-time 0.2`).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use ud_core::{is_valid_delay, parse_c_integer, parse_float, parse_seconds, MAX_SLEEP_SEC, MIN_SLEEP_SEC};

use crate::error::{ConfigError, ConfigResult};

/// Longest device name the kernel accepts, excluding the terminator.
pub const MAX_DEVICE_NAME: usize = 79;

pub const DEFAULT_DEVICE_PATH: &str = "/dev/uinput";
pub const DEFAULT_DEVICE_NAME: &str = "udotool";
pub const DEFAULT_SETTLE_TIME: f64 = 0.5;
pub const DEFAULT_KEY_DELAY: f64 = 0.05;

/// Vendor, product and version reported by the emulated device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceId {
    #[serde(default)]
    pub vendor: u16,
    #[serde(default)]
    pub product: u16,
    #[serde(default)]
    pub version: u16,
}

impl DeviceId {
    /// Parse `vendor[:product[:version]]`; each part accepts decimal, `0x` or octal.
    pub fn parse(text: &str) -> ConfigResult<Self> {
        let parts: Vec<&str> = text.split(':').collect();
        if parts.len() > 3 {
            return Err(ConfigError::invalid("device id", format!("too many parts in '{text}'")));
        }
        let mut values = [0u16; 3];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = parse_c_integer(part)
                .and_then(|v| u16::try_from(v).ok())
                .ok_or_else(|| ConfigError::invalid("device id", format!("bad component '{part}'")))?;
        }
        Ok(Self {
            vendor: values[0],
            product: values[1],
            version: values[2],
        })
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:04X}:0x{:04X}:0x{:04X}", self.vendor, self.product, self.version)
    }
}

/// Workarounds for consumers of the emulated device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quirks {
    /// Hide digitizer tool buttons so libinput does not classify the device as a tablet
    #[serde(default = "default_true")]
    pub libinput: bool,
}

impl Default for Quirks {
    fn default() -> Self {
        Self { libinput: true }
    }
}

impl Quirks {
    /// Apply a comma-separated list such as `libinput` or `-libinput`.
    pub fn apply(&mut self, list: &str) -> ConfigResult<()> {
        for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (name, enable) = match item.strip_prefix('-') {
                Some(name) => (name, false),
                None => (item.strip_prefix('+').unwrap_or(item), true),
            };
            match name {
                "libinput" => self.libinput = enable,
                _ => return Err(ConfigError::invalid("quirks", format!("unknown quirk '{name}'"))),
            }
        }
        Ok(())
    }
}

/// Emulated device configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Path of the uinput control node
    #[serde(default = "default_path")]
    pub path: PathBuf,

    /// Name reported by the emulated device
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default)]
    pub id: DeviceId,

    /// Seconds to wait after creating the device; zero disables the wait
    #[serde(default = "default_settle_time")]
    pub settle_time: f64,

    /// Default pause between repetitions of the `key` command
    #[serde(default = "default_key_delay")]
    pub key_delay: f64,

    #[serde(default)]
    pub quirks: Quirks,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            name: default_name(),
            id: DeviceId::default(),
            settle_time: DEFAULT_SETTLE_TIME,
            key_delay: DEFAULT_KEY_DELAY,
            quirks: Quirks::default(),
        }
    }
}

impl DeviceConfig {
    /// Check limits that serde cannot express
    pub fn validate(&self) -> ConfigResult<()> {
        if self.name.is_empty() || self.name.len() > MAX_DEVICE_NAME {
            return Err(ConfigError::invalid(
                "name",
                format!("must be 1..={MAX_DEVICE_NAME} bytes, got {}", self.name.len()),
            ));
        }
        if self.settle_time != 0.0 && !is_valid_delay(self.settle_time) {
            return Err(ConfigError::invalid(
                "settle_time",
                format!("{} is outside ({MIN_SLEEP_SEC}, {MAX_SLEEP_SEC}]", self.settle_time),
            ));
        }
        if !is_valid_delay(self.key_delay) {
            return Err(ConfigError::invalid(
                "key_delay",
                format!("{} is outside ({MIN_SLEEP_SEC}, {MAX_SLEEP_SEC}]", self.key_delay),
            ));
        }
        Ok(())
    }

    /// Parse and set the settle time from text; `0` disables the wait
    pub fn set_settle_time(&mut self, text: &str) -> ConfigResult<()> {
        self.settle_time = parse_seconds(text)
            .or_else(|| parse_float(text).filter(|&v| v == 0.0))
            .ok_or_else(|| ConfigError::invalid("settle_time", format!("bad delay '{text}'")))?;
        Ok(())
    }

    /// Parse and set the key delay from text
    pub fn set_key_delay(&mut self, text: &str) -> ConfigResult<()> {
        self.key_delay = parse_seconds(text)
            .ok_or_else(|| ConfigError::invalid("key_delay", format!("bad delay '{text}'")))?;
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_path() -> PathBuf {
    PathBuf::from(DEFAULT_DEVICE_PATH)
}

fn default_name() -> String {
    DEFAULT_DEVICE_NAME.to_string()
}

fn default_settle_time() -> f64 {
    DEFAULT_SETTLE_TIME
}

fn default_key_delay() -> f64 {
    DEFAULT_KEY_DELAY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_id_parse() {
        let id = DeviceId::parse("0x046d:0xc52b:3").unwrap();
        assert_eq!(id, DeviceId { vendor: 0x046d, product: 0xc52b, version: 3 });

        let id = DeviceId::parse("12").unwrap();
        assert_eq!(id, DeviceId { vendor: 12, product: 0, version: 0 });
    }

    #[test]
    fn test_device_id_rejects_bad_input() {
        assert!(DeviceId::parse("0x10000").is_err());
        assert!(DeviceId::parse("1:2:3:4").is_err());
        assert!(DeviceId::parse("1::3").is_err());
        assert!(DeviceId::parse("abc").is_err());
    }

    #[test]
    fn test_device_id_display() {
        let id = DeviceId { vendor: 0x1, product: 0xab, version: 0 };
        assert_eq!(id.to_string(), "0x0001:0x00AB:0x0000");
    }

    #[test]
    fn test_quirks_apply() {
        let mut quirks = Quirks::default();
        quirks.apply("-libinput").unwrap();
        assert!(!quirks.libinput);
        quirks.apply("libinput").unwrap();
        assert!(quirks.libinput);
        assert!(quirks.apply("wacom").is_err());
    }

    #[test]
    fn test_validate_name_length() {
        let mut config = DeviceConfig::default();
        assert!(config.validate().is_ok());
        config.name = "x".repeat(MAX_DEVICE_NAME + 1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_settle_time_is_allowed() {
        let config = DeviceConfig {
            settle_time: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_set_settle_time_bounds() {
        let mut config = DeviceConfig::default();
        config.set_settle_time("0.25").unwrap();
        assert_eq!(config.settle_time, 0.25);
        config.set_settle_time("0").unwrap();
        assert_eq!(config.settle_time, 0.0);
        assert!(config.set_settle_time("-1").is_err());
        assert!(config.set_settle_time("100000").is_err());
    }
}
