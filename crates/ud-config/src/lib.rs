//! Configuration for udotool
//!
//! Settings come from three layers, lowest priority first: built-in
//! defaults, an optional YAML file, and command-line overrides applied by
//! the binary. The YAML loader understands two custom tags:
//!
//! - `!include path` - Include another YAML file
//! - `!env_var VAR` - Environment variable substitution
//!
//! # Example
//!
//! ```ignore
//! use ud_config::Config;
//!
//! let mut config = Config::load("udotool.yaml")?;
//! config.device.quirks.apply("-libinput")?;
//! config.validate()?;
//! ```

mod device;
mod error;
mod loader;

pub use device::{
    DeviceConfig, DeviceId, Quirks, DEFAULT_DEVICE_NAME, DEFAULT_DEVICE_PATH, DEFAULT_KEY_DELAY,
    DEFAULT_SETTLE_TIME, MAX_DEVICE_NAME,
};
pub use error::{ConfigError, ConfigResult};
pub use loader::{load_yaml, YamlLoader};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Top-level run configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Log events instead of creating a device
    #[serde(default)]
    pub dry_run: bool,

    #[serde(default)]
    pub device: DeviceConfig,
}

impl Config {
    /// Load a configuration file, filling unspecified fields with defaults
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let value = load_yaml(path)?;
        let config: Config = if value.is_null() {
            Config::default()
        } else {
            serde_yaml::from_value(value).map_err(|e| ConfigError::ParseYaml {
                path: PathBuf::from(path),
                source: e,
            })?
        };
        debug!(?path, dry_run = config.dry_run, device = ?config.device.path, "loaded configuration");
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.device.validate()
    }
}
