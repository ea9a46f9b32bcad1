//! Configuration file loading tests

use std::path::PathBuf;
use tempfile::TempDir;
use ud_config::{Config, ConfigError, DeviceId};

fn write_config(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("udotool.yaml");
    std::fs::write(&path, content).unwrap();
    path
}

// ==================== Defaults ====================

#[test]
fn test_minimal_file_gives_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "dry_run: false\n");

    let config = Config::load(&path).unwrap();
    assert_eq!(config, Config::default());
    assert_eq!(config.device.name, "udotool");
    assert_eq!(config.device.path, PathBuf::from("/dev/uinput"));
    assert!(config.device.quirks.libinput);
    assert!(!config.dry_run);
}

// ==================== Overrides ====================

#[test]
fn test_full_device_section() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
dry_run: true
device:
  path: /tmp/uinput
  name: macro-pad
  id:
    vendor: 4660
    product: 7
  settle_time: 0.1
  key_delay: 0.02
  quirks:
    libinput: false
"#,
    );

    let config = Config::load(&path).unwrap();
    assert!(config.dry_run);
    assert_eq!(config.device.path, PathBuf::from("/tmp/uinput"));
    assert_eq!(config.device.name, "macro-pad");
    assert_eq!(config.device.id, DeviceId { vendor: 4660, product: 7, version: 0 });
    assert_eq!(config.device.settle_time, 0.1);
    assert_eq!(config.device.key_delay, 0.02);
    assert!(!config.device.quirks.libinput);
    assert!(config.validate().is_ok());
}

#[test]
fn test_partial_device_section_keeps_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "device:\n  name: pad\n");

    let config = Config::load(&path).unwrap();
    assert_eq!(config.device.name, "pad");
    assert_eq!(config.device.settle_time, 0.5);
    assert!(config.device.quirks.libinput);
}

// ==================== Errors ====================

#[test]
fn test_missing_file() {
    let err = Config::load("/nonexistent/udotool.yaml").unwrap_err();
    assert!(matches!(err, ConfigError::ReadFile { .. }));
}

#[test]
fn test_wrong_type_is_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "dry_run: maybe\n");

    let err = Config::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::ParseYaml { .. }));
}

#[test]
fn test_out_of_range_settle_time_fails_validation() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "device:\n  settle_time: 90000\n");

    let config = Config::load(&path).unwrap();
    assert!(config.validate().is_err());
}
