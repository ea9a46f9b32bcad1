//! Command-line arguments and how they layer over the configuration file

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use ud_config::{Config, DeviceId, MAX_DEVICE_NAME};

/// Emulate keyboard, mouse and joystick input through uinput
#[derive(Parser, Debug)]
#[command(name = "udotool", version, about)]
pub struct Cli {
    /// Read commands from FILE ("-" for standard input)
    #[arg(short, long, value_name = "FILE", conflicts_with = "command")]
    pub input: Option<PathBuf>,

    /// Log events instead of creating a device
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Increase log verbosity (repeatable)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// YAML configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Path of the uinput control node
    #[arg(long = "dev", value_name = "PATH")]
    pub device: Option<PathBuf>,

    /// Name reported by the emulated device
    #[arg(long, value_name = "NAME")]
    pub dev_name: Option<String>,

    /// Device id as VENDOR:PRODUCT[:VERSION]
    #[arg(long, value_name = "ID")]
    pub dev_id: Option<String>,

    /// Seconds to wait after creating the device
    #[arg(long, value_name = "SECONDS")]
    pub settle_time: Option<String>,

    /// Default delay between `key` repetitions
    #[arg(long, value_name = "SECONDS")]
    pub key_delay: Option<String>,

    /// Comma-separated quirks; prefix a name with '-' to disable it
    #[arg(long, value_name = "LIST", allow_hyphen_values = true)]
    pub quirks: Option<String>,

    /// Command and its arguments; without one the command list is printed
    #[arg(value_name = "COMMAND", trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

impl Cli {
    /// Defaults, then the configuration file, then flags
    pub fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path).with_context(|| format!("loading {}", path.display()))?,
            None => Config::default(),
        };

        if self.dry_run {
            config.dry_run = true;
        }
        let device = &mut config.device;
        if let Some(path) = &self.device {
            device.path = path.clone();
        }
        if let Some(name) = &self.dev_name {
            if name.len() > MAX_DEVICE_NAME {
                bail!("device name is longer than {MAX_DEVICE_NAME} bytes");
            }
            device.name = name.clone();
        }
        if let Some(id) = &self.dev_id {
            device.id = DeviceId::parse(id)?;
        }
        if let Some(text) = &self.settle_time {
            device.set_settle_time(text)?;
        }
        if let Some(text) = &self.key_delay {
            device.set_key_delay(text)?;
        }
        if let Some(list) = &self.quirks {
            device.quirks.apply(list)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Log filter used when `RUST_LOG` is not set
    pub fn default_log_filter(&self) -> &'static str {
        // Dry-run events are logged at info
        let level = if self.dry_run { self.verbose.max(1) } else { self.verbose };
        match level {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("udotool").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_command_keeps_hyphen_arguments() {
        let cli = parse(&["-n", "move", "-r", "-5", "3"]);
        assert!(cli.dry_run);
        assert_eq!(cli.command, vec!["move", "-r", "-5", "3"]);
        assert!(cli.input.is_none());
    }

    #[test]
    fn test_flags_after_command_belong_to_it() {
        let cli = parse(&["key", "-repeat", "2", "-v", "KEY_A"]);
        assert_eq!(cli.verbose, 0);
        assert_eq!(cli.command, vec!["key", "-repeat", "2", "-v", "KEY_A"]);
    }

    #[test]
    fn test_input_mode() {
        let cli = parse(&["-i", "-"]);
        assert_eq!(cli.input, Some(PathBuf::from("-")));
        assert!(cli.command.is_empty());
    }

    #[test]
    fn test_input_with_command_rejected() {
        assert!(Cli::try_parse_from(["udotool", "-i", "script.ud", "echo", "hi"]).is_err());
    }

    #[test]
    fn test_command_is_optional() {
        let cli = parse(&["-n"]);
        assert!(cli.command.is_empty());
        assert!(cli.input.is_none());
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = parse(&[
            "--dev",
            "/tmp/uinput",
            "--dev-name",
            "test pad",
            "--dev-id",
            "0x1234:0x5678",
            "--settle-time",
            "0.1",
            "--key-delay",
            "0.01",
            "--quirks",
            "-libinput",
            "open",
        ]);
        let config = cli.load_config().unwrap();
        assert!(!config.dry_run);
        assert_eq!(config.device.path, PathBuf::from("/tmp/uinput"));
        assert_eq!(config.device.name, "test pad");
        assert_eq!(config.device.id.vendor, 0x1234);
        assert_eq!(config.device.id.product, 0x5678);
        assert_eq!(config.device.id.version, 0);
        assert_eq!(config.device.settle_time, 0.1);
        assert_eq!(config.device.key_delay, 0.01);
        assert!(!config.device.quirks.libinput);
    }

    #[test]
    fn test_flags_override_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "dry_run: true\ndevice:\n  name: from-file\n  key_delay: 0.2").unwrap();
        let path = file.path().to_str().unwrap();

        let config = parse(&["--config", path, "--key-delay", "0.3", "open"]).load_config().unwrap();
        assert!(config.dry_run);
        assert_eq!(config.device.name, "from-file");
        assert_eq!(config.device.key_delay, 0.3);
    }

    #[test]
    fn test_invalid_overrides() {
        for args in [
            &["--dev-id", "1:2:3:4", "open"][..],
            &["--dev-id", "0x10000", "open"][..],
            &["--settle-time", "soon", "open"][..],
            &["--key-delay", "100000", "open"][..],
            &["--quirks", "bogus", "open"][..],
        ] {
            assert!(parse(args).load_config().is_err(), "{args:?}");
        }
        let long_name = "x".repeat(MAX_DEVICE_NAME + 1);
        assert!(parse(&["--dev-name", &long_name, "open"]).load_config().is_err());
    }

    #[test]
    fn test_missing_config_file() {
        let err = parse(&["--config", "/nonexistent/udotool.yaml", "open"])
            .load_config()
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/udotool.yaml"));
    }

    #[test]
    fn test_default_log_filter() {
        assert_eq!(parse(&["open"]).default_log_filter(), "warn");
        assert_eq!(parse(&["-n", "open"]).default_log_filter(), "info");
        assert_eq!(parse(&["-vv", "open"]).default_log_filter(), "debug");
        assert_eq!(parse(&["-v", "-v", "-v", "-v", "open"]).default_log_filter(), "trace");
    }
}
