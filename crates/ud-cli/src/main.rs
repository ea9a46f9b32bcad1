//! udotool
//!
//! Runs a single command given on the command line, or a script read from a
//! file or standard input, against a virtual uinput device.

mod cli;

use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use tracing::{debug, error, warn};
use tracing_subscriber::EnvFilter;
use ud_script::{Outcome, ScriptError, ScriptExecutor};

use crate::cli::Cli;

/// A script command failed
const EXIT_SCRIPT_ERROR: u8 = 1;
/// Configuration, device or I/O failure
const EXIT_FATAL: u8 = 2;

fn init_logging(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.default_log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<Outcome> {
    let config = cli.load_config()?;
    if config.dry_run {
        warn!("[DRY RUN] no uinput actions will be performed");
    }

    let mut executor = ScriptExecutor::new(&config);
    let result = match &cli.input {
        Some(path) => executor.run_file(Some(path)),
        None => executor.run_command(&cli.command),
    };
    let closed = executor.close_device();

    let outcome = result?;
    closed?;
    Ok(outcome)
}

fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<ScriptError>() {
        Some(e) if !e.is_fatal() => EXIT_SCRIPT_ERROR,
        _ => EXIT_FATAL,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    match run(&cli) {
        Ok(outcome) => {
            debug!(?outcome, "done");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(exit_code(&e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use ud_script::ErrorKind;

    #[test]
    fn test_exit_codes() {
        let script = anyhow::Error::new(ScriptError::UnknownCommand("frobnicate".into()));
        assert_eq!(exit_code(&script), EXIT_SCRIPT_ERROR);

        let located = anyhow::Error::new(ScriptError::Parse("unterminated quote".into()).at("test.ud", 3));
        assert_eq!(exit_code(&located), EXIT_SCRIPT_ERROR);

        let io = ScriptError::Io {
            name: "test.ud".into(),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert_eq!(io.kind(), ErrorKind::Io);
        assert_eq!(exit_code(&anyhow::Error::new(io)), EXIT_FATAL);

        assert_eq!(exit_code(&anyhow::anyhow!("bad configuration")), EXIT_FATAL);
    }
}
