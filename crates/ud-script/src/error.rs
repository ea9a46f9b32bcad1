//! Script error types

use thiserror::Error;
use ud_device::DeviceError;

/// Result type for script execution
pub type ScriptResult<T> = Result<T, ScriptError>;

/// Broad classification of a [`ScriptError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Parse,
    UnknownCommand,
    UnknownOption,
    Arity,
    UnknownAxis,
    UnknownKey,
    InvalidValue,
    InvalidExpression,
    Range,
    DeviceSetup,
    DeviceIo,
    ControlFlow,
    ChildProcess,
    Io,
}

/// Script execution errors
#[derive(Debug, Error)]
pub enum ScriptError {
    /// Bad quoting or expansion in a script line
    #[error("parse error: {0}")]
    Parse(String),

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("{verb}: unrecognized option {option}")]
    UnknownOption { verb: String, option: String },

    #[error("{verb}: missing parameter for option {option}")]
    MissingOptionValue { verb: String, option: String },

    #[error("{verb}: option {option} given more than once")]
    DuplicateOption { verb: String, option: String },

    #[error("{verb}: {reason}")]
    Arity { verb: String, reason: String },

    #[error("{verb}: invalid value: {value}")]
    InvalidValue { verb: String, value: String },

    #[error("{verb}: unknown axis: {name}")]
    UnknownAxis { verb: String, name: String },

    #[error("{verb}: unknown key: {name}")]
    UnknownKey { verb: String, name: String },

    #[error("{verb}: invalid expression: {reason}")]
    InvalidExpression { verb: String, reason: String },

    /// Value outside the interval a command accepts
    #[error("{verb}: {reason}")]
    Range { verb: String, reason: String },

    #[error(transparent)]
    Device(#[from] DeviceError),

    /// Mismatched `if`/`else`/`end`/`break` or an unterminated block
    #[error("{verb}: {reason}")]
    ControlFlow { verb: String, reason: String },

    #[error("child process failed: {0}")]
    ChildProcess(String),

    #[error("cannot read {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// Any other error tagged with the script position it came from
    #[error("{file}:{line}: {source}")]
    Located {
        file: String,
        line: usize,
        #[source]
        source: Box<ScriptError>,
    },
}

impl ScriptError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScriptError::Parse(_) => ErrorKind::Parse,
            ScriptError::UnknownCommand(_) => ErrorKind::UnknownCommand,
            ScriptError::UnknownOption { .. }
            | ScriptError::MissingOptionValue { .. }
            | ScriptError::DuplicateOption { .. } => ErrorKind::UnknownOption,
            ScriptError::Arity { .. } => ErrorKind::Arity,
            ScriptError::InvalidValue { .. } => ErrorKind::InvalidValue,
            ScriptError::UnknownAxis { .. } => ErrorKind::UnknownAxis,
            ScriptError::UnknownKey { .. } => ErrorKind::UnknownKey,
            ScriptError::InvalidExpression { .. } => ErrorKind::InvalidExpression,
            ScriptError::Range { .. } => ErrorKind::Range,
            ScriptError::Device(DeviceError::Setup { .. }) => ErrorKind::DeviceSetup,
            ScriptError::Device(DeviceError::Io(_)) => ErrorKind::DeviceIo,
            ScriptError::Device(DeviceError::Range { .. }) => ErrorKind::Range,
            ScriptError::ControlFlow { .. } => ErrorKind::ControlFlow,
            ScriptError::ChildProcess(_) => ErrorKind::ChildProcess,
            ScriptError::Io { .. } => ErrorKind::Io,
            ScriptError::Located { source, .. } => source.kind(),
        }
    }

    /// Fatal errors leave the device or the input stream unusable
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::DeviceSetup | ErrorKind::DeviceIo | ErrorKind::Io
        )
    }

    /// Attach a script position unless one is already attached
    pub fn at(self, file: &str, line: usize) -> Self {
        match self {
            located @ ScriptError::Located { .. } => located,
            other => ScriptError::Located {
                file: file.to_string(),
                line,
                source: Box::new(other),
            },
        }
    }

    pub(crate) fn control_flow(verb: &str, reason: impl Into<String>) -> Self {
        ScriptError::ControlFlow {
            verb: verb.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn range(verb: &str, reason: impl Into<String>) -> Self {
        ScriptError::Range {
            verb: verb.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_value(verb: &str, value: &str) -> Self {
        ScriptError::InvalidValue {
            verb: verb.to_string(),
            value: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_located_keeps_inner_kind() {
        let err = ScriptError::control_flow("end", "no open block").at("demo.ud", 7);
        assert_eq!(err.kind(), ErrorKind::ControlFlow);
        assert_eq!(err.to_string(), "demo.ud:7: end: no open block");
    }

    #[test]
    fn test_at_does_not_rewrap() {
        let err = ScriptError::Parse("x".into()).at("inner", 2).at("outer", 9);
        match err {
            ScriptError::Located { file, line, .. } => {
                assert_eq!(file, "inner");
                assert_eq!(line, 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_device_range_is_recoverable() {
        let err = ScriptError::from(DeviceError::Range { axis: 0, value: 101.0 });
        assert_eq!(err.kind(), ErrorKind::Range);
        assert!(!err.is_fatal());

        let err = ScriptError::from(DeviceError::Setup {
            path: "/dev/uinput".into(),
            reason: "denied".into(),
        });
        assert!(err.is_fatal());
    }
}
