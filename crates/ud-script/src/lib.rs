//! Script engine
//!
//! This crate interprets udotool scripts. Each line is split into words the
//! way a shell would, resolved against the verb table and run against the
//! virtual device.
//!
//! # Control Flow
//!
//! - `loop [-time <seconds>] [<N>] ... end`
//! - `if <condition> ... [else ...] end`
//! - `break [<N>]`
//! - `exit`
//!
//! # Key Types
//!
//! - [`ScriptExecutor`] - Runs commands and scripts against a device
//! - [`ExecutionContext`] - Control-flow state of one run
//! - [`Invocation`] - A verb resolved with its options and arguments
//! - [`ScriptError`] - Everything that can stop a script

pub mod arith;
mod commands;
pub mod condition;
pub mod context;
pub mod error;
pub mod executor;
pub mod lexer;
pub mod variables;
pub mod verbs;

pub use context::{ExecutionContext, ScriptLine, LOOP_COUNT_VAR, LOOP_RTIME_VAR, MAX_CTRL_DEPTH};
pub use error::{ErrorKind, ScriptError, ScriptResult};
pub use executor::{Outcome, ScriptExecutor, MAX_SCRIPT_DEPTH};
pub use lexer::split_words;
pub use variables::Variables;
pub use verbs::{find_verb, Invocation, Opcode, OptionValues, VerbInfo, VerbOption, VERBS};
