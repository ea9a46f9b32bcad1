//! Script executor
//!
//! Feeds script lines through the control-flow state machine, expands them
//! into words and dispatches the resulting commands against the device.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use tracing::{debug, trace};
use ud_config::Config;
use ud_device::Device;

use crate::context::{ExecutionContext, ScriptLine};
use crate::error::{ScriptError, ScriptResult};
use crate::lexer::{first_raw_word, split_words};
use crate::variables::Variables;
use crate::verbs::{is_block_keyword, Invocation};

/// Maximum nesting of `script` commands
pub const MAX_SCRIPT_DEPTH: usize = 16;

/// Name used for scripts read from standard input
pub const STDIN_NAME: &str = "<stdin>";

/// How a run ended when it did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Input was exhausted with every block closed
    Completed,
    /// `exit` stopped the script early
    Exited,
}

/// Result of one dispatched line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Exit,
}

/// Runs commands and scripts against one device
pub struct ScriptExecutor {
    pub(crate) device: Device,
    pub(crate) variables: Variables,
    pub(crate) output: Box<dyn Write>,
    script_depth: usize,
}

impl std::fmt::Debug for ScriptExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptExecutor")
            .field("device", &self.device)
            .field("variables", &self.variables)
            .field("script_depth", &self.script_depth)
            .finish()
    }
}

impl ScriptExecutor {
    /// Executor for a loaded configuration, writing to standard output
    pub fn new(config: &Config) -> Self {
        let device = if config.dry_run {
            Device::dry_run(config.device.clone())
        } else {
            Device::uinput(config.device.clone())
        };
        Self::with_device(device)
    }

    pub fn with_device(device: Device) -> Self {
        Self {
            device,
            variables: Variables::new(),
            output: Box::new(io::stdout()),
            script_depth: 0,
        }
    }

    /// Send `echo` and `help` output somewhere other than standard output
    pub fn with_output(mut self, output: impl Write + 'static) -> Self {
        self.output = Box::new(output);
        self
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut Variables {
        &mut self.variables
    }

    /// Destroy the device if it was created
    pub fn close_device(&mut self) -> ScriptResult<()> {
        self.device.close()?;
        Ok(())
    }

    /// Run one command that is already split into words.
    ///
    /// No expansion takes place. An empty command prints help.
    pub fn run_command(&mut self, words: &[String]) -> ScriptResult<Outcome> {
        let help = ["help".to_string()];
        let words = if words.is_empty() { &help[..] } else { words };
        let mut ctx = ExecutionContext::new("<command>");
        if self.execute(&mut ctx, words)? == Flow::Exit {
            return Ok(Outcome::Exited);
        }
        ctx.finish()?;
        Ok(Outcome::Completed)
    }

    /// Run a script read line by line from `reader`
    pub fn run_script(&mut self, name: &str, reader: impl BufRead) -> ScriptResult<Outcome> {
        if self.script_depth >= MAX_SCRIPT_DEPTH {
            return Err(ScriptError::control_flow(
                "script",
                format!("too many nested scripts (max {MAX_SCRIPT_DEPTH})"),
            ));
        }
        self.script_depth += 1;
        let result = self.run_lines(name, reader);
        self.script_depth -= 1;
        result
    }

    /// Run a script file; `None` or `-` reads standard input
    pub fn run_file(&mut self, path: Option<&Path>) -> ScriptResult<Outcome> {
        match path {
            None => self.run_stdin(),
            Some(path) if path == Path::new("-") => self.run_stdin(),
            Some(path) => {
                let name = path.display().to_string();
                let file = File::open(path).map_err(|source| ScriptError::Io {
                    name: name.clone(),
                    source,
                })?;
                self.run_script(&name, BufReader::new(file))
            }
        }
    }

    fn run_stdin(&mut self) -> ScriptResult<Outcome> {
        let stdin = io::stdin();
        let lock = stdin.lock();
        self.run_script(STDIN_NAME, lock)
    }

    fn run_lines(&mut self, name: &str, mut reader: impl BufRead) -> ScriptResult<Outcome> {
        debug!(script = name, depth = self.script_depth, "running script");
        let mut ctx = ExecutionContext::new(name);
        let mut last_line = 0;
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let read = reader.read_until(b'\n', &mut buf).map_err(|source| ScriptError::Io {
                name: name.to_string(),
                source,
            })?;
            if read == 0 {
                break;
            }
            last_line += 1;
            // Invalid UTF-8 becomes U+FFFD
            let line = String::from_utf8_lossy(&buf);
            let text = line.trim();
            if text.is_empty() || text.starts_with('#') || text.starts_with(';') {
                continue;
            }
            if self.feed(&mut ctx, ScriptLine::new(last_line, text))? == Flow::Exit {
                debug!(script = name, line = last_line, "script exited");
                return Ok(Outcome::Exited);
            }
        }
        ctx.finish().map_err(|e| e.at(name, last_line))?;
        Ok(Outcome::Completed)
    }

    /// Accept one line from the script stream
    fn feed(&mut self, ctx: &mut ExecutionContext, line: ScriptLine) -> ScriptResult<Flow> {
        if ctx.is_collecting() {
            if ctx.collect(line) {
                return self.replay(ctx);
            }
            return Ok(Flow::Continue);
        }
        self.process_line(ctx, &line)
    }

    /// Run a collected loop body until its loop retires
    fn replay(&mut self, ctx: &mut ExecutionContext) -> ScriptResult<Flow> {
        while let Some(line) = ctx.next_replay_line()? {
            if self.process_line(ctx, &line)? == Flow::Exit {
                return Ok(Flow::Exit);
            }
        }
        Ok(Flow::Continue)
    }

    fn process_line(&mut self, ctx: &mut ExecutionContext, line: &ScriptLine) -> ScriptResult<Flow> {
        trace!(line = line.lineno, text = %line.text, "line");
        self.process_text(ctx, &line.text)
            .map_err(|e| e.at(ctx.file(), line.lineno))
    }

    fn process_text(&mut self, ctx: &mut ExecutionContext, text: &str) -> ScriptResult<Flow> {
        if ctx.is_omitting() {
            ctx.omit(text, &mut self.variables)?;
            return Ok(Flow::Continue);
        }
        let words = split_words(text, &self.variables)?;
        let Some(verb) = words.first() else {
            return Ok(Flow::Continue);
        };
        // Block structure is tracked on raw text, so keywords must not come from expansion
        if is_block_keyword(verb) && verb != first_raw_word(text) {
            return Err(ScriptError::control_flow(
                verb,
                "block keywords must be written literally",
            ));
        }
        self.execute(ctx, &words)
    }

    /// Dispatch one command
    fn execute(&mut self, ctx: &mut ExecutionContext, words: &[String]) -> ScriptResult<Flow> {
        let invocation = Invocation::parse(words)?;
        debug!(verb = invocation.name(), args = ?invocation.args, "dispatch");
        self.dispatch(ctx, &invocation)
    }

    /// Run a nested script, keeping the caller's loop variables intact
    pub(crate) fn run_nested(&mut self, ctx: &ExecutionContext, target: &str) -> ScriptResult<()> {
        let path = (target != "-").then(|| Path::new(target));
        let result = self.run_file(path);
        ctx.refresh_loop_env(&mut self.variables);
        result.map(|_| ())
    }
}
