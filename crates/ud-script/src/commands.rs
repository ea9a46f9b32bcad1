//! Verb implementations

use std::io::Write;
use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};
use tracing::{debug, warn};
use ud_core::{
    find_axis, find_key, parse_float, parse_seconds, secs_to_duration, sleep_monotonic, AxisKind, AxisMask,
    ABS_AXES, KEYS, MAIN_ABS_AXES, MAIN_REL_AXES, MAIN_WHEEL_AXES, REL_AXES,
};

use crate::condition;
use crate::context::ExecutionContext;
use crate::error::{ScriptError, ScriptResult};
use crate::executor::{Flow, ScriptExecutor};
use crate::variables::Variables;
use crate::verbs::{find_verb, parse_count, Invocation, Opcode, VerbInfo, VERBS};

/// Longest axis name accepted by `input`
const MAX_AXIS_NAME: usize = 63;

const AXIS_KEYDOWN: &str = "KEYDOWN";
const AXIS_KEYUP: &str = "KEYUP";
const AXIS_SYNC: &str = "SYNC";

fn output_error(e: std::io::Error) -> ScriptError {
    ScriptError::Io {
        name: "output".to_string(),
        source: e,
    }
}

fn resolve_key(verb: &str, name: &str) -> ScriptResult<u16> {
    find_key(name).ok_or_else(|| ScriptError::UnknownKey {
        verb: verb.to_string(),
        name: name.to_string(),
    })
}

fn resolve_keys(inv: &Invocation) -> ScriptResult<Vec<u16>> {
    inv.args.iter().map(|name| resolve_key(inv.name(), name)).collect()
}

fn parse_number(verb: &str, text: &str) -> ScriptResult<f64> {
    parse_float(text).ok_or_else(|| ScriptError::invalid_value(verb, text))
}

/// Relative deltas must fit the event value field
fn check_relative(verb: &str, value: f64) -> ScriptResult<f64> {
    if value < f64::from(i32::MIN) || value > f64::from(i32::MAX) {
        return Err(ScriptError::range(verb, format!("relative value is out of range: {value}")));
    }
    Ok(value)
}

fn check_absolute(verb: &str, value: f64) -> ScriptResult<f64> {
    if !(0.0..=100.0).contains(&value) {
        return Err(ScriptError::range(verb, format!("absolute value is out of range: {value}")));
    }
    Ok(value)
}

/// One `input` argument
enum InputItem {
    Sync,
    Key(u16, bool),
    Absolute(u16, f64),
    Relative(u16, f64),
}

fn parse_input_item(verb: &str, arg: &str) -> ScriptResult<InputItem> {
    let (name, value) = match arg.split_once('=') {
        Some((name, value)) => (name, Some(value)),
        None => (arg, None),
    };
    if name.len() > MAX_AXIS_NAME {
        return Err(ScriptError::UnknownAxis {
            verb: verb.to_string(),
            name: name.to_string(),
        });
    }
    if name.eq_ignore_ascii_case(AXIS_SYNC) {
        return Ok(InputItem::Sync);
    }
    let value = value.ok_or_else(|| ScriptError::invalid_value(verb, arg))?;
    if name.eq_ignore_ascii_case(AXIS_KEYDOWN) || name.eq_ignore_ascii_case(AXIS_KEYUP) {
        let key = resolve_key(verb, value)?;
        return Ok(InputItem::Key(key, name.eq_ignore_ascii_case(AXIS_KEYDOWN)));
    }
    let axis = find_axis(name, AxisMask::Both).ok_or_else(|| ScriptError::UnknownAxis {
        verb: verb.to_string(),
        name: name.to_string(),
    })?;
    let number = parse_number(verb, value)?;
    Ok(match axis.kind {
        AxisKind::Absolute => InputItem::Absolute(axis.code, check_absolute(verb, number)?),
        AxisKind::Relative => InputItem::Relative(axis.code, check_relative(verb, number)?),
    })
}

impl ScriptExecutor {
    pub(crate) fn dispatch(&mut self, ctx: &mut ExecutionContext, inv: &Invocation) -> ScriptResult<Flow> {
        match inv.verb.opcode {
            Opcode::KeyDown => self.cmd_press(inv, true)?,
            Opcode::KeyUp => self.cmd_press(inv, false)?,
            Opcode::Key => self.cmd_key(inv)?,
            Opcode::Move => self.cmd_move(inv)?,
            Opcode::Wheel => self.cmd_wheel(inv)?,
            Opcode::Position => self.cmd_position(inv)?,
            Opcode::Open => self.device.open()?,
            Opcode::Input => self.cmd_input(inv)?,
            Opcode::Loop => {
                let count = match inv.args.first() {
                    Some(arg) => Some(parse_count(inv.name(), "loop counter", arg)?),
                    None => None,
                };
                ctx.begin_loop(count, inv.options.time, &mut self.variables)?;
            }
            Opcode::If => {
                let value = condition::evaluate(inv.name(), inv.args)?;
                ctx.begin_if(value)?;
            }
            Opcode::Else => ctx.begin_else()?,
            Opcode::Break => {
                let levels = match inv.args.first() {
                    Some(arg) => parse_count(inv.name(), "loop depth", arg)?,
                    None => 1,
                };
                ctx.break_loops(levels, &mut self.variables)?;
            }
            Opcode::End => ctx.end_block(&mut self.variables)?,
            Opcode::Sleep => {
                let secs = parse_seconds(&inv.args[0]).ok_or_else(|| {
                    ScriptError::range(inv.name(), format!("sleep time is out of range: {}", inv.args[0]))
                })?;
                self.sleep(inv.name(), secs)?;
            }
            Opcode::Exec => self.cmd_exec(inv)?,
            Opcode::Echo => {
                writeln!(self.output, "{}", inv.args.join(" ")).map_err(output_error)?;
            }
            Opcode::Set => self.cmd_set(inv)?,
            Opcode::Script => self.run_nested(ctx, &inv.args[0])?,
            Opcode::Exit => {
                ctx.exit(&mut self.variables);
                return Ok(Flow::Exit);
            }
            Opcode::Help => self.cmd_help(inv.args)?,
        }
        Ok(Flow::Continue)
    }

    fn sleep(&mut self, verb: &str, secs: f64) -> ScriptResult<()> {
        self.output.flush().map_err(output_error)?;
        sleep_monotonic(secs_to_duration(secs)).map_err(|e| ScriptError::Io {
            name: verb.to_string(),
            source: e,
        })
    }

    fn cmd_press(&mut self, inv: &Invocation, pressed: bool) -> ScriptResult<()> {
        for key in resolve_keys(inv)? {
            self.device.key(key, pressed, true)?;
        }
        Ok(())
    }

    fn cmd_key(&mut self, inv: &Invocation) -> ScriptResult<()> {
        let keys = resolve_keys(inv)?;
        let delay = inv.options.delay.unwrap_or(self.device.config().key_delay);
        let mut repeat = inv.options.repeat.unwrap_or(0);
        if let Some(time) = inv.options.time {
            let max_count = (time / delay) as u64;
            if repeat == 0 || max_count < repeat {
                repeat = max_count;
            }
        }
        let repeat = repeat.max(1);
        debug!(repeat, delay, "key");

        for _ in 0..repeat {
            for &key in &keys {
                self.device.key(key, true, true)?;
            }
            for &key in keys.iter().rev() {
                self.device.key(key, false, true)?;
            }
            self.sleep(inv.name(), delay)?;
        }
        Ok(())
    }

    fn cmd_move(&mut self, inv: &Invocation) -> ScriptResult<()> {
        let axes = MAIN_REL_AXES[usize::from(inv.options.alt)];
        let deltas = inv
            .args
            .iter()
            .map(|arg| parse_number(inv.name(), arg).and_then(|v| check_relative(inv.name(), v)))
            .collect::<ScriptResult<Vec<_>>>()?;
        for (&axis, delta) in axes.iter().zip(deltas) {
            self.device.rel(axis, delta, false)?;
        }
        self.device.sync()?;
        Ok(())
    }

    fn cmd_position(&mut self, inv: &Invocation) -> ScriptResult<()> {
        let axes = MAIN_ABS_AXES[usize::from(inv.options.alt)];
        let values = inv
            .args
            .iter()
            .map(|arg| parse_number(inv.name(), arg).and_then(|v| check_absolute(inv.name(), v)))
            .collect::<ScriptResult<Vec<_>>>()?;
        for (&axis, value) in axes.iter().zip(values) {
            self.device.abs(axis, value, false)?;
        }
        self.device.sync()?;
        Ok(())
    }

    fn cmd_wheel(&mut self, inv: &Invocation) -> ScriptResult<()> {
        let axis = MAIN_WHEEL_AXES[usize::from(inv.options.alt)];
        let delta = check_relative(inv.name(), parse_number(inv.name(), &inv.args[0])?)?;
        self.device.rel(axis, delta, true)?;
        Ok(())
    }

    /// `input axis=value...` emits one packet closed by a single sync.
    ///
    /// Every argument is resolved before the first event is written.
    fn cmd_input(&mut self, inv: &Invocation) -> ScriptResult<()> {
        let items = inv
            .args
            .iter()
            .map(|arg| parse_input_item(inv.name(), arg))
            .collect::<ScriptResult<Vec<_>>>()?;
        for item in items {
            match item {
                InputItem::Sync => self.device.sync()?,
                InputItem::Key(code, pressed) => self.device.key(code, pressed, false)?,
                InputItem::Absolute(code, value) => self.device.abs(code, value, false)?,
                InputItem::Relative(code, delta) => self.device.rel(code, delta, false)?,
            }
        }
        self.device.sync()?;
        Ok(())
    }

    fn cmd_exec(&mut self, inv: &Invocation) -> ScriptResult<()> {
        self.output.flush().map_err(output_error)?;
        let (program, args) = (&inv.args[0], &inv.args[1..]);
        let mut command = Command::new(program);
        command.args(args);
        self.variables.apply_to(&mut command);

        if inv.options.alt {
            command
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null());
            // SAFETY: setsid is async-signal-safe and touches no parent state.
            unsafe {
                command.pre_exec(|| {
                    if libc::setsid() == -1 {
                        return Err(std::io::Error::last_os_error());
                    }
                    Ok(())
                });
            }
            let child = command
                .spawn()
                .map_err(|e| ScriptError::ChildProcess(format!("{program}: {e}")))?;
            debug!(program = %program, pid = child.id(), "detached");
            return Ok(());
        }

        let status = command
            .status()
            .map_err(|e| ScriptError::ChildProcess(format!("{program}: {e}")))?;
        debug!(program = %program, %status, "exec finished");
        if !status.success() {
            return Err(ScriptError::ChildProcess(format!("{program}: {status}")));
        }
        Ok(())
    }

    fn cmd_set(&mut self, inv: &Invocation) -> ScriptResult<()> {
        let name = &inv.args[0];
        if !Variables::is_valid_name(name) {
            return Err(ScriptError::invalid_value(inv.name(), name));
        }
        match inv.args.get(1) {
            Some(value) => self.variables.set(name.as_str(), value.as_str()),
            None => self.variables.unset(name.as_str()),
        }
        Ok(())
    }

    fn cmd_help(&mut self, args: &[String]) -> ScriptResult<()> {
        let out = &mut self.output;
        if args.is_empty() {
            for info in VERBS {
                write_verb_help(out, info)?;
            }
            return Ok(());
        }
        for arg in args {
            match arg.as_str() {
                "-axis" => {
                    writeln!(out, "Relative axes:").map_err(output_error)?;
                    for (name, code) in REL_AXES {
                        writeln!(out, " - {name} (0x{code:02X})").map_err(output_error)?;
                    }
                    writeln!(out, "Absolute axes:").map_err(output_error)?;
                    for (name, code) in ABS_AXES {
                        writeln!(out, " - {name} (0x{code:02X})").map_err(output_error)?;
                    }
                }
                "-keys" | "-key" => {
                    writeln!(out, "Known keys:").map_err(output_error)?;
                    for (name, code) in KEYS {
                        writeln!(out, " - {name} (0x{code:03X})").map_err(output_error)?;
                    }
                }
                _ if arg.starts_with('-') => warn!(section = %arg, "unknown help section"),
                _ => match find_verb(arg) {
                    Some(info) => write_verb_help(out, info)?,
                    None => warn!(verb = %arg, "unknown command"),
                },
            }
        }
        Ok(())
    }
}

fn write_verb_help(out: &mut Box<dyn Write>, info: &VerbInfo) -> ScriptResult<()> {
    if let (Some(usage), Some(description)) = (info.usage, info.description) {
        writeln!(out, "{} {}\n    {}\n", info.name, usage, description).map_err(output_error)?;
    }
    Ok(())
}
