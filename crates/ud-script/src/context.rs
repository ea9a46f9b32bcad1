//! Control-flow state for one script run
//!
//! [`ExecutionContext`] tracks open `loop` and `if` blocks, the mode the
//! line feed is in, and the body of the loop currently being replayed.
//!
//! A `loop` met while reading the script itself switches to collecting: raw
//! lines are stored until the matching `end`, then the stored body is
//! replayed from memory as often as the loop demands. Loops nested inside a
//! replayed body simply rewind to the line after their own `loop`.
//!
//! While omitting, lines are only inspected for their first raw word so
//! block nesting stays balanced; nothing is expanded or executed.
//!
//! # Key Types
//!
//! - [`ExecutionContext`] - Frames, mode and loop body of one run
//! - [`ScriptLine`] - A raw script line with its position

use std::time::Instant;
use tracing::debug;
use ud_core::secs_to_duration;

use crate::error::{ScriptError, ScriptResult};
use crate::lexer::first_raw_word;
use crate::variables::Variables;

/// Maximum number of nested `loop`/`if` blocks
pub const MAX_CTRL_DEPTH: usize = 32;

/// Remaining iterations of the innermost loop, or `*`
pub const LOOP_COUNT_VAR: &str = "UDOTOOL_LOOP_COUNT";
/// Remaining seconds of the innermost loop as `S.mmm`, or `*`
pub const LOOP_RTIME_VAR: &str = "UDOTOOL_LOOP_RTIME";

const UNBOUNDED: &str = "*";

/// A raw script line and where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLine {
    pub lineno: usize,
    pub text: String,
}

impl ScriptLine {
    pub fn new(lineno: usize, text: impl Into<String>) -> Self {
        Self {
            lineno,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    /// Storing a loop body; `nesting` counts open blocks including the loop
    Collecting { nesting: usize },
    /// Skipping lines; `nesting` counts blocks opened while skipping
    Omitting { nesting: usize },
}

#[derive(Debug, Clone)]
enum Frame {
    Conditional {
        in_else: bool,
    },
    Loop {
        remaining: Option<u64>,
        deadline: Option<Instant>,
        rewind: usize,
    },
}

impl Frame {
    fn is_loop(&self) -> bool {
        matches!(self, Frame::Loop { .. })
    }
}

/// Control-flow state of a single script or command run
#[derive(Debug)]
pub struct ExecutionContext {
    file: String,
    mode: Mode,
    frames: Vec<Frame>,
    body: Vec<ScriptLine>,
    /// Next body index to replay; `None` while reading from the stream
    cursor: Option<usize>,
    /// Frame count below the loop whose body is stored
    base_depth: usize,
    body_end: usize,
}

impl ExecutionContext {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            mode: Mode::Normal,
            frames: Vec::new(),
            body: Vec::new(),
            cursor: None,
            base_depth: 0,
            body_end: 0,
        }
    }

    /// Name used when reporting errors
    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_collecting(&self) -> bool {
        matches!(self.mode, Mode::Collecting { .. })
    }

    pub fn is_omitting(&self) -> bool {
        matches!(self.mode, Mode::Omitting { .. })
    }

    pub fn is_replaying(&self) -> bool {
        self.cursor.is_some()
    }

    /// Number of raw lines stored for the loop being replayed
    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    fn check_depth(&self, verb: &str) -> ScriptResult<()> {
        if self.frames.len() >= MAX_CTRL_DEPTH {
            return Err(ScriptError::control_flow(
                verb,
                format!("too many levels (max {MAX_CTRL_DEPTH})"),
            ));
        }
        Ok(())
    }

    /// Store a raw line of a loop body.
    ///
    /// Returns `true` once the matching `end` has been seen and the body is
    /// ready to replay.
    pub fn collect(&mut self, line: ScriptLine) -> bool {
        let Mode::Collecting { nesting } = self.mode else {
            return false;
        };
        match first_raw_word(&line.text) {
            "loop" | "if" => self.mode = Mode::Collecting { nesting: nesting + 1 },
            "end" if nesting == 1 => {
                debug!(lines = self.body.len(), "loop body collected");
                self.mode = Mode::Normal;
                self.body_end = line.lineno;
                self.cursor = Some(0);
                return true;
            }
            "end" => self.mode = Mode::Collecting { nesting: nesting - 1 },
            _ => {}
        }
        self.body.push(line);
        false
    }

    /// Next line to run while replaying a loop body.
    ///
    /// After the last stored line a synthetic `end` is produced for the loop
    /// that owns the body. Returns `None` once that loop has retired.
    pub fn next_replay_line(&mut self) -> ScriptResult<Option<ScriptLine>> {
        let Some(cursor) = self.cursor else {
            return Ok(None);
        };
        if self.frames.len() <= self.base_depth {
            self.body.clear();
            self.cursor = None;
            return Ok(None);
        }
        if let Some(line) = self.body.get(cursor) {
            self.cursor = Some(cursor + 1);
            return Ok(Some(line.clone()));
        }
        if cursor > self.body.len() {
            return Err(ScriptError::control_flow("end", "unbalanced block in loop body")
                .at(&self.file, self.body_end));
        }
        self.cursor = Some(cursor + 1);
        Ok(Some(ScriptLine::new(self.body_end, "end")))
    }

    /// Track nesting of a line that is being skipped
    pub fn omit(&mut self, text: &str, vars: &mut Variables) -> ScriptResult<()> {
        let Mode::Omitting { nesting } = self.mode else {
            return Ok(());
        };
        match first_raw_word(text) {
            "loop" | "if" => self.mode = Mode::Omitting { nesting: nesting + 1 },
            "end" if nesting > 0 => self.mode = Mode::Omitting { nesting: nesting - 1 },
            "end" => {
                if self.frames.pop().is_none() {
                    return Err(ScriptError::control_flow("end", "mismatched context"));
                }
                self.mode = Mode::Normal;
                self.refresh_loop_env(vars);
            }
            "else" if nesting == 0 => match self.frames.last_mut() {
                Some(Frame::Conditional { in_else }) if !*in_else => {
                    *in_else = true;
                    self.mode = Mode::Normal;
                }
                _ => return Err(ScriptError::control_flow("else", "mismatched context")),
            },
            _ => {}
        }
        Ok(())
    }

    /// Open a loop with an iteration count, a run time, or both
    pub fn begin_loop(
        &mut self,
        count: Option<u64>,
        run_time: Option<f64>,
        vars: &mut Variables,
    ) -> ScriptResult<()> {
        if count.is_none() && run_time.is_none() {
            return Err(ScriptError::range(
                "loop",
                "either counter or time should be specified",
            ));
        }
        self.check_depth("loop")?;
        let deadline = run_time.map(|secs| Instant::now() + secs_to_duration(secs));
        debug!(?count, ?run_time, depth = self.frames.len() + 1, "loop");

        match self.cursor {
            Some(cursor) => self.frames.push(Frame::Loop {
                remaining: count,
                deadline,
                rewind: cursor,
            }),
            None => {
                self.base_depth = self.frames.len();
                self.frames.push(Frame::Loop {
                    remaining: count,
                    deadline,
                    rewind: 0,
                });
                self.body.clear();
                self.mode = Mode::Collecting { nesting: 1 };
            }
        }
        self.refresh_loop_env(vars);
        Ok(())
    }

    pub fn begin_if(&mut self, condition: bool) -> ScriptResult<()> {
        self.check_depth("if")?;
        debug!(condition, depth = self.frames.len() + 1, "if");
        self.frames.push(Frame::Conditional { in_else: false });
        if !condition {
            self.mode = Mode::Omitting { nesting: 0 };
        }
        Ok(())
    }

    /// `else` reached after running the `if` branch
    pub fn begin_else(&mut self) -> ScriptResult<()> {
        match self.frames.last_mut() {
            Some(Frame::Conditional { in_else }) if !*in_else => {
                *in_else = true;
                self.mode = Mode::Omitting { nesting: 0 };
                Ok(())
            }
            _ => Err(ScriptError::control_flow("else", "mismatched context")),
        }
    }

    /// Close the innermost block, or start the next loop iteration
    pub fn end_block(&mut self, vars: &mut Variables) -> ScriptResult<()> {
        let Some(frame) = self.frames.last_mut() else {
            return Err(ScriptError::control_flow("end", "mismatched context"));
        };
        match frame {
            Frame::Conditional { .. } => {
                self.frames.pop();
            }
            Frame::Loop {
                remaining,
                deadline,
                rewind,
            } => {
                if let Some(count) = remaining {
                    *count = count.saturating_sub(1);
                }
                let expired = *remaining == Some(0) || deadline.is_some_and(|d| Instant::now() >= d);
                if expired {
                    debug!(depth = self.frames.len(), "loop finished");
                    self.frames.pop();
                } else {
                    let rewind = *rewind;
                    if self.cursor.is_none() {
                        return Err(ScriptError::control_flow("end", "loop body is not available"));
                    }
                    self.cursor = Some(rewind);
                }
                self.refresh_loop_env(vars);
            }
        }
        Ok(())
    }

    /// Leave `levels` enclosing loops, skipping to the end of the outermost one
    pub fn break_loops(&mut self, levels: u64, vars: &mut Variables) -> ScriptResult<()> {
        if levels == 0 {
            return Err(ScriptError::range("break", "loop depth is out of range: 0"));
        }
        let open_loops = self.frames.iter().filter(|f| f.is_loop()).count() as u64;
        if levels > open_loops {
            return Err(ScriptError::control_flow(
                "break",
                format!("cannot leave {levels} loops, {open_loops} open"),
            ));
        }
        let mut left = 0;
        let mut unwound = 0;
        while let Some(frame) = self.frames.last() {
            if frame.is_loop() {
                left += 1;
                if left == levels {
                    break;
                }
            }
            self.frames.pop();
            unwound += 1;
        }
        debug!(levels, frames = unwound + 1, "break");
        self.mode = Mode::Omitting { nesting: unwound };
        self.refresh_loop_env(vars);
        Ok(())
    }

    /// Drop every open block for `exit`
    pub fn exit(&mut self, vars: &mut Variables) {
        self.frames.clear();
        self.body.clear();
        self.cursor = None;
        self.mode = Mode::Normal;
        self.refresh_loop_env(vars);
    }

    /// Verify nothing was left open at end of input
    pub fn finish(&self) -> ScriptResult<()> {
        if self.is_collecting() {
            return Err(ScriptError::control_flow("loop", "unterminated block"));
        }
        match self.frames.last() {
            None => Ok(()),
            Some(Frame::Loop { .. }) => Err(ScriptError::control_flow("loop", "unterminated block")),
            Some(Frame::Conditional { .. }) => Err(ScriptError::control_flow("if", "unterminated block")),
        }
    }

    /// Publish the innermost loop's remaining count and time
    pub fn refresh_loop_env(&self, vars: &mut Variables) {
        let innermost = self.frames.iter().rev().find_map(|frame| match frame {
            Frame::Loop {
                remaining,
                deadline,
                ..
            } => Some((*remaining, *deadline)),
            Frame::Conditional { .. } => None,
        });
        match innermost {
            None => {
                vars.unset(LOOP_COUNT_VAR);
                vars.unset(LOOP_RTIME_VAR);
            }
            Some((remaining, deadline)) => {
                let count = remaining.map_or_else(|| UNBOUNDED.to_string(), |n| n.to_string());
                let rtime = deadline.map_or_else(
                    || UNBOUNDED.to_string(),
                    |d| {
                        let left = d.saturating_duration_since(Instant::now());
                        let millis = (left.as_micros() + 500) / 1000;
                        format!("{}.{:03}", millis / 1000, millis % 1000)
                    },
                );
                vars.set(LOOP_COUNT_VAR, count);
                vars.set(LOOP_RTIME_VAR, rtime);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn collect_all(ctx: &mut ExecutionContext, lines: &[&str]) -> bool {
        let mut ready = false;
        for (i, text) in lines.iter().enumerate() {
            ready = ctx.collect(ScriptLine::new(i + 2, *text));
        }
        ready
    }

    #[test]
    fn test_loop_requires_limit() {
        let mut ctx = ExecutionContext::new("t");
        let mut vars = Variables::new();
        let err = ctx.begin_loop(None, None, &mut vars).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);
        assert_eq!(ctx.depth(), 0);
    }

    #[test]
    fn test_collecting_tracks_nesting() {
        let mut ctx = ExecutionContext::new("t");
        let mut vars = Variables::new();
        ctx.begin_loop(Some(2), None, &mut vars).unwrap();
        assert!(ctx.is_collecting());
        assert!(!collect_all(&mut ctx, &["loop 3", "echo", "end"]));
        assert!(ctx.is_collecting());
        assert!(collect_all(&mut ctx, &["end"]));
        assert_eq!(ctx.body_len(), 3);
        assert!(ctx.is_replaying());
    }

    #[test]
    fn test_replay_yields_synthetic_end() {
        let mut ctx = ExecutionContext::new("t");
        let mut vars = Variables::new();
        ctx.begin_loop(Some(2), None, &mut vars).unwrap();
        assert!(collect_all(&mut ctx, &["echo a", "end"]));

        let mut seen = Vec::new();
        while let Some(line) = ctx.next_replay_line().unwrap() {
            if line.text == "end" {
                ctx.end_block(&mut vars).unwrap();
            }
            seen.push(line.text);
        }
        assert_eq!(seen, vec!["echo a", "end", "echo a", "end"]);
        assert_eq!(ctx.depth(), 0);
        assert!(!ctx.is_replaying());
        assert_eq!(ctx.body_len(), 0);
        ctx.finish().unwrap();
    }

    #[test]
    fn test_loop_env_tracks_innermost_loop() {
        let mut ctx = ExecutionContext::new("t");
        let mut vars = Variables::new();
        ctx.begin_loop(Some(3), None, &mut vars).unwrap();
        assert_eq!(vars.get(LOOP_COUNT_VAR).as_deref(), Some("3"));
        assert_eq!(vars.get(LOOP_RTIME_VAR).as_deref(), Some("*"));

        ctx.exit(&mut vars);
        assert_eq!(vars.get(LOOP_COUNT_VAR), None);
        assert_eq!(vars.get(LOOP_RTIME_VAR), None);
    }

    #[test]
    fn test_loop_env_time_format() {
        let mut ctx = ExecutionContext::new("t");
        let mut vars = Variables::new();
        ctx.begin_loop(None, Some(60.0), &mut vars).unwrap();
        assert_eq!(vars.get(LOOP_COUNT_VAR).as_deref(), Some("*"));
        let rtime = vars.get(LOOP_RTIME_VAR).unwrap();
        let (secs, millis) = rtime.split_once('.').unwrap();
        assert!(secs == "60" || secs == "59", "{rtime}");
        assert_eq!(millis.len(), 3);
    }

    #[test]
    fn test_else_rules() {
        let mut ctx = ExecutionContext::new("t");
        let mut vars = Variables::new();
        assert_eq!(ctx.begin_else().unwrap_err().kind(), ErrorKind::ControlFlow);

        ctx.begin_if(true).unwrap();
        ctx.begin_else().unwrap();
        assert!(ctx.is_omitting());
        assert!(ctx.omit("else", &mut vars).is_err());
    }

    #[test]
    fn test_omitting_skips_nested_blocks() {
        let mut ctx = ExecutionContext::new("t");
        let mut vars = Variables::new();
        ctx.begin_if(false).unwrap();
        for line in ["if 1", "else", "end", "loop 3", "end"] {
            ctx.omit(line, &mut vars).unwrap();
            assert!(ctx.is_omitting(), "{line}");
        }
        ctx.omit("else", &mut vars).unwrap();
        assert!(!ctx.is_omitting());
        ctx.end_block(&mut vars).unwrap();
        assert_eq!(ctx.depth(), 0);
    }

    #[test]
    fn test_depth_limit() {
        let mut ctx = ExecutionContext::new("t");
        for _ in 0..MAX_CTRL_DEPTH {
            ctx.begin_if(true).unwrap();
        }
        let err = ctx.begin_if(true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ControlFlow);
    }

    #[test]
    fn test_end_without_block() {
        let mut ctx = ExecutionContext::new("t");
        let err = ctx.end_block(&mut Variables::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ControlFlow);
    }

    #[test]
    fn test_unterminated_blocks() {
        let mut ctx = ExecutionContext::new("t");
        ctx.begin_if(true).unwrap();
        assert_eq!(ctx.finish().unwrap_err().kind(), ErrorKind::ControlFlow);

        let mut ctx = ExecutionContext::new("t");
        ctx.begin_loop(Some(1), None, &mut Variables::new()).unwrap();
        assert_eq!(ctx.finish().unwrap_err().kind(), ErrorKind::ControlFlow);
    }
}
