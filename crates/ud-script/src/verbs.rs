//! Verb table and option parsing
//!
//! Every command a script can use is described by a static [`VerbInfo`].
//! Dispatch resolves the verb by exact name, consumes the leading options the
//! verb allows and checks the remaining argument count.

use ud_core::{is_valid_delay, parse_c_integer, parse_float};

use crate::error::{ScriptError, ScriptResult};

/// Operation selected by a verb
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    KeyDown,
    KeyUp,
    Key,
    Move,
    Wheel,
    Position,
    Open,
    Input,
    Loop,
    If,
    Else,
    Break,
    End,
    Sleep,
    Exec,
    Echo,
    Set,
    Script,
    Exit,
    Help,
}

/// Options a verb may accept before its positional arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbOption {
    Repeat,
    Time,
    Delay,
    R,
    H,
    Detach,
}

impl VerbOption {
    pub fn name(self) -> &'static str {
        match self {
            VerbOption::Repeat => "repeat",
            VerbOption::Time => "time",
            VerbOption::Delay => "delay",
            VerbOption::R => "r",
            VerbOption::H => "h",
            VerbOption::Detach => "detach",
        }
    }

    fn takes_value(self) -> bool {
        matches!(self, VerbOption::Repeat | VerbOption::Time | VerbOption::Delay)
    }
}

/// Static description of a verb
#[derive(Debug)]
pub struct VerbInfo {
    pub name: &'static str,
    pub opcode: Opcode,
    pub min_args: usize,
    /// `None` means unbounded
    pub max_args: Option<usize>,
    pub options: &'static [VerbOption],
    /// Usage and description; `None` for verbs only meaningful inside blocks
    pub usage: Option<&'static str>,
    pub description: Option<&'static str>,
}

macro_rules! verb {
    ($name:literal, $op:ident, $min:expr, $max:expr, [$($opt:ident),*], $usage:expr, $desc:expr) => {
        VerbInfo {
            name: $name,
            opcode: Opcode::$op,
            min_args: $min,
            max_args: $max,
            options: &[$(VerbOption::$opt),*],
            usage: $usage,
            description: $desc,
        }
    };
}

pub static VERBS: &[VerbInfo] = &[
    verb!("keydown", KeyDown, 1, None, [], Some("<key>..."), Some("Press down specified keys.")),
    verb!("keyup", KeyUp, 1, None, [], Some("<key>..."), Some("Release specified keys.")),
    verb!(
        "key",
        Key,
        1,
        None,
        [Repeat, Time, Delay],
        Some("[-repeat <N>] [-time <seconds>] [-delay <seconds>] <key>..."),
        Some("Press down and release specified keys.")
    ),
    verb!(
        "move",
        Move,
        1,
        Some(3),
        [R],
        Some("[-r] <delta-x> [<delta-y> [<delta-z>]]"),
        Some("Move pointer by specified delta.")
    ),
    verb!("wheel", Wheel, 1, Some(1), [H], Some("[-h] <delta>"), Some("Move wheel by specified delta.")),
    verb!(
        "position",
        Position,
        1,
        Some(3),
        [R],
        Some("[-r] <pos-x> [<pos-y> [<pos-z>]]"),
        Some("Move pointer to specified absolute position.")
    ),
    verb!("open", Open, 0, Some(0), [], Some(""), Some("Initialize the virtual device.")),
    verb!(
        "input",
        Input,
        1,
        None,
        [],
        Some("<axis>=<value>..."),
        Some("Generate a packet of input values.")
    ),
    verb!(
        "loop",
        Loop,
        0,
        Some(1),
        [Time],
        Some("[-time <seconds>] [<N>]\n ...\nend"),
        Some("Repeat a block of commands.")
    ),
    verb!(
        "if",
        If,
        1,
        None,
        [],
        Some("<condition>\n ...\n[else\n ...]\nend"),
        Some("Execute a block of commands under condition.")
    ),
    verb!("else", Else, 0, Some(0), [], None, None),
    verb!("break", Break, 0, Some(1), [], Some("[<n>]"), Some("Break from one or more loops.")),
    verb!("end", End, 0, Some(0), [], None, None),
    verb!("sleep", Sleep, 1, Some(1), [], Some("<seconds>"), Some("Sleep for specified time.")),
    verb!(
        "exec",
        Exec,
        1,
        None,
        [Detach],
        Some("[-detach] <command> [<arg>...]"),
        Some("Execute specified command.")
    ),
    verb!(
        "echo",
        Echo,
        0,
        None,
        [],
        Some("<arg>..."),
        Some("Print specified arguments to standard output.")
    ),
    verb!(
        "set",
        Set,
        1,
        Some(2),
        [],
        Some("<var-name> [<value>]"),
        Some("Set specified variable to specified value, or unset it.")
    ),
    verb!("script", Script, 1, Some(1), [], Some("<filename>"), Some("Execute commands from specified file.")),
    verb!("exit", Exit, 0, Some(0), [], Some(""), Some("Finish executing current script.")),
    // `-axis` and `-keys` are positional arguments of `help`
    verb!("help", Help, 0, None, [], Some("[<command> | -axis | -keys]"), Some("Print help information.")),
];

/// Exact-name verb lookup
pub fn find_verb(name: &str) -> Option<&'static VerbInfo> {
    VERBS.iter().find(|v| v.name == name)
}

/// Whether `name` opens, splits or closes a block
pub fn is_block_keyword(name: &str) -> bool {
    matches!(name, "loop" | "if" | "else" | "end")
}

/// Option values collected for one invocation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionValues {
    pub repeat: Option<u64>,
    pub time: Option<f64>,
    pub delay: Option<f64>,
    /// `-r`, `-h` or `-detach`
    pub alt: bool,
}

/// A verb resolved against its descriptor, ready to run
#[derive(Debug)]
pub struct Invocation<'a> {
    pub verb: &'static VerbInfo,
    pub options: OptionValues,
    pub args: &'a [String],
}

impl<'a> Invocation<'a> {
    /// Resolve `words[0]` as a verb and validate the rest of the line
    pub fn parse(words: &'a [String]) -> ScriptResult<Self> {
        let Some((name, rest)) = words.split_first() else {
            return Err(ScriptError::UnknownCommand(String::new()));
        };
        let verb = find_verb(name).ok_or_else(|| ScriptError::UnknownCommand(name.clone()))?;

        let mut options = OptionValues::default();
        let mut seen: Vec<VerbOption> = Vec::new();
        let mut pos = 0;
        if !verb.options.is_empty() {
            while let Some(word) = rest.get(pos) {
                if word == "--" {
                    pos += 1;
                    break;
                }
                let Some(option_name) = word.strip_prefix('-') else {
                    break;
                };
                if option_name.is_empty() || parse_float(word).is_some() {
                    break;
                }
                let option = verb
                    .options
                    .iter()
                    .copied()
                    .find(|o| o.name() == option_name)
                    .ok_or_else(|| ScriptError::UnknownOption {
                        verb: verb.name.to_string(),
                        option: word.clone(),
                    })?;
                if seen.contains(&option) {
                    return Err(ScriptError::DuplicateOption {
                        verb: verb.name.to_string(),
                        option: word.clone(),
                    });
                }
                seen.push(option);

                if option.takes_value() {
                    let value = rest.get(pos + 1).ok_or_else(|| ScriptError::MissingOptionValue {
                        verb: verb.name.to_string(),
                        option: word.clone(),
                    })?;
                    apply_option(verb.name, option, value, &mut options)?;
                    pos += 2;
                } else {
                    options.alt = true;
                    pos += 1;
                }
            }
        }

        let args = &rest[pos..];
        if args.len() < verb.min_args {
            return Err(ScriptError::Arity {
                verb: verb.name.to_string(),
                reason: "not enough arguments".to_string(),
            });
        }
        if verb.max_args.is_some_and(|max| args.len() > max) {
            return Err(ScriptError::Arity {
                verb: verb.name.to_string(),
                reason: "too many arguments".to_string(),
            });
        }

        Ok(Self { verb, options, args })
    }

    pub fn name(&self) -> &'static str {
        self.verb.name
    }
}

fn apply_option(verb: &str, option: VerbOption, value: &str, options: &mut OptionValues) -> ScriptResult<()> {
    match option {
        VerbOption::Repeat => {
            options.repeat = Some(parse_count(verb, "repeat value", value)?);
        }
        VerbOption::Time => {
            options.time = Some(parse_delay(verb, "run time value", value)?);
        }
        VerbOption::Delay => {
            options.delay = Some(parse_delay(verb, "delay value", value)?);
        }
        VerbOption::R | VerbOption::H | VerbOption::Detach => options.alt = true,
    }
    Ok(())
}

/// Parse a strictly positive integer
pub fn parse_count(verb: &str, what: &str, value: &str) -> ScriptResult<u64> {
    if let Some(n) = parse_c_integer(value) {
        if n > 0 {
            return Ok(n);
        }
    } else if !value.trim_start().starts_with('-') {
        return Err(ScriptError::invalid_value(verb, value));
    }
    Err(ScriptError::range(verb, format!("{what} is out of range: {value}")))
}

/// Parse seconds within the accepted delay interval
pub fn parse_delay(verb: &str, what: &str, value: &str) -> ScriptResult<f64> {
    let secs = parse_float(value).ok_or_else(|| ScriptError::invalid_value(verb, value))?;
    if !is_valid_delay(secs) {
        return Err(ScriptError::range(verb, format!("{what} is out of range: {value}")));
    }
    Ok(secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn words(line: &str) -> Vec<String> {
        line.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_lookup_is_exact() {
        assert_eq!(find_verb("key").map(|v| v.opcode), Some(Opcode::Key));
        assert!(find_verb("Key").is_none());
        assert!(find_verb("ke").is_none());
    }

    #[test]
    fn test_unknown_verb() {
        let w = words("frobnicate 1");
        let err = Invocation::parse(&w).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownCommand);
    }

    #[test]
    fn test_options_are_consumed() {
        let w = words("key -repeat 3 -delay 0.1 KEY_A KEY_B");
        let inv = Invocation::parse(&w).unwrap();
        assert_eq!(inv.options.repeat, Some(3));
        assert_eq!(inv.options.delay, Some(0.1));
        assert_eq!(inv.args, &w[5..]);
    }

    #[test]
    fn test_negative_number_is_positional() {
        let w = words("move -r -5 10");
        let inv = Invocation::parse(&w).unwrap();
        assert!(inv.options.alt);
        assert_eq!(inv.args, &["-5".to_string(), "10".to_string()]);
    }

    #[test]
    fn test_double_dash_ends_options() {
        let w = words("exec -- -detach");
        let inv = Invocation::parse(&w).unwrap();
        assert!(!inv.options.alt);
        assert_eq!(inv.args, &["-detach".to_string()]);
    }

    #[test]
    fn test_verbs_without_options_take_dashes_positionally() {
        let w = words("help -axis");
        let inv = Invocation::parse(&w).unwrap();
        assert_eq!(inv.args.len(), 1);
    }

    #[test]
    fn test_option_errors() {
        let kind = |line: &str| Invocation::parse(&words(line)).unwrap_err().kind();
        assert_eq!(kind("key -bogus KEY_A"), ErrorKind::UnknownOption);
        assert_eq!(kind("key -repeat 2 -repeat 3 KEY_A"), ErrorKind::UnknownOption);
        assert_eq!(kind("key -repeat"), ErrorKind::UnknownOption);
        assert_eq!(kind("key -repeat 0 KEY_A"), ErrorKind::Range);
        assert_eq!(kind("key -repeat many KEY_A"), ErrorKind::InvalidValue);
        assert_eq!(kind("key -delay 0.001 KEY_A"), ErrorKind::Range);
        assert_eq!(kind("loop -time 86401"), ErrorKind::Range);
        assert_eq!(kind("wheel -r 1"), ErrorKind::UnknownOption);
    }

    #[test]
    fn test_arity() {
        let kind = |line: &str| Invocation::parse(&words(line)).unwrap_err().kind();
        assert_eq!(kind("move"), ErrorKind::Arity);
        assert_eq!(kind("move 1 2 3 4"), ErrorKind::Arity);
        assert_eq!(kind("else now"), ErrorKind::Arity);
        assert!(Invocation::parse(&words("keydown a b c d e f")).is_ok());
    }
}
