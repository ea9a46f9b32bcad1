//! Shell-style word splitting
//!
//! A script line is turned into words the way a POSIX shell would: quoting,
//! backslash escapes, tilde, parameter, command and arithmetic expansion,
//! field splitting of unquoted expansion results, pathname expansion and
//! quote removal. Operators such as `|`, `;` or `>` have no meaning here and
//! are ordinary characters.

use std::process::{Command, Stdio};
use tracing::trace;

use crate::arith;
use crate::error::{ScriptError, ScriptResult};
use crate::variables::Variables;

/// Characters separating fields after expansion
const FIELD_SEPARATORS: &[char] = &[' ', '\t', '\n'];

/// How a piece of a word was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    /// Unquoted literal text: subject to pathname expansion
    Literal,
    /// Quoted or escaped text: taken as is
    Quoted,
    /// Unquoted expansion result: subject to field splitting and pathname expansion
    Expanded,
}

#[derive(Debug, Clone)]
struct Piece {
    text: String,
    origin: Origin,
}

/// A field after splitting, remembering which characters may glob
#[derive(Debug, Default)]
struct Field {
    pieces: Vec<Piece>,
    present: bool,
}

impl Field {
    fn push(&mut self, text: &str, origin: Origin) {
        self.present = true;
        match self.pieces.last_mut() {
            Some(last) if last.origin == origin => last.text.push_str(text),
            _ => self.pieces.push(Piece {
                text: text.to_string(),
                origin,
            }),
        }
    }

    fn literal(&self) -> String {
        self.pieces.iter().map(|p| p.text.as_str()).collect()
    }

    fn glob_pattern(&self) -> Option<String> {
        let mut has_magic = false;
        let mut pattern = String::new();
        for piece in &self.pieces {
            if piece.origin == Origin::Quoted {
                pattern.push_str(&glob::Pattern::escape(&piece.text));
            } else {
                has_magic |= piece.text.contains(&['*', '?', '['][..]);
                pattern.push_str(&piece.text);
            }
        }
        has_magic.then_some(pattern)
    }
}

fn parse_error(reason: impl Into<String>) -> ScriptError {
    ScriptError::Parse(reason.into())
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

struct Lexer<'a> {
    chars: Vec<char>,
    pos: usize,
    vars: &'a Variables,
    pathname_expansion: bool,
}

impl<'a> Lexer<'a> {
    fn new(text: &str, vars: &'a Variables) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            vars,
            pathname_expansion: true,
        }
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn words(mut self) -> ScriptResult<Vec<String>> {
        let mut words = Vec::new();
        while let Some(pieces) = self.next_word()? {
            for field in split_fields(pieces) {
                self.expand_pathname(field, &mut words);
            }
        }
        Ok(words)
    }

    /// Scan one word, or `None` at end of line or start of a comment
    fn next_word(&mut self) -> ScriptResult<Option<Vec<Piece>>> {
        while self.peek_at(0).is_some_and(|c| FIELD_SEPARATORS.contains(&c)) {
            self.pos += 1;
        }
        match self.peek_at(0) {
            None | Some('#') => return Ok(None),
            Some(_) => {}
        }

        let mut word = Field::default();
        if self.peek_at(0) == Some('~') {
            self.tilde(&mut word);
        }
        while let Some(c) = self.peek_at(0) {
            if FIELD_SEPARATORS.contains(&c) {
                break;
            }
            match c {
                '\'' => {
                    self.pos += 1;
                    let text = self.take_until('\'').ok_or_else(|| parse_error("unterminated single quote"))?;
                    word.push(&text, Origin::Quoted);
                }
                '"' => {
                    self.pos += 1;
                    self.double_quoted(&mut word)?;
                }
                '\\' => {
                    self.pos += 1;
                    match self.peek_at(0) {
                        Some('\n') => self.pos += 1,
                        Some(escaped) => {
                            self.pos += 1;
                            word.push(escaped.encode_utf8(&mut [0; 4]), Origin::Quoted);
                        }
                        None => word.push("\\", Origin::Quoted),
                    }
                }
                '$' => {
                    self.pos += 1;
                    match self.dollar()? {
                        Some(text) => word.push(&text, Origin::Expanded),
                        None => word.push("$", Origin::Literal),
                    }
                }
                '`' => {
                    self.pos += 1;
                    let text = self.backquoted()?;
                    word.push(&text, Origin::Expanded);
                }
                _ => {
                    self.pos += 1;
                    word.push(c.encode_utf8(&mut [0; 4]), Origin::Literal);
                }
            }
        }
        Ok(Some(word.pieces))
    }

    fn take_until(&mut self, end: char) -> Option<String> {
        let start = self.pos;
        let len = self.chars[start..].iter().position(|&c| c == end)?;
        self.pos = start + len + 1;
        Some(self.chars[start..start + len].iter().collect())
    }

    /// `~` or `~/...` at the start of a word
    fn tilde(&mut self, word: &mut Field) {
        match self.peek_at(1) {
            None | Some('/') => {}
            Some(c) if FIELD_SEPARATORS.contains(&c) => {}
            Some(_) => return,
        }
        self.pos += 1;
        let vars = self.vars;
        let home = shellexpand::tilde_with_context("~", || vars.get("HOME"));
        word.push(&home, Origin::Quoted);
    }

    fn double_quoted(&mut self, word: &mut Field) -> ScriptResult<()> {
        // An empty pair of quotes still produces a field
        word.push("", Origin::Quoted);
        loop {
            let Some(c) = self.peek_at(0) else {
                return Err(parse_error("unterminated double quote"));
            };
            self.pos += 1;
            match c {
                '"' => return Ok(()),
                '\\' => match self.peek_at(0) {
                    Some('\n') => self.pos += 1,
                    Some(escaped @ ('$' | '`' | '"' | '\\')) => {
                        self.pos += 1;
                        word.push(escaped.encode_utf8(&mut [0; 4]), Origin::Quoted);
                    }
                    _ => word.push("\\", Origin::Quoted),
                },
                '$' => {
                    let text = self.dollar()?.unwrap_or_else(|| "$".to_string());
                    word.push(&text, Origin::Quoted);
                }
                '`' => {
                    let text = self.backquoted()?;
                    word.push(&text, Origin::Quoted);
                }
                _ => word.push(c.encode_utf8(&mut [0; 4]), Origin::Quoted),
            }
        }
    }

    /// Expansion following a `$`; `None` leaves the `$` literal
    fn dollar(&mut self) -> ScriptResult<Option<String>> {
        match self.peek_at(0) {
            Some('(') if self.peek_at(1) == Some('(') => {
                self.pos += 2;
                let body = self.arithmetic_body()?;
                let value = arith::evaluate(&body, self.vars)?;
                Ok(Some(value.to_string()))
            }
            Some('(') => {
                self.pos += 1;
                let body = self.command_body()?;
                command_output(&body, self.vars).map(Some)
            }
            Some('{') => {
                self.pos += 1;
                self.braced_parameter().map(Some)
            }
            Some('$') => {
                self.pos += 1;
                Ok(Some(std::process::id().to_string()))
            }
            Some(c) if is_name_start(c) => {
                let start = self.pos;
                while self.peek_at(0).is_some_and(is_name_char) {
                    self.pos += 1;
                }
                let name: String = self.chars[start..self.pos].iter().collect();
                Ok(Some(self.vars.get(&name).unwrap_or_default()))
            }
            Some(c) if c.is_ascii_digit() => {
                // No positional parameters are ever set
                self.pos += 1;
                Ok(Some(String::new()))
            }
            _ => Ok(None),
        }
    }

    /// Text up to the `))` closing an arithmetic expansion
    fn arithmetic_body(&mut self) -> ScriptResult<String> {
        let start = self.pos;
        let mut depth = 0usize;
        while let Some(c) = self.peek_at(0) {
            match c {
                '(' => depth += 1,
                ')' if depth > 0 => depth -= 1,
                ')' if self.peek_at(1) == Some(')') => {
                    let body = self.chars[start..self.pos].iter().collect();
                    self.pos += 2;
                    return Ok(body);
                }
                ')' => return Err(parse_error("unbalanced parentheses in arithmetic expansion")),
                _ => {}
            }
            self.pos += 1;
        }
        Err(parse_error("unterminated arithmetic expansion"))
    }

    /// Text up to the `)` closing a command substitution
    fn command_body(&mut self) -> ScriptResult<String> {
        let start = self.pos;
        let mut depth = 0usize;
        while let Some(c) = self.peek_at(0) {
            match c {
                '\\' => self.pos += 1,
                '\'' | '"' => {
                    let quote = c;
                    self.pos += 1;
                    while let Some(q) = self.peek_at(0) {
                        if q == '\\' && quote == '"' {
                            self.pos += 1;
                        } else if q == quote {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                '(' => depth += 1,
                ')' if depth == 0 => {
                    let body = self.chars[start..self.pos].iter().collect();
                    self.pos += 1;
                    return Ok(body);
                }
                ')' => depth -= 1,
                _ => {}
            }
            self.pos += 1;
        }
        Err(parse_error("unterminated command substitution"))
    }

    fn backquoted(&mut self) -> ScriptResult<String> {
        let mut body = String::new();
        loop {
            let Some(c) = self.peek_at(0) else {
                return Err(parse_error("unterminated command substitution"));
            };
            self.pos += 1;
            match c {
                '`' => break,
                '\\' => match self.peek_at(0) {
                    Some(escaped @ ('`' | '\\' | '$')) => {
                        self.pos += 1;
                        body.push(escaped);
                    }
                    _ => body.push('\\'),
                },
                _ => body.push(c),
            }
        }
        command_output(&body, self.vars)
    }

    /// `${...}` forms after the opening brace
    fn braced_parameter(&mut self) -> ScriptResult<String> {
        let start = self.pos;
        let mut depth = 0usize;
        loop {
            match self.peek_at(0) {
                None => return Err(parse_error("unterminated parameter expansion")),
                Some('{') => depth += 1,
                Some('}') if depth == 0 => break,
                Some('}') => depth -= 1,
                Some(_) => {}
            }
            self.pos += 1;
        }
        let body: String = self.chars[start..self.pos].iter().collect();
        self.pos += 1;

        if let Some(name) = body.strip_prefix('#') {
            if !name.is_empty() && name.chars().all(is_name_char) {
                let len = self.vars.get(name).map_or(0, |v| v.chars().count());
                return Ok(len.to_string());
            }
        }

        let name_len = body.chars().take_while(|&c| is_name_char(c)).count();
        let (name, rest) = body.split_at(name_len);
        if name.is_empty() || !name.starts_with(is_name_start) {
            return Err(parse_error(format!("bad substitution: ${{{body}}}")));
        }
        let value = self.vars.get(name);
        let (null_counts, op, word) = match rest.strip_prefix(':') {
            Some(after) => (true, after.chars().next(), after.get(1..).unwrap_or("")),
            None => (false, rest.chars().next(), rest.get(1..).unwrap_or("")),
        };
        let is_set = match &value {
            Some(v) => !(null_counts && v.is_empty()),
            None => false,
        };
        match op {
            None if !null_counts => Ok(value.unwrap_or_default()),
            Some('-') if is_set => Ok(value.unwrap_or_default()),
            Some('-') => self.expand_nested(word),
            Some('+') if is_set => self.expand_nested(word),
            Some('+') => Ok(String::new()),
            _ => Err(parse_error(format!("bad substitution: ${{{body}}}"))),
        }
    }

    /// Expand the word of `${NAME:-word}` and similar forms
    fn expand_nested(&self, word: &str) -> ScriptResult<String> {
        let mut nested = Lexer::new(word, self.vars);
        nested.pathname_expansion = false;
        Ok(nested.words()?.join(" "))
    }

    fn expand_pathname(&self, field: Field, words: &mut Vec<String>) {
        let pattern = match field.glob_pattern() {
            Some(pattern) if self.pathname_expansion => pattern,
            _ => {
                words.push(field.literal());
                return;
            }
        };
        let matches: Vec<String> = match glob::glob(&pattern) {
            Ok(paths) => paths
                .filter_map(Result::ok)
                .map(|path| path.to_string_lossy().into_owned())
                .collect(),
            Err(e) => {
                trace!(pattern = %pattern, error = %e, "invalid pathname pattern");
                Vec::new()
            }
        };
        if matches.is_empty() {
            words.push(field.literal());
        } else {
            words.extend(matches);
        }
    }
}

/// Split unquoted expansion results into separate fields
fn split_fields(pieces: Vec<Piece>) -> Vec<Field> {
    let mut fields = Vec::new();
    let mut current = Field::default();
    for piece in pieces {
        if piece.origin != Origin::Expanded {
            current.push(&piece.text, piece.origin);
            continue;
        }
        for c in piece.text.chars() {
            if FIELD_SEPARATORS.contains(&c) {
                if current.present {
                    fields.push(std::mem::take(&mut current));
                }
            } else {
                current.push(c.encode_utf8(&mut [0; 4]), Origin::Expanded);
            }
        }
    }
    if current.present {
        fields.push(current);
    }
    fields
}

/// Run `script` through `sh -c` and capture its output
fn command_output(script: &str, vars: &Variables) -> ScriptResult<String> {
    trace!(script, "command substitution");
    let mut command = Command::new("sh");
    command
        .arg("-c")
        .arg(script)
        .stdin(Stdio::null())
        .stderr(Stdio::inherit());
    vars.apply_to(&mut command);
    let output = command
        .output()
        .map_err(|e| ScriptError::ChildProcess(format!("sh: {e}")))?;
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    while text.ends_with('\n') {
        text.pop();
    }
    Ok(text)
}

/// Expand a script line into words
pub fn split_words(line: &str, vars: &Variables) -> ScriptResult<Vec<String>> {
    Lexer::new(line, vars).words()
}

/// The first whitespace-separated word of a line, before any expansion
pub fn first_raw_word(line: &str) -> &str {
    line.split_whitespace().next().unwrap_or("")
}
