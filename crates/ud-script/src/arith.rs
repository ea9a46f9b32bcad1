//! Integer arithmetic for `$((...))`
//!
//! Supports the C operators a shell offers: unary `+ - ! ~`, the usual
//! binary operators from `*` down to `||`, and `?:`. Bare names and `$NAME`
//! read variables; unset or empty variables count as zero.

use ud_core::parse_c_signed;

use crate::error::{ScriptError, ScriptResult};
use crate::variables::Variables;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(i64),
    Op(&'static str),
    Open,
    Close,
    Question,
    Colon,
}

/// Deepest nesting of parentheses, unary operators and `?:` the parser follows
const MAX_NESTING: usize = 256;

const OPERATORS: &[&str] = &[
    "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "+", "-", "*", "/", "%", "<", ">", "&", "^", "|", "!",
    "~",
];

fn error(reason: impl Into<String>) -> ScriptError {
    ScriptError::Parse(format!("arithmetic: {}", reason.into()))
}

fn variable_value(name: &str, vars: &Variables) -> ScriptResult<i64> {
    match vars.get(name) {
        None => Ok(0),
        Some(text) if text.trim().is_empty() => Ok(0),
        Some(text) => parse_c_signed(text.trim())
            .ok_or_else(|| error(format!("{name}: not an integer: {text}"))),
    }
}

fn tokenize(expr: &str, vars: &Variables) -> ScriptResult<Vec<Token>> {
    let chars: Vec<char> = expr.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_alphanumeric() {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            let value = parse_c_signed(&text).ok_or_else(|| error(format!("bad number: {text}")))?;
            tokens.push(Token::Number(value));
        } else if c == '$' || c.is_ascii_alphabetic() || c == '_' {
            if c == '$' {
                i += 1;
            }
            let braced = chars.get(i) == Some(&'{');
            if braced {
                i += 1;
            }
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            if start == i {
                return Err(error("bad variable reference"));
            }
            let name: String = chars[start..i].iter().collect();
            if braced {
                if chars.get(i) != Some(&'}') {
                    return Err(error("missing }"));
                }
                i += 1;
            }
            tokens.push(Token::Number(variable_value(&name, vars)?));
        } else {
            let rest: String = chars[i..].iter().take(2).collect();
            let token = match c {
                '(' => Token::Open,
                ')' => Token::Close,
                '?' => Token::Question,
                ':' => Token::Colon,
                _ => {
                    let op = OPERATORS
                        .iter()
                        .find(|op| rest.starts_with(**op))
                        .ok_or_else(|| error(format!("unexpected character {c:?}")))?;
                    i += op.len() - 1;
                    Token::Op(op)
                }
            };
            i += 1;
            tokens.push(token);
        }
    }
    Ok(tokens)
}

fn binary_precedence(op: &str) -> Option<u8> {
    Some(match op {
        "||" => 1,
        "&&" => 2,
        "|" => 3,
        "^" => 4,
        "&" => 5,
        "==" | "!=" => 6,
        "<" | "<=" | ">" | ">=" => 7,
        "<<" | ">>" => 8,
        "+" | "-" => 9,
        "*" | "/" | "%" => 10,
        _ => return None,
    })
}

fn apply_binary(op: &str, lhs: i64, rhs: i64) -> ScriptResult<i64> {
    Ok(match op {
        "||" => i64::from(lhs != 0 || rhs != 0),
        "&&" => i64::from(lhs != 0 && rhs != 0),
        "|" => lhs | rhs,
        "^" => lhs ^ rhs,
        "&" => lhs & rhs,
        "==" => i64::from(lhs == rhs),
        "!=" => i64::from(lhs != rhs),
        "<" => i64::from(lhs < rhs),
        "<=" => i64::from(lhs <= rhs),
        ">" => i64::from(lhs > rhs),
        ">=" => i64::from(lhs >= rhs),
        "<<" => lhs.wrapping_shl(rhs as u32),
        ">>" => lhs.wrapping_shr(rhs as u32),
        "+" => lhs.wrapping_add(rhs),
        "-" => lhs.wrapping_sub(rhs),
        "*" => lhs.wrapping_mul(rhs),
        "/" | "%" if rhs == 0 => return Err(error("division by zero")),
        "/" => lhs.wrapping_div(rhs),
        "%" => lhs.wrapping_rem(rhs),
        _ => return Err(error(format!("unknown operator {op}"))),
    })
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token, what: &str) -> ScriptResult<()> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            _ => Err(error(format!("expected {what}"))),
        }
    }

    fn nested(&mut self, parse: fn(&mut Self) -> ScriptResult<i64>) -> ScriptResult<i64> {
        if self.depth >= MAX_NESTING {
            return Err(error("expression is too complex"));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn ternary(&mut self) -> ScriptResult<i64> {
        self.nested(Self::conditional)
    }

    fn conditional(&mut self) -> ScriptResult<i64> {
        let cond = self.binary(1)?;
        if self.peek() != Some(&Token::Question) {
            return Ok(cond);
        }
        self.pos += 1;
        let when_true = self.ternary()?;
        self.expect(Token::Colon, "':'")?;
        let when_false = self.ternary()?;
        Ok(if cond != 0 { when_true } else { when_false })
    }

    fn binary(&mut self, min_precedence: u8) -> ScriptResult<i64> {
        let mut lhs = self.unary()?;
        while let Some(Token::Op(op)) = self.peek() {
            let op = *op;
            let Some(precedence) = binary_precedence(op) else {
                break;
            };
            if precedence < min_precedence {
                break;
            }
            self.pos += 1;
            let rhs = self.binary(precedence + 1)?;
            lhs = apply_binary(op, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> ScriptResult<i64> {
        self.nested(Self::operand)
    }

    fn operand(&mut self) -> ScriptResult<i64> {
        match self.next() {
            Some(Token::Number(value)) => Ok(value),
            Some(Token::Open) => {
                let value = self.ternary()?;
                self.expect(Token::Close, "')'")?;
                Ok(value)
            }
            Some(Token::Op("-")) => Ok(self.unary()?.wrapping_neg()),
            Some(Token::Op("+")) => self.unary(),
            Some(Token::Op("!")) => Ok(i64::from(self.unary()? == 0)),
            Some(Token::Op("~")) => Ok(!self.unary()?),
            Some(other) => Err(error(format!("unexpected {other:?}"))),
            None => Err(error("missing operand")),
        }
    }
}

/// Evaluate an arithmetic expansion body
pub fn evaluate(expr: &str, vars: &Variables) -> ScriptResult<i64> {
    let tokens = tokenize(expr, vars)?;
    if tokens.is_empty() {
        return Ok(0);
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.ternary()?;
    if parser.pos < parser.tokens.len() {
        return Err(error("trailing tokens"));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(expr: &str) -> ScriptResult<i64> {
        evaluate(expr, &Variables::new())
    }

    #[test]
    fn test_precedence_and_grouping() {
        assert_eq!(eval("1 + 2 * 3").unwrap(), 7);
        assert_eq!(eval("(1 + 2) * 3").unwrap(), 9);
        assert_eq!(eval("10 - 4 - 3").unwrap(), 3);
        assert_eq!(eval("1 << 4 | 1").unwrap(), 17);
        assert_eq!(eval("-3 + +5").unwrap(), 2);
        assert_eq!(eval("!0 && ~0 == -1").unwrap(), 1);
    }

    #[test]
    fn test_radix_and_ternary() {
        assert_eq!(eval("0x10 + 010").unwrap(), 24);
        assert_eq!(eval("2 > 1 ? 5 : 6").unwrap(), 5);
        assert_eq!(eval("").unwrap(), 0);
    }

    #[test]
    fn test_variables() {
        let mut vars = Variables::new();
        vars.set("N", "4");
        vars.set("EMPTY", "");
        vars.set("WORD", "four");
        assert_eq!(evaluate("N * 2", &vars).unwrap(), 8);
        assert_eq!(evaluate("$N + ${N}", &vars).unwrap(), 8);
        assert_eq!(evaluate("EMPTY + UD_TEST_SURELY_UNSET", &vars).unwrap(), 0);
        assert!(evaluate("WORD + 1", &vars).is_err());
    }

    #[test]
    fn test_errors() {
        assert!(eval("1 / 0").is_err());
        assert!(eval("5 % 0").is_err());
        assert!(eval("(1 + 2").is_err());
        assert!(eval("1 2").is_err());
        assert!(eval("1 @ 2").is_err());
    }

    #[test]
    fn test_nesting_limit() {
        let shallow = format!("{}1{}", "(".repeat(20), ")".repeat(20));
        assert_eq!(eval(&shallow).unwrap(), 1);
        assert_eq!(eval(&format!("{}1", "- ".repeat(100))).unwrap(), 1);

        let deep = format!("{}1{}", "(".repeat(50_000), ")".repeat(50_000));
        let err = eval(&deep).unwrap_err();
        assert!(err.to_string().contains("too complex"), "{err}");
        assert!(eval(&format!("{}1", "!".repeat(50_000))).is_err());
        assert!(eval(&format!("{}1{}", "1 ? ".repeat(50_000), " : 0".repeat(50_000))).is_err());
    }
}
