//! Condition evaluator for `if`
//!
//! Conditions are evaluated in a single left-to-right pass with an operator
//! stack and an operand stack. Operands are floating point numbers; boolean
//! results are `0.0` and `1.0`.
//!
//! Precedence, highest first: parentheses, `-not`, comparisons
//! (`-eq -ne -lt -gt -le -ge`), `-and`, `-or`. Operators of equal
//! precedence associate left to right.

use ud_core::parse_float;

use crate::error::{ScriptError, ScriptResult};

/// Maximum depth of either evaluation stack
pub const MAX_STACK_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Open,
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Not,
}

impl Operator {
    fn binary(token: &str) -> Option<Self> {
        Some(match token {
            "-or" => Operator::Or,
            "-and" => Operator::And,
            "-eq" => Operator::Eq,
            "-ne" => Operator::Ne,
            "-lt" => Operator::Lt,
            "-gt" => Operator::Gt,
            "-le" => Operator::Le,
            "-ge" => Operator::Ge,
            _ => return None,
        })
    }

    fn precedence(self) -> u8 {
        match self {
            Operator::Open => 0,
            Operator::Or => 1,
            Operator::And => 2,
            Operator::Eq | Operator::Ne | Operator::Lt | Operator::Gt | Operator::Le | Operator::Ge => 3,
            Operator::Not => 4,
        }
    }
}

fn truth(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

struct Evaluator<'a> {
    verb: &'a str,
    operators: Vec<Operator>,
    operands: Vec<f64>,
    expect_operand: bool,
}

impl<'a> Evaluator<'a> {
    fn new(verb: &'a str) -> Self {
        Self {
            verb,
            operators: Vec::new(),
            operands: Vec::new(),
            expect_operand: true,
        }
    }

    fn error(&self, reason: impl Into<String>) -> ScriptError {
        ScriptError::InvalidExpression {
            verb: self.verb.to_string(),
            reason: reason.into(),
        }
    }

    fn push_operator(&mut self, op: Operator) -> ScriptResult<()> {
        if self.operators.len() >= MAX_STACK_DEPTH {
            return Err(self.error("expression is too complex"));
        }
        self.operators.push(op);
        Ok(())
    }

    fn push_operand(&mut self, value: f64) -> ScriptResult<()> {
        if self.operands.len() >= MAX_STACK_DEPTH {
            return Err(self.error("expression is too complex"));
        }
        self.operands.push(value);
        Ok(())
    }

    fn pop_operand(&mut self) -> ScriptResult<f64> {
        self.operands.pop().ok_or_else(|| self.error("missing operand"))
    }

    fn apply(&mut self, op: Operator) -> ScriptResult<()> {
        let result = match op {
            Operator::Not => truth(self.pop_operand()? == 0.0),
            Operator::Open => return Err(self.error("unmatched (")),
            _ => {
                let rhs = self.pop_operand()?;
                let lhs = self.pop_operand()?;
                match op {
                    Operator::Or => truth(lhs != 0.0 || rhs != 0.0),
                    Operator::And => truth(lhs != 0.0 && rhs != 0.0),
                    Operator::Eq => truth(lhs == rhs),
                    Operator::Ne => truth(lhs != rhs),
                    Operator::Lt => truth(lhs < rhs),
                    Operator::Gt => truth(lhs > rhs),
                    Operator::Le => truth(lhs <= rhs),
                    Operator::Ge => truth(lhs >= rhs),
                    Operator::Not | Operator::Open => return Err(self.error("malformed expression")),
                }
            }
        };
        self.push_operand(result)
    }

    /// Apply stacked operators binding at least as tightly as `precedence`
    fn reduce(&mut self, precedence: u8) -> ScriptResult<()> {
        while let Some(&top) = self.operators.last() {
            if top == Operator::Open || top.precedence() < precedence {
                break;
            }
            self.operators.pop();
            self.apply(top)?;
        }
        Ok(())
    }

    fn token(&mut self, token: &str) -> ScriptResult<()> {
        if self.expect_operand {
            match token {
                "(" => self.push_operator(Operator::Open),
                "-not" => self.push_operator(Operator::Not),
                ")" => Err(self.error("missing operand before )")),
                _ if Operator::binary(token).is_some() => {
                    Err(self.error(format!("missing operand before {token}")))
                }
                _ => {
                    let value = parse_float(token)
                        .ok_or_else(|| self.error(format!("not a number: {token}")))?;
                    self.expect_operand = false;
                    self.push_operand(value)
                }
            }
        } else if token == ")" {
            self.reduce(1)?;
            match self.operators.pop() {
                Some(Operator::Open) => Ok(()),
                _ => Err(self.error("unmatched )")),
            }
        } else if let Some(op) = Operator::binary(token) {
            self.reduce(op.precedence())?;
            self.expect_operand = true;
            self.push_operator(op)
        } else {
            Err(self.error(format!("missing operator before {token}")))
        }
    }

    fn finish(mut self) -> ScriptResult<bool> {
        if self.expect_operand {
            return Err(self.error("missing operand at end of expression"));
        }
        while let Some(op) = self.operators.pop() {
            self.apply(op)?;
        }
        match self.operands.as_slice() {
            [value] => Ok(*value != 0.0),
            _ => Err(self.error("malformed expression")),
        }
    }
}

/// Evaluate a condition given as separate words
pub fn evaluate(verb: &str, words: &[String]) -> ScriptResult<bool> {
    let mut evaluator = Evaluator::new(verb);
    for word in words {
        evaluator.token(word)?;
    }
    evaluator.finish()
}
