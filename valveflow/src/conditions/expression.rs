//! A minimal attribute comparison language.
//!
//! Accepted forms:
//!
//! - `name`: the attribute is truthy
//! - `!name`: the attribute is not truthy
//! - `name <op> literal` with `<op>` one of `==`, `!=`, `<`, `<=`, `>`, `>=`
//!
//! Literals are integers, floats, `true`, `false`, `null`, or single- or
//! double-quoted strings. Ordering operators compare numbers only; any
//! comparison against a missing attribute is false except `!=`.

use super::{is_truthy, Condition};
use crate::context::Invocation;
use crate::errors::PipelineValidationError;
use regex::Regex;
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::sync::OnceLock;

static COMPARISON: OnceLock<Regex> = OnceLock::new();
static BARE: OnceLock<Regex> = OnceLock::new();

fn comparison_regex() -> &'static Regex {
    COMPARISON.get_or_init(|| {
        Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_.\-]*)\s*(==|!=|<=|>=|<|>)\s*(.+?)\s*$")
            .unwrap_or_else(|_| panic!("static comparison pattern failed to compile"))
    })
}

fn bare_regex() -> &'static Regex {
    BARE.get_or_init(|| {
        Regex::new(r"^\s*(!?)\s*([A-Za-z_][A-Za-z0-9_.\-]*)\s*$")
            .unwrap_or_else(|_| panic!("static bare-name pattern failed to compile"))
    })
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl ComparisonOp {
    fn parse(op: &str) -> Option<Self> {
        Some(match op {
            "==" => Self::Eq,
            "!=" => Self::Ne,
            "<" => Self::Lt,
            "<=" => Self::Le,
            ">" => Self::Gt,
            ">=" => Self::Ge,
            _ => return None,
        })
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }

    fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Truthy { key: String, negate: bool },
    Compare { key: String, op: ComparisonOp, value: Value },
}

/// A condition parsed from a short expression string.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionCondition {
    source: String,
    expr: Expr,
}

impl ExpressionCondition {
    /// Parses an expression.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineValidationError`] with code
    /// `CONTRACT-VALVE-BAD_EXPRESSION` if the text does not parse.
    pub fn parse(source: &str) -> Result<Self, PipelineValidationError> {
        if let Some(caps) = bare_regex().captures(source) {
            return Ok(Self {
                source: source.trim().to_string(),
                expr: Expr::Truthy {
                    key: caps[2].to_string(),
                    negate: !caps[1].is_empty(),
                },
            });
        }

        let caps = comparison_regex().captures(source).ok_or_else(|| {
            PipelineValidationError::bad_expression(
                source,
                "expected `name`, `!name` or `name <op> literal`",
            )
        })?;
        let op = ComparisonOp::parse(&caps[2])
            .ok_or_else(|| PipelineValidationError::bad_expression(source, "unknown operator"))?;
        let value = parse_literal(&caps[3])
            .ok_or_else(|| PipelineValidationError::bad_expression(source, "unrecognised literal"))?;

        Ok(Self {
            source: source.trim().to_string(),
            expr: Expr::Compare {
                key: caps[1].to_string(),
                op,
                value,
            },
        })
    }

    /// Returns the expression text.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }
}

fn parse_literal(raw: &str) -> Option<Value> {
    let raw = raw.trim();
    match raw {
        "true" => return Some(Value::Bool(true)),
        "false" => return Some(Value::Bool(false)),
        "null" => return Some(Value::Null),
        _ => {}
    }

    for quote in ['"', '\''] {
        if raw.len() >= 2 && raw.starts_with(quote) && raw.ends_with(quote) {
            return Some(Value::String(raw[1..raw.len() - 1].to_string()));
        }
    }

    if let Ok(n) = raw.parse::<i64>() {
        return Some(Value::from(n));
    }
    raw.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
}

fn compare(actual: &Value, expected: &Value) -> Option<Ordering> {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (a, b) if a == b => Some(Ordering::Equal),
        _ => None,
    }
}

impl Condition for ExpressionCondition {
    fn is_satisfied(&self, ctx: &Invocation) -> bool {
        match &self.expr {
            Expr::Truthy { key, negate } => ctx.attribute(key).is_some_and(is_truthy) != *negate,
            Expr::Compare { key, op, value } => {
                let Some(actual) = ctx.attribute(key) else {
                    return *op == ComparisonOp::Ne;
                };
                match (op, compare(actual, value)) {
                    (_, Some(ordering)) => op.holds(ordering),
                    // Unordered values are only ever unequal.
                    (ComparisonOp::Ne, None) => true,
                    _ => false,
                }
            }
        }
    }
}

impl fmt::Display for ExpressionCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.expr {
            Expr::Truthy { key, negate } => {
                write!(f, "{}{key}", if *negate { "!" } else { "" })
            }
            Expr::Compare { key, op, value } => write!(f, "{key} {} {value}", op.as_str()),
        }
    }
}
