//! Conditions: boolean predicates over an invocation.
//!
//! The engine only needs [`Condition::is_satisfied`]. This module also
//! ships the small set of predicates the built-in valves are usually wired
//! with: closures, attribute checks, boolean combinators, and a minimal
//! comparison expression.

mod expression;

pub use expression::{ComparisonOp, ExpressionCondition};

use crate::context::Invocation;
use std::fmt::{self, Debug};
use std::sync::Arc;

/// A pure predicate over an invocation's attributes.
#[cfg_attr(test, mockall::automock)]
pub trait Condition: Send + Sync + Debug {
    /// Evaluates the predicate.
    fn is_satisfied(&self, ctx: &Invocation) -> bool;
}

/// A closure-based condition.
pub struct FnCondition<F>
where
    F: Fn(&Invocation) -> bool + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnCondition<F>
where
    F: Fn(&Invocation) -> bool + Send + Sync,
{
    /// Creates a new closure-based condition.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnCondition<F>
where
    F: Fn(&Invocation) -> bool + Send + Sync,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl<F> Condition for FnCondition<F>
where
    F: Fn(&Invocation) -> bool + Send + Sync,
{
    fn is_satisfied(&self, ctx: &Invocation) -> bool {
        (self.func)(ctx)
    }
}

/// A condition with a fixed answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Constant(pub bool);

impl Condition for Constant {
    fn is_satisfied(&self, _ctx: &Invocation) -> bool {
        self.0
    }
}

/// Checks a single attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeCondition {
    /// The attribute is set (to anything, including null).
    Exists(String),
    /// The attribute equals the given value.
    Equals(String, serde_json::Value),
    /// The attribute is truthy: `true`, a non-zero number, a non-empty
    /// string, array or object.
    IsTrue(String),
}

impl AttributeCondition {
    /// The attribute is set.
    #[must_use]
    pub fn exists(key: impl Into<String>) -> Self {
        Self::Exists(key.into())
    }

    /// The attribute equals `value`.
    #[must_use]
    pub fn equals(key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self::Equals(key.into(), value.into())
    }

    /// The attribute is truthy.
    #[must_use]
    pub fn is_true(key: impl Into<String>) -> Self {
        Self::IsTrue(key.into())
    }
}

impl Condition for AttributeCondition {
    fn is_satisfied(&self, ctx: &Invocation) -> bool {
        match self {
            Self::Exists(key) => ctx.attribute(key).is_some(),
            Self::Equals(key, expected) => ctx.attribute(key) == Some(expected),
            Self::IsTrue(key) => ctx.attribute(key).is_some_and(is_truthy),
        }
    }
}

/// Truthiness used by [`AttributeCondition::IsTrue`] and bare expressions.
#[must_use]
pub fn is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(a) => !a.is_empty(),
        serde_json::Value::Object(o) => !o.is_empty(),
    }
}

/// Negates a condition.
#[derive(Debug, Clone)]
pub struct Not(pub Arc<dyn Condition>);

impl Not {
    /// Creates a negation.
    #[must_use]
    pub fn new(condition: impl Condition + 'static) -> Self {
        Self(Arc::new(condition))
    }
}

impl Condition for Not {
    fn is_satisfied(&self, ctx: &Invocation) -> bool {
        !self.0.is_satisfied(ctx)
    }
}

/// Satisfied when every inner condition is; short-circuits in order.
/// An empty list is satisfied.
#[derive(Debug, Clone, Default)]
pub struct All(pub Vec<Arc<dyn Condition>>);

impl All {
    /// Creates an empty conjunction.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a condition.
    #[must_use]
    pub fn and(mut self, condition: impl Condition + 'static) -> Self {
        self.0.push(Arc::new(condition));
        self
    }
}

impl Condition for All {
    fn is_satisfied(&self, ctx: &Invocation) -> bool {
        self.0.iter().all(|c| c.is_satisfied(ctx))
    }
}

/// Satisfied when any inner condition is; short-circuits in order.
/// An empty list is not satisfied.
#[derive(Debug, Clone, Default)]
pub struct Any(pub Vec<Arc<dyn Condition>>);

impl Any {
    /// Creates an empty disjunction.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a condition.
    #[must_use]
    pub fn or(mut self, condition: impl Condition + 'static) -> Self {
        self.0.push(Arc::new(condition));
        self
    }
}

impl Condition for Any {
    fn is_satisfied(&self, ctx: &Invocation) -> bool {
        self.0.iter().any(|c| c.is_satisfied(ctx))
    }
}
