//! Leaf valves: units of work that own no child pipelines.

use super::Valve;
use crate::context::Invocation;
use crate::errors::ValveError;
use std::fmt::{self, Debug};
use tracing::{info, Level};

/// Whether an [`FnValve`] lets the rest of its pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Proceed to the next valve.
    Continue,
    /// Stop the current pipeline without requesting a break.
    Halt,
}

/// A valve that only proceeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughValve;

impl PassThroughValve {
    /// Creates a new pass-through valve.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Valve for PassThroughValve {
    fn name(&self) -> &str {
        "pass-through"
    }

    fn invoke(&self, ctx: &mut Invocation) -> Result<(), ValveError> {
        ctx.proceed()
    }
}

/// A closure-based valve.
///
/// The closure may read and write attributes, request breaks, or even call
/// `proceed()` itself (in which case it should return [`Flow::Halt`]).
/// Errors are raised on the exception channel under the valve's name;
/// valve errors coming back from `proceed()` pass through untouched.
pub struct FnValve<F>
where
    F: Fn(&mut Invocation) -> anyhow::Result<Flow> + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnValve<F>
where
    F: Fn(&mut Invocation) -> anyhow::Result<Flow> + Send + Sync,
{
    /// Creates a new function-based valve.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnValve<F>
where
    F: Fn(&mut Invocation) -> anyhow::Result<Flow> + Send + Sync,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnValve").field("name", &self.name).finish()
    }
}

impl<F> Valve for FnValve<F>
where
    F: Fn(&mut Invocation) -> anyhow::Result<Flow> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(&self, ctx: &mut Invocation) -> Result<(), ValveError> {
        match (self.func)(ctx) {
            Ok(Flow::Continue) => ctx.proceed(),
            Ok(Flow::Halt) => Ok(()),
            Err(err) => match err.downcast::<ValveError>() {
                Ok(valve_error) => Err(valve_error),
                Err(other) => Err(ValveError::failed(self.name.clone(), other)),
            },
        }
    }
}

/// Logs a message and proceeds.
///
/// `{name}` placeholders are replaced with the attribute of that name;
/// unknown names are left as written.
#[derive(Debug, Clone)]
pub struct LogValve {
    message: String,
    level: Level,
}

impl LogValve {
    /// Creates an info-level log valve.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: Level::INFO,
        }
    }

    /// Sets the log level.
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Renders the message against the invocation's attributes.
    #[must_use]
    pub fn render(&self, ctx: &Invocation) -> String {
        let mut out = String::with_capacity(self.message.len());
        let mut rest = self.message.as_str();

        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            let Some(end) = after.find('}') else {
                out.push_str(&rest[start..]);
                return out;
            };
            let key = &after[..end];
            match ctx.attribute(key) {
                Some(serde_json::Value::String(s)) => out.push_str(s),
                Some(value) => out.push_str(&value.to_string()),
                None => {
                    out.push('{');
                    out.push_str(key);
                    out.push('}');
                }
            }
            rest = &after[end + 1..];
        }

        out.push_str(rest);
        out
    }
}

impl Valve for LogValve {
    fn name(&self) -> &str {
        "log"
    }

    fn describe(&self) -> String {
        format!("log({:?})", self.message)
    }

    fn invoke(&self, ctx: &mut Invocation) -> Result<(), ValveError> {
        let message = self.render(ctx);
        match self.level {
            Level::ERROR => tracing::error!(depth = ctx.depth(), "{message}"),
            Level::WARN => tracing::warn!(depth = ctx.depth(), "{message}"),
            Level::DEBUG => tracing::debug!(depth = ctx.depth(), "{message}"),
            Level::TRACE => tracing::trace!(depth = ctx.depth(), "{message}"),
            _ => info!(depth = ctx.depth(), "{message}"),
        }
        ctx.proceed()
    }
}

/// Sets a constant attribute and proceeds.
#[derive(Debug, Clone)]
pub struct SetAttributeValve {
    key: String,
    value: serde_json::Value,
}

impl SetAttributeValve {
    /// Creates a new set-attribute valve.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl Valve for SetAttributeValve {
    fn name(&self) -> &str {
        "set-attribute"
    }

    fn describe(&self) -> String {
        format!("set-attribute({}={})", self.key, self.value)
    }

    fn invoke(&self, ctx: &mut Invocation) -> Result<(), ValveError> {
        ctx.set_attribute(self.key.clone(), self.value.clone());
        ctx.proceed()
    }
}
