//! Valves that request breaks: unconditional, guarded, and exit.

use super::Valve;
use crate::conditions::Condition;
use crate::context::Invocation;
use crate::core::BreakSignal;
use crate::errors::{PipelineValidationError, ValveError};
use crate::pipeline::validate_label;
use std::sync::Arc;

/// Unconditionally requests a break and stops its pipeline.
#[derive(Debug, Clone)]
pub struct BreakValve {
    signal: BreakSignal,
}

impl BreakValve {
    /// Breaks the current pipeline plus `levels` enclosing ones.
    #[must_use]
    pub fn levels(levels: usize) -> Self {
        Self {
            signal: BreakSignal::level(levels),
        }
    }

    /// Breaks up to and including the pipeline labelled `label`.
    ///
    /// # Errors
    ///
    /// Returns an error if the label is blank.
    pub fn to_label(label: &str) -> Result<Self, PipelineValidationError> {
        Ok(Self {
            signal: label_signal(label)?,
        })
    }

    /// Returns the signal this valve requests.
    #[must_use]
    pub fn signal(&self) -> &BreakSignal {
        &self.signal
    }
}

impl Default for BreakValve {
    fn default() -> Self {
        Self::levels(0)
    }
}

impl Valve for BreakValve {
    fn name(&self) -> &str {
        "break"
    }

    fn describe(&self) -> String {
        self.signal.to_string()
    }

    fn invoke(&self, ctx: &mut Invocation) -> Result<(), ValveError> {
        ctx.request_break(self.signal.clone());
        Ok(())
    }
}

/// Requests an exit: every enclosing scope stops, apart from pending
/// `finally` blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExitValve;

impl ExitValve {
    /// Creates a new exit valve.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Valve for ExitValve {
    fn name(&self) -> &str {
        "exit"
    }

    fn invoke(&self, ctx: &mut Invocation) -> Result<(), ValveError> {
        ctx.exit();
        Ok(())
    }
}

fn label_signal(label: &str) -> Result<BreakSignal, PipelineValidationError> {
    if label.trim() == crate::core::TOP_LABEL {
        return Ok(BreakSignal::Exit);
    }
    Ok(BreakSignal::Label(validate_label(label)?))
}

#[derive(Debug, Clone)]
struct GuardedBreak {
    condition: Arc<dyn Condition>,
    signal: BreakSignal,
    /// Break when the condition is false instead of true.
    negate: bool,
}

impl GuardedBreak {
    fn invoke(&self, ctx: &mut Invocation) -> Result<(), ValveError> {
        if self.condition.is_satisfied(ctx) != self.negate {
            ctx.request_break(self.signal.clone());
            Ok(())
        } else {
            ctx.proceed()
        }
    }
}

/// Builder shared by [`BreakIfValve`] and [`BreakUnlessValve`].
#[derive(Debug, Clone)]
pub struct GuardedBreakBuilder {
    condition: Option<Arc<dyn Condition>>,
    signal: BreakSignal,
    label: Option<String>,
}

impl GuardedBreakBuilder {
    fn new() -> Self {
        Self {
            condition: None,
            signal: BreakSignal::level(0),
            label: None,
        }
    }

    /// Sets the guarding condition.
    #[must_use]
    pub fn condition(mut self, condition: impl Condition + 'static) -> Self {
        self.condition = Some(Arc::new(condition));
        self
    }

    /// Sets an already shared guarding condition.
    #[must_use]
    pub fn shared_condition(mut self, condition: Arc<dyn Condition>) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Breaks the current pipeline plus `levels` enclosing ones (default 0).
    #[must_use]
    pub fn levels(mut self, levels: usize) -> Self {
        self.signal = BreakSignal::level(levels);
        self.label = None;
        self
    }

    /// Breaks up to and including the pipeline labelled `label`.
    #[must_use]
    pub fn to_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    fn build_guard(
        self,
        valve: &str,
        negate: bool,
    ) -> Result<GuardedBreak, PipelineValidationError> {
        let condition = self
            .condition
            .ok_or_else(|| PipelineValidationError::missing_condition(valve))?;
        let signal = match self.label {
            Some(label) => label_signal(&label)?,
            None => self.signal,
        };
        Ok(GuardedBreak {
            condition,
            signal,
            negate,
        })
    }

    /// Builds a [`BreakIfValve`].
    ///
    /// # Errors
    ///
    /// Returns an error if no condition was set or the label is blank.
    pub fn build_if(self) -> Result<BreakIfValve, PipelineValidationError> {
        Ok(BreakIfValve {
            guard: self.build_guard("break-if", false)?,
        })
    }

    /// Builds a [`BreakUnlessValve`].
    ///
    /// # Errors
    ///
    /// Returns an error if no condition was set or the label is blank.
    pub fn build_unless(self) -> Result<BreakUnlessValve, PipelineValidationError> {
        Ok(BreakUnlessValve {
            guard: self.build_guard("break-unless", true)?,
        })
    }
}

/// Requests a break when its condition holds; otherwise proceeds.
#[derive(Debug, Clone)]
pub struct BreakIfValve {
    guard: GuardedBreak,
}

impl BreakIfValve {
    /// Starts building a break-if valve.
    #[must_use]
    pub fn builder() -> GuardedBreakBuilder {
        GuardedBreakBuilder::new()
    }
}

impl Valve for BreakIfValve {
    fn name(&self) -> &str {
        "break-if"
    }

    fn describe(&self) -> String {
        format!("break-if({:?}) -> {}", self.guard.condition, self.guard.signal)
    }

    fn invoke(&self, ctx: &mut Invocation) -> Result<(), ValveError> {
        self.guard.invoke(ctx)
    }
}

/// Requests a break when its condition does not hold; otherwise proceeds.
#[derive(Debug, Clone)]
pub struct BreakUnlessValve {
    guard: GuardedBreak,
}

impl BreakUnlessValve {
    /// Starts building a break-unless valve.
    #[must_use]
    pub fn builder() -> GuardedBreakBuilder {
        GuardedBreakBuilder::new()
    }
}

impl Valve for BreakUnlessValve {
    fn name(&self) -> &str {
        "break-unless"
    }

    fn describe(&self) -> String {
        format!(
            "break-unless({:?}) -> {}",
            self.guard.condition, self.guard.signal
        )
    }

    fn invoke(&self, ctx: &mut Invocation) -> Result<(), ValveError> {
        self.guard.invoke(ctx)
    }
}
