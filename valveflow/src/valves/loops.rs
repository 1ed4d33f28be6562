//! Loop and while-loop valves.

use super::Valve;
use crate::conditions::Condition;
use crate::context::Invocation;
use crate::core::BoundaryExit;
use crate::errors::{PipelineValidationError, TooManyLoopsError, ValveError};
use crate::pipeline::Pipeline;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Default iteration bound.
pub const DEFAULT_MAX_LOOP_COUNT: i64 = 10;

/// Default name of the loop counter attribute.
pub const DEFAULT_LOOP_COUNTER_NAME: &str = "loopCount";

/// Loop configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoopConfig {
    /// Maximum number of iterations; zero or negative means unbounded.
    pub max_loop_count: i64,
    /// Attribute that receives the iteration index.
    pub loop_counter_name: String,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_loop_count: DEFAULT_MAX_LOOP_COUNT,
            loop_counter_name: DEFAULT_LOOP_COUNTER_NAME.to_string(),
        }
    }
}

impl LoopConfig {
    /// Returns the config with a blank counter name replaced by the default.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        let trimmed = self.loop_counter_name.trim();
        self.loop_counter_name = if trimmed.is_empty() {
            DEFAULT_LOOP_COUNTER_NAME.to_string()
        } else {
            trimmed.to_string()
        };
        self
    }

    /// Returns true when the iteration count is bounded.
    #[must_use]
    pub fn is_bounded(&self) -> bool {
        self.max_loop_count > 0
    }
}

/// Runs `body` until a break or a false condition.
///
/// The condition is checked before the bound, so a while-loop that stops on
/// its own after exactly `max_loop_count` iterations does not fail.
fn run_iterations(
    ctx: &mut Invocation,
    body: &Pipeline,
    config: &LoopConfig,
    condition: Option<&dyn Condition>,
) -> Result<(), ValveError> {
    let mut count: i64 = 0;

    loop {
        if let Some(condition) = condition {
            if !condition.is_satisfied(ctx) {
                debug!(iterations = count, "Loop condition false; stopping");
                return ctx.proceed();
            }
        }

        if config.is_bounded() && count >= config.max_loop_count {
            warn!(
                max_loop_count = config.max_loop_count,
                counter = config.loop_counter_name.as_str(),
                "Loop exceeded its iteration bound"
            );
            return Err(TooManyLoopsError::new(config.max_loop_count).into());
        }

        ctx.set_attribute(config.loop_counter_name.clone(), count);
        debug!(
            iteration = count,
            counter = config.loop_counter_name.as_str(),
            "Loop iteration"
        );
        ctx.emit_event(
            "loop.iteration",
            serde_json::json!({
                "iteration": count,
                "counter": config.loop_counter_name,
                "max_loop_count": config.max_loop_count,
            }),
        );

        match ctx.run_boundary(body)? {
            BoundaryExit::Completed => count += 1,
            BoundaryExit::Absorbed => return ctx.proceed(),
            BoundaryExit::Propagated => return Ok(()),
        }
    }
}

/// Repeats its body until a break reaches it.
///
/// The body runs as a boundary. A break absorbed there ends the loop and
/// the enclosing pipeline resumes; any other break propagates outward.
#[derive(Debug, Clone)]
pub struct LoopValve {
    body: Pipeline,
    config: LoopConfig,
}

impl LoopValve {
    /// Starts building a loop valve.
    #[must_use]
    pub fn builder() -> LoopValveBuilder {
        LoopValveBuilder::default()
    }

    /// Returns the body pipeline.
    #[must_use]
    pub fn body(&self) -> &Pipeline {
        &self.body
    }

    /// Returns the loop configuration.
    #[must_use]
    pub fn config(&self) -> &LoopConfig {
        &self.config
    }
}

impl Valve for LoopValve {
    fn name(&self) -> &str {
        "loop"
    }

    fn describe(&self) -> String {
        format!(
            "loop(max={}, counter={})",
            self.config.max_loop_count, self.config.loop_counter_name
        )
    }

    fn invoke(&self, ctx: &mut Invocation) -> Result<(), ValveError> {
        run_iterations(ctx, &self.body, &self.config, None)
    }

    fn children(&self) -> Vec<&Pipeline> {
        vec![&self.body]
    }
}

/// Builder for [`LoopValve`].
#[derive(Debug, Clone, Default)]
pub struct LoopValveBuilder {
    body: Option<Pipeline>,
    config: LoopConfig,
}

impl LoopValveBuilder {
    /// Sets the body pipeline (required).
    #[must_use]
    pub fn body(mut self, body: Pipeline) -> Self {
        self.body = Some(body);
        self
    }

    /// Sets the iteration bound; zero or negative disables it.
    #[must_use]
    pub fn max_loop_count(mut self, max: i64) -> Self {
        self.config.max_loop_count = max;
        self
    }

    /// Sets the loop counter attribute name.
    #[must_use]
    pub fn loop_counter_name(mut self, name: impl Into<String>) -> Self {
        self.config.loop_counter_name = name.into();
        self
    }

    /// Replaces the whole configuration.
    #[must_use]
    pub fn config(mut self, config: LoopConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the valve.
    ///
    /// # Errors
    ///
    /// Returns an error if no body was set.
    pub fn build(self) -> Result<LoopValve, PipelineValidationError> {
        let body = self
            .body
            .ok_or_else(|| PipelineValidationError::missing_body("loop", "body"))?;
        Ok(LoopValve {
            body,
            config: self.config.normalized(),
        })
    }
}

/// A loop whose condition is checked before every iteration.
#[derive(Debug, Clone)]
pub struct WhileLoopValve {
    body: Pipeline,
    condition: Arc<dyn Condition>,
    config: LoopConfig,
}

impl WhileLoopValve {
    /// Starts building a while-loop valve.
    #[must_use]
    pub fn builder() -> WhileLoopValveBuilder {
        WhileLoopValveBuilder::default()
    }

    /// Returns the loop configuration.
    #[must_use]
    pub fn config(&self) -> &LoopConfig {
        &self.config
    }
}

impl Valve for WhileLoopValve {
    fn name(&self) -> &str {
        "while"
    }

    fn describe(&self) -> String {
        format!(
            "while({:?}, max={}, counter={})",
            self.condition, self.config.max_loop_count, self.config.loop_counter_name
        )
    }

    fn invoke(&self, ctx: &mut Invocation) -> Result<(), ValveError> {
        run_iterations(ctx, &self.body, &self.config, Some(self.condition.as_ref()))
    }

    fn children(&self) -> Vec<&Pipeline> {
        vec![&self.body]
    }
}

/// Builder for [`WhileLoopValve`].
#[derive(Debug, Clone, Default)]
pub struct WhileLoopValveBuilder {
    body: Option<Pipeline>,
    condition: Option<Arc<dyn Condition>>,
    config: LoopConfig,
}

impl WhileLoopValveBuilder {
    /// Sets the body pipeline (required).
    #[must_use]
    pub fn body(mut self, body: Pipeline) -> Self {
        self.body = Some(body);
        self
    }

    /// Sets the loop condition (required).
    #[must_use]
    pub fn condition(mut self, condition: impl Condition + 'static) -> Self {
        self.condition = Some(Arc::new(condition));
        self
    }

    /// Sets an already shared loop condition.
    #[must_use]
    pub fn shared_condition(mut self, condition: Arc<dyn Condition>) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Sets the iteration bound; zero or negative disables it.
    #[must_use]
    pub fn max_loop_count(mut self, max: i64) -> Self {
        self.config.max_loop_count = max;
        self
    }

    /// Sets the loop counter attribute name.
    #[must_use]
    pub fn loop_counter_name(mut self, name: impl Into<String>) -> Self {
        self.config.loop_counter_name = name.into();
        self
    }

    /// Replaces the whole configuration.
    #[must_use]
    pub fn config(mut self, config: LoopConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the valve. The body is checked before the condition.
    ///
    /// # Errors
    ///
    /// Returns an error if the body or the condition is missing.
    pub fn build(self) -> Result<WhileLoopValve, PipelineValidationError> {
        let body = self
            .body
            .ok_or_else(|| PipelineValidationError::missing_body("while", "body"))?;
        let condition = self
            .condition
            .ok_or_else(|| PipelineValidationError::missing_condition("while"))?;
        Ok(WhileLoopValve {
            body,
            condition,
            config: self.config.normalized(),
        })
    }
}
