//! Protected, recovery and cleanup blocks.

use super::Valve;
use crate::context::Invocation;
use crate::errors::{PipelineValidationError, ValveError};
use crate::pipeline::Pipeline;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default attribute that receives a caught error.
pub const DEFAULT_EXCEPTION_NAME: &str = "exception";

/// Try/catch/finally configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TryCatchFinallyConfig {
    /// Attribute that receives the caught error as JSON.
    pub exception_name: String,
}

impl Default for TryCatchFinallyConfig {
    fn default() -> Self {
        Self {
            exception_name: DEFAULT_EXCEPTION_NAME.to_string(),
        }
    }
}

impl TryCatchFinallyConfig {
    /// Returns the config with a blank exception name replaced by the default.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        let trimmed = self.exception_name.trim();
        self.exception_name = if trimmed.is_empty() {
            DEFAULT_EXCEPTION_NAME.to_string()
        } else {
            trimmed.to_string()
        };
        self
    }
}

/// Runs `try`, recovers errors with `catch`, and always runs `finally`.
///
/// Breaks are not errors: a break out of `try` or `catch` skips nothing but
/// the rest of that block, runs `finally`, and is then settled here as at
/// any other boundary. Whatever `finally` produces itself (a break or an
/// error) replaces what was pending before it ran.
#[derive(Debug, Clone, Default)]
pub struct TryCatchFinallyValve {
    try_block: Option<Pipeline>,
    catch_block: Option<Pipeline>,
    finally_block: Option<Pipeline>,
    config: TryCatchFinallyConfig,
}

impl TryCatchFinallyValve {
    /// Starts building a try/catch/finally valve.
    #[must_use]
    pub fn builder() -> TryCatchFinallyValveBuilder {
        TryCatchFinallyValveBuilder::default()
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &TryCatchFinallyConfig {
        &self.config
    }

    /// Runs `try`, then `catch` on error. Returns the pipeline whose walk
    /// left a break pending, if any, and the error still to be raised.
    fn run_protected(&self, ctx: &mut Invocation) -> (Option<&Pipeline>, Option<ValveError>) {
        let Some(try_block) = &self.try_block else {
            return (None, None);
        };

        let error = match ctx.run_pipeline(try_block) {
            Ok(_) => return (ctx.is_broken().then_some(try_block), None),
            Err(error) => error,
        };

        let Some(catch_block) = &self.catch_block else {
            return (None, Some(error));
        };

        ctx.take_break();
        debug!(
            error = %error,
            exception_name = self.config.exception_name.as_str(),
            "Caught valve error"
        );
        let caught = error.to_json();
        ctx.emit_event(
            "exception.caught",
            serde_json::json!({
                "exception_name": self.config.exception_name,
                "error": caught,
            }),
        );
        ctx.set_attribute(self.config.exception_name.clone(), caught);

        match ctx.run_pipeline(catch_block) {
            Ok(_) => (ctx.is_broken().then_some(catch_block), None),
            Err(superseding) => (None, Some(superseding)),
        }
    }
}

impl Valve for TryCatchFinallyValve {
    fn name(&self) -> &str {
        "try-catch-finally"
    }

    fn describe(&self) -> String {
        format!(
            "try(catch={}, finally={}, exception={})",
            self.catch_block.is_some(),
            self.finally_block.is_some(),
            self.config.exception_name
        )
    }

    fn invoke(&self, ctx: &mut Invocation) -> Result<(), ValveError> {
        let (origin, error) = self.run_protected(ctx);
        let retained = ctx.take_break();

        if let Some(finally_block) = &self.finally_block {
            ctx.run_pipeline(finally_block)?;
            if ctx.is_broken() {
                let exit = ctx.settle_boundary(finally_block.label());
                return ctx.resume_after(exit);
            }
        }

        if let Some(error) = error {
            return Err(error);
        }

        match retained {
            Some(signal) => {
                ctx.restore_break(signal);
                let exit = ctx.settle_boundary(origin.and_then(Pipeline::label));
                ctx.resume_after(exit)
            }
            None => ctx.proceed(),
        }
    }

    fn children(&self) -> Vec<&Pipeline> {
        [&self.try_block, &self.catch_block, &self.finally_block]
            .into_iter()
            .flatten()
            .collect()
    }
}

/// Builder for [`TryCatchFinallyValve`]. Every block is optional.
#[derive(Debug, Clone, Default)]
pub struct TryCatchFinallyValveBuilder {
    try_block: Option<Pipeline>,
    catch_block: Option<Pipeline>,
    finally_block: Option<Pipeline>,
    config: TryCatchFinallyConfig,
}

impl TryCatchFinallyValveBuilder {
    /// Sets the protected block.
    #[must_use]
    pub fn try_block(mut self, block: Pipeline) -> Self {
        self.try_block = Some(block);
        self
    }

    /// Sets the recovery block.
    #[must_use]
    pub fn catch_block(mut self, block: Pipeline) -> Self {
        self.catch_block = Some(block);
        self
    }

    /// Sets the cleanup block.
    #[must_use]
    pub fn finally_block(mut self, block: Pipeline) -> Self {
        self.finally_block = Some(block);
        self
    }

    /// Sets the attribute that receives a caught error.
    #[must_use]
    pub fn exception_name(mut self, name: impl Into<String>) -> Self {
        self.config.exception_name = name.into();
        self
    }

    /// Replaces the whole configuration.
    #[must_use]
    pub fn config(mut self, config: TryCatchFinallyConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the valve.
    ///
    /// # Errors
    ///
    /// Never fails; the signature matches the other composite builders.
    pub fn build(self) -> Result<TryCatchFinallyValve, PipelineValidationError> {
        Ok(TryCatchFinallyValve {
            try_block: self.try_block,
            catch_block: self.catch_block,
            finally_block: self.finally_block,
            config: self.config.normalized(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BreakSignal, InvokeOutcome};
    use crate::errors::TooManyLoopsError;
    use crate::testing::{FailingValve, Journal, RecordingValve};
    use crate::valves::{BreakValve, ExitValve, FnValve, Flow, LoopValve};
    use pretty_assertions::assert_eq;

    fn block(journal: &Journal, name: &str) -> Pipeline {
        Pipeline::builder()
            .valve(RecordingValve::new(name, journal))
            .build()
            .unwrap()
    }

    fn host(valve: TryCatchFinallyValve, journal: &Journal) -> Pipeline {
        Pipeline::builder()
            .valve(valve)
            .valve(RecordingValve::new("after", journal))
            .build()
            .unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let config: TryCatchFinallyConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.exception_name, "exception");
        let config = TryCatchFinallyConfig {
            exception_name: " ".to_string(),
        };
        assert_eq!(config.normalized().exception_name, "exception");
    }

    #[test]
    fn test_empty_valve_is_noop() {
        let journal = Journal::new();
        let valve = TryCatchFinallyValve::builder().build().unwrap();
        let mut invocation = host(valve, &journal).new_invocation();

        assert!(invocation.invoke().unwrap().is_completed());
        assert_eq!(journal.entries(), vec!["after"]);
    }

    #[test]
    fn test_error_runs_try_catch_finally_in_order() {
        let journal = Journal::new();
        let try_block = Pipeline::builder()
            .valve(RecordingValve::new("try", &journal))
            .valve(FailingValve::new("explode", "disk full"))
            .valve(RecordingValve::new("unreached", &journal))
            .build()
            .unwrap();
        let valve = TryCatchFinallyValve::builder()
            .try_block(try_block)
            .catch_block(block(&journal, "catch"))
            .finally_block(block(&journal, "finally"))
            .exception_name("err")
            .build()
            .unwrap();
        let mut invocation = host(valve, &journal).new_invocation();

        assert!(invocation.invoke().unwrap().is_completed());
        assert_eq!(journal.entries(), vec!["try", "catch", "finally", "after"]);

        let caught = invocation.attribute("err").unwrap();
        assert_eq!(caught["kind"], "failed");
        assert_eq!(caught["valve"], "explode");
        assert_eq!(caught["cause"], "disk full");
    }

    #[test]
    fn test_uncaught_error_reraised_after_finally() {
        let journal = Journal::new();
        let try_block = Pipeline::builder()
            .valve(FailingValve::new("explode", "boom"))
            .build()
            .unwrap();
        let valve = TryCatchFinallyValve::builder()
            .try_block(try_block)
            .finally_block(block(&journal, "finally"))
            .build()
            .unwrap();
        let mut invocation = host(valve, &journal).new_invocation();

        let err = invocation.invoke().unwrap_err();
        assert!(matches!(err.valve_error(), Some(ValveError::Failed { valve, .. }) if valve == "explode"));
        assert_eq!(journal.entries(), vec!["finally"]);
    }

    #[test]
    fn test_catch_error_supersedes() {
        let journal = Journal::new();
        let valve = TryCatchFinallyValve::builder()
            .try_block(
                Pipeline::builder()
                    .valve(FailingValve::new("first", "one"))
                    .build()
                    .unwrap(),
            )
            .catch_block(
                Pipeline::builder()
                    .valve(FailingValve::new("second", "two"))
                    .build()
                    .unwrap(),
            )
            .finally_block(block(&journal, "finally"))
            .build()
            .unwrap();
        let mut invocation = host(valve, &journal).new_invocation();

        let err = invocation.invoke().unwrap_err();
        assert!(matches!(err.valve_error(), Some(ValveError::Failed { valve, .. }) if valve == "second"));
        assert_eq!(journal.entries(), vec!["finally"]);
    }

    #[test]
    fn test_break_runs_finally_then_propagates() {
        let journal = Journal::new();
        let try_block = Pipeline::builder()
            .valve(BreakValve::levels(1))
            .valve(RecordingValve::new("unreached", &journal))
            .build()
            .unwrap();
        let valve = TryCatchFinallyValve::builder()
            .try_block(try_block)
            .catch_block(block(&journal, "catch"))
            .finally_block(block(&journal, "finally"))
            .build()
            .unwrap();
        let mut invocation = host(valve, &journal).new_invocation();

        assert_eq!(
            invocation.invoke().unwrap(),
            InvokeOutcome::Unwound(BreakSignal::Level(0))
        );
        assert_eq!(journal.entries(), vec!["finally"]);
    }

    #[test]
    fn test_break_in_catch_reasserted_after_finally() {
        let journal = Journal::new();
        let catch_block = Pipeline::builder()
            .valve(BreakValve::levels(1))
            .valve(RecordingValve::new("catch-rest", &journal))
            .build()
            .unwrap();
        let valve = TryCatchFinallyValve::builder()
            .try_block(
                Pipeline::builder()
                    .valve(FailingValve::new("explode", "boom"))
                    .build()
                    .unwrap(),
            )
            .catch_block(catch_block)
            .finally_block(block(&journal, "finally"))
            .build()
            .unwrap();
        let mut invocation = host(valve, &journal).new_invocation();

        assert_eq!(
            invocation.invoke().unwrap(),
            InvokeOutcome::Unwound(BreakSignal::Level(0))
        );
        assert_eq!(journal.entries(), vec!["finally"]);
    }

    #[test]
    fn test_label_on_catch_block_is_absorbed() {
        let journal = Journal::new();
        let catch_block = Pipeline::builder()
            .label("handler")
            .valve(BreakValve::to_label("handler").unwrap())
            .valve(RecordingValve::new("catch-rest", &journal))
            .build()
            .unwrap();
        let valve = TryCatchFinallyValve::builder()
            .try_block(
                Pipeline::builder()
                    .valve(FailingValve::new("explode", "boom"))
                    .build()
                    .unwrap(),
            )
            .catch_block(catch_block)
            .finally_block(block(&journal, "finally"))
            .build()
            .unwrap();
        let mut invocation = host(valve, &journal).new_invocation();

        assert!(invocation.invoke().unwrap().is_completed());
        assert_eq!(journal.entries(), vec!["finally", "after"]);
    }

    #[test]
    fn test_level_zero_in_try_is_absorbed() {
        let journal = Journal::new();
        let try_block = Pipeline::builder()
            .valve(BreakValve::levels(0))
            .build()
            .unwrap();
        let valve = TryCatchFinallyValve::builder()
            .try_block(try_block)
            .finally_block(block(&journal, "finally"))
            .build()
            .unwrap();
        let mut invocation = host(valve, &journal).new_invocation();

        assert!(invocation.invoke().unwrap().is_completed());
        assert_eq!(journal.entries(), vec!["finally", "after"]);
    }

    #[test]
    fn test_finally_break_replaces_error() {
        let journal = Journal::new();
        let valve = TryCatchFinallyValve::builder()
            .try_block(
                Pipeline::builder()
                    .valve(FailingValve::new("explode", "boom"))
                    .build()
                    .unwrap(),
            )
            .finally_block(Pipeline::builder().valve(ExitValve::new()).build().unwrap())
            .build()
            .unwrap();
        let mut invocation = host(valve, &journal).new_invocation();

        assert_eq!(
            invocation.invoke().unwrap(),
            InvokeOutcome::Unwound(BreakSignal::Exit)
        );
        assert!(journal.is_empty());
    }

    #[test]
    fn test_finally_error_replaces_break() {
        let journal = Journal::new();
        let valve = TryCatchFinallyValve::builder()
            .try_block(Pipeline::builder().valve(ExitValve::new()).build().unwrap())
            .finally_block(
                Pipeline::builder()
                    .valve(FailingValve::new("cleanup", "oops"))
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap();
        let mut invocation = host(valve, &journal).new_invocation();

        let err = invocation.invoke().unwrap_err();
        assert!(matches!(err.valve_error(), Some(ValveError::Failed { valve, .. }) if valve == "cleanup"));
    }

    #[test]
    fn test_catches_too_many_loops() {
        let journal = Journal::new();
        let endless = LoopValve::builder()
            .body(
                Pipeline::builder()
                    .valve(FnValve::new("spin", |_ctx| Ok(Flow::Continue)))
                    .build()
                    .unwrap(),
            )
            .max_loop_count(2)
            .build()
            .unwrap();
        let valve = TryCatchFinallyValve::builder()
            .try_block(Pipeline::builder().valve(endless).build().unwrap())
            .catch_block(block(&journal, "catch"))
            .build()
            .unwrap();
        let mut invocation = host(valve, &journal).new_invocation();

        assert!(invocation.invoke().unwrap().is_completed());
        assert_eq!(journal.entries(), vec!["catch", "after"]);
        let caught = invocation.attribute("exception").unwrap();
        assert_eq!(caught["kind"], "too_many_loops");
        assert_eq!(caught["max_loop_count"], TooManyLoopsError::new(2).max_loop_count);
    }

    #[test]
    fn test_label_on_try_block_is_absorbed() {
        let journal = Journal::new();
        let try_block = Pipeline::builder()
            .label("guarded")
            .valve(BreakValve::to_label("guarded").unwrap())
            .build()
            .unwrap();
        let valve = TryCatchFinallyValve::builder()
            .try_block(try_block)
            .finally_block(block(&journal, "finally"))
            .build()
            .unwrap();
        let mut invocation = host(valve, &journal).new_invocation();

        assert!(invocation.invoke().unwrap().is_completed());
        assert_eq!(journal.entries(), vec!["finally", "after"]);
    }
}
