//! Conditional valves: `if` and `choose`.

use super::Valve;
use crate::conditions::Condition;
use crate::context::Invocation;
use crate::errors::{PipelineValidationError, ValveError};
use crate::pipeline::Pipeline;
use std::sync::Arc;

/// Runs its block when the condition holds.
#[derive(Debug, Clone)]
pub struct IfValve {
    condition: Arc<dyn Condition>,
    block: Pipeline,
}

impl IfValve {
    /// Starts building an if valve.
    #[must_use]
    pub fn builder() -> IfValveBuilder {
        IfValveBuilder::default()
    }
}

impl Valve for IfValve {
    fn name(&self) -> &str {
        "if"
    }

    fn describe(&self) -> String {
        format!("if({:?})", self.condition)
    }

    fn invoke(&self, ctx: &mut Invocation) -> Result<(), ValveError> {
        if !self.condition.is_satisfied(ctx) {
            return ctx.proceed();
        }
        let exit = ctx.run_boundary(&self.block)?;
        ctx.resume_after(exit)
    }

    fn children(&self) -> Vec<&Pipeline> {
        vec![&self.block]
    }
}

/// Builder for [`IfValve`].
#[derive(Debug, Clone, Default)]
pub struct IfValveBuilder {
    condition: Option<Arc<dyn Condition>>,
    block: Option<Pipeline>,
}

impl IfValveBuilder {
    /// Sets the condition (required).
    #[must_use]
    pub fn condition(mut self, condition: impl Condition + 'static) -> Self {
        self.condition = Some(Arc::new(condition));
        self
    }

    /// Sets an already shared condition.
    #[must_use]
    pub fn shared_condition(mut self, condition: Arc<dyn Condition>) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Sets the block run when the condition holds (required).
    #[must_use]
    pub fn block(mut self, block: Pipeline) -> Self {
        self.block = Some(block);
        self
    }

    /// Builds the valve.
    ///
    /// # Errors
    ///
    /// Returns an error if the condition or the block is missing.
    pub fn build(self) -> Result<IfValve, PipelineValidationError> {
        let condition = self
            .condition
            .ok_or_else(|| PipelineValidationError::missing_condition("if"))?;
        let block = self
            .block
            .ok_or_else(|| PipelineValidationError::missing_body("if", "block"))?;
        Ok(IfValve { condition, block })
    }
}

/// Runs the block of the first satisfied `when`, else the `otherwise`
/// block if there is one.
#[derive(Debug, Clone)]
pub struct ChooseValve {
    whens: Vec<(Arc<dyn Condition>, Pipeline)>,
    otherwise: Option<Pipeline>,
}

impl ChooseValve {
    /// Starts building a choose valve.
    #[must_use]
    pub fn builder() -> ChooseValveBuilder {
        ChooseValveBuilder::default()
    }

    /// Returns the number of `when` branches.
    #[must_use]
    pub fn when_count(&self) -> usize {
        self.whens.len()
    }

    fn select(&self, ctx: &Invocation) -> Option<&Pipeline> {
        self.whens
            .iter()
            .find(|(condition, _)| condition.is_satisfied(ctx))
            .map(|(_, block)| block)
            .or(self.otherwise.as_ref())
    }
}

impl Valve for ChooseValve {
    fn name(&self) -> &str {
        "choose"
    }

    fn describe(&self) -> String {
        format!(
            "choose(whens={}, otherwise={})",
            self.whens.len(),
            self.otherwise.is_some()
        )
    }

    fn invoke(&self, ctx: &mut Invocation) -> Result<(), ValveError> {
        let Some(block) = self.select(ctx) else {
            return ctx.proceed();
        };
        let exit = ctx.run_boundary(block)?;
        ctx.resume_after(exit)
    }

    fn children(&self) -> Vec<&Pipeline> {
        self.whens
            .iter()
            .map(|(_, block)| block)
            .chain(self.otherwise.as_ref())
            .collect()
    }
}

/// Builder for [`ChooseValve`].
///
/// Branches can be added as pairs with [`when`](Self::when) or as parallel
/// lists with [`condition`](Self::condition) and [`block`](Self::block);
/// `build()` rejects lists of different lengths.
#[derive(Debug, Clone, Default)]
pub struct ChooseValveBuilder {
    conditions: Vec<Arc<dyn Condition>>,
    blocks: Vec<Pipeline>,
    otherwise: Option<Pipeline>,
}

impl ChooseValveBuilder {
    /// Adds a `when` branch.
    #[must_use]
    pub fn when(mut self, condition: impl Condition + 'static, block: Pipeline) -> Self {
        self.conditions.push(Arc::new(condition));
        self.blocks.push(block);
        self
    }

    /// Appends a condition to the parallel condition list.
    #[must_use]
    pub fn condition(mut self, condition: impl Condition + 'static) -> Self {
        self.conditions.push(Arc::new(condition));
        self
    }

    /// Appends an already shared condition to the parallel condition list.
    #[must_use]
    pub fn shared_condition(mut self, condition: Arc<dyn Condition>) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Appends a block to the parallel block list.
    #[must_use]
    pub fn block(mut self, block: Pipeline) -> Self {
        self.blocks.push(block);
        self
    }

    /// Sets the block run when no condition holds.
    #[must_use]
    pub fn otherwise(mut self, block: Pipeline) -> Self {
        self.otherwise = Some(block);
        self
    }

    /// Builds the valve.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first unpaired index if the condition
    /// and block lists differ in length.
    pub fn build(self) -> Result<ChooseValve, PipelineValidationError> {
        let (conditions, blocks) = (self.conditions.len(), self.blocks.len());
        if conditions != blocks {
            return Err(PipelineValidationError::choose_mismatch(
                conditions.min(blocks),
                conditions,
                blocks,
            ));
        }
        Ok(ChooseValve {
            whens: self.conditions.into_iter().zip(self.blocks).collect(),
            otherwise: self.otherwise,
        })
    }
}
