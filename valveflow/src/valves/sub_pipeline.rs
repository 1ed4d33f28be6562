//! Embeds a pipeline as a single valve.

use super::Valve;
use crate::context::Invocation;
use crate::errors::{PipelineValidationError, ValveError};
use crate::pipeline::Pipeline;

/// Runs one child pipeline as a boundary, adding one nesting level.
#[derive(Debug, Clone)]
pub struct SubPipelineValve {
    pipeline: Pipeline,
}

impl SubPipelineValve {
    /// Starts building a sub-pipeline valve.
    #[must_use]
    pub fn builder() -> SubPipelineValveBuilder {
        SubPipelineValveBuilder::default()
    }

    /// Returns the embedded pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}

impl Valve for SubPipelineValve {
    fn name(&self) -> &str {
        "sub-pipeline"
    }

    fn invoke(&self, ctx: &mut Invocation) -> Result<(), ValveError> {
        let exit = ctx.run_boundary(&self.pipeline)?;
        ctx.resume_after(exit)
    }

    fn children(&self) -> Vec<&Pipeline> {
        vec![&self.pipeline]
    }
}

/// Builder for [`SubPipelineValve`].
#[derive(Debug, Clone, Default)]
pub struct SubPipelineValveBuilder {
    pipeline: Option<Pipeline>,
}

impl SubPipelineValveBuilder {
    /// Sets the embedded pipeline (required).
    #[must_use]
    pub fn pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    /// Builds the valve.
    ///
    /// # Errors
    ///
    /// Returns an error if no pipeline was set.
    pub fn build(self) -> Result<SubPipelineValve, PipelineValidationError> {
        let pipeline = self
            .pipeline
            .ok_or_else(|| PipelineValidationError::missing_body("sub-pipeline", "child"))?;
        Ok(SubPipelineValve { pipeline })
    }
}
