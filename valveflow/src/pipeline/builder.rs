//! Pipeline builder with validation.

use super::Pipeline;
use crate::errors::PipelineValidationError;
use crate::valves::Valve;
use std::sync::Arc;

/// Builder for creating validated pipelines.
#[derive(Debug, Clone, Default)]
pub struct PipelineBuilder {
    /// The pipeline label.
    label: Option<String>,
    /// The valves, in order.
    valves: Vec<Arc<dyn Valve>>,
}

impl PipelineBuilder {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Labels the pipeline so breaks can target it by name.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Appends a valve.
    #[must_use]
    pub fn valve(mut self, valve: impl Valve + 'static) -> Self {
        self.valves.push(Arc::new(valve));
        self
    }

    /// Appends an already shared valve.
    #[must_use]
    pub fn shared_valve(mut self, valve: Arc<dyn Valve>) -> Self {
        self.valves.push(valve);
        self
    }

    /// Appends several valves.
    #[must_use]
    pub fn valves(mut self, valves: impl IntoIterator<Item = Arc<dyn Valve>>) -> Self {
        self.valves.extend(valves);
        self
    }

    /// Returns the number of valves added so far.
    #[must_use]
    pub fn valve_count(&self) -> usize {
        self.valves.len()
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the label is blank or is also declared by a
    /// pipeline nested inside this one.
    pub fn build(self) -> Result<Pipeline, PipelineValidationError> {
        let label = match self.label {
            Some(label) => Some(validate_label(&label)?),
            None => None,
        };

        if let Some(ref label) = label {
            let shadowed = self
                .valves
                .iter()
                .flat_map(|valve| valve.children())
                .any(|child| child.contains_label(label));
            if shadowed {
                return Err(PipelineValidationError::duplicate_label(label));
            }
        }

        tracing::trace!(
            label = label.as_deref().unwrap_or("<anonymous>"),
            valves = self.valves.len(),
            "Built pipeline"
        );

        Ok(Pipeline::from_parts(label, self.valves))
    }
}

/// Checks a label and returns it trimmed.
///
/// # Errors
///
/// Returns an error if the label is blank or uses the reserved top label.
pub fn validate_label(label: &str) -> Result<String, PipelineValidationError> {
    let trimmed = label.trim();
    if trimmed.is_empty() || trimmed == crate::core::TOP_LABEL {
        return Err(PipelineValidationError::bad_label(label));
    }
    Ok(trimmed.to_string())
}
