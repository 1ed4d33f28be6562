//! Immutable pipeline definitions.

use super::PipelineBuilder;
use crate::context::Invocation;
use crate::valves::Valve;
use std::fmt;
use std::sync::Arc;

/// An ordered, immutable list of valves forming one control-flow scope.
///
/// Pipelines are validated once when built and never mutated afterwards.
/// Cloning is cheap and every clone shares the same valves, so one pipeline
/// can serve any number of concurrent invocations.
#[derive(Clone)]
pub struct Pipeline {
    inner: Arc<PipelineInner>,
}

struct PipelineInner {
    label: Option<String>,
    valves: Vec<Arc<dyn Valve>>,
}

impl Pipeline {
    /// Starts building a pipeline.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// An unlabelled pipeline with no valves.
    #[must_use]
    pub fn empty() -> Self {
        Self::from_parts(None, Vec::new())
    }

    pub(super) fn from_parts(label: Option<String>, valves: Vec<Arc<dyn Valve>>) -> Self {
        Self {
            inner: Arc::new(PipelineInner { label, valves }),
        }
    }

    /// Returns the label, if any.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.inner.label.as_deref()
    }

    /// Returns the label or `<anonymous>`.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.label().unwrap_or("<anonymous>")
    }

    /// Returns the valves in order.
    #[must_use]
    pub fn valves(&self) -> &[Arc<dyn Valve>] {
        &self.inner.valves
    }

    /// Returns the valve at `index`.
    #[must_use]
    pub fn valve(&self, index: usize) -> Option<&Arc<dyn Valve>> {
        self.inner.valves.get(index)
    }

    /// Returns the number of valves.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.valves.len()
    }

    /// Returns true if the pipeline has no valves.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.valves.is_empty()
    }

    /// Returns true if this pipeline or any nested pipeline carries `label`.
    #[must_use]
    pub fn contains_label(&self, label: &str) -> bool {
        self.label() == Some(label)
            || self
                .inner
                .valves
                .iter()
                .flat_map(|valve| valve.children())
                .any(|child| child.contains_label(label))
    }

    /// Returns true if both handles share the same definition.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Creates a fresh invocation of this pipeline.
    #[must_use]
    pub fn new_invocation(&self) -> Invocation {
        Invocation::new(self)
    }

    fn write_tree(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let pad = "  ".repeat(indent);
        match self.label() {
            Some(label) => writeln!(f, "{pad}pipeline [{label}]")?,
            None => writeln!(f, "{pad}pipeline")?,
        }
        for (index, valve) in self.inner.valves.iter().enumerate() {
            writeln!(f, "{pad}  {index}: {}", valve.describe())?;
            for child in valve.children() {
                child.write_tree(f, indent + 2)?;
            }
        }
        Ok(())
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("label", &self.inner.label)
            .field("valves", &self.inner.valves)
            .finish()
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_tree(f, 0)
    }
}
