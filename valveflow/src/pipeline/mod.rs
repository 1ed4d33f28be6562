//! Pipeline building.
//!
//! This module provides:
//! - Immutable, shareable pipeline definitions
//! - A pipeline builder with eager validation
//! - End-to-end control-flow scenarios (tests)

mod builder;
mod spec;

pub use builder::{validate_label, PipelineBuilder};
pub use spec::Pipeline;
