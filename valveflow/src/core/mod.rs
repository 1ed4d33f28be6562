//! Core control-flow types for valveflow.
//!
//! This module contains the values that travel between valves and the
//! boundaries that own them:
//! - Break signals and the boundary rule
//! - Walk, boundary and invocation outcomes

mod signal;
mod status;

pub use signal::{BoundaryAction, BreakSignal, TOP_LABEL};
pub use status::{BoundaryExit, InvokeOutcome, WalkOutcome};
