//! Valve trait and implementations.
//!
//! Valves are the units of work of a pipeline. A valve receives the
//! invocation, does its work, and decides whether the rest of its pipeline
//! runs by calling [`Invocation::proceed`]. Composite valves own child
//! pipelines and apply the boundary rule when those pipelines unwind.

mod branch;
mod breaks;
mod leaf;
mod loops;
mod sub_pipeline;
mod try_catch;

pub use branch::{ChooseValve, ChooseValveBuilder, IfValve, IfValveBuilder};
pub use breaks::{BreakIfValve, BreakUnlessValve, BreakValve, ExitValve, GuardedBreakBuilder};
pub use leaf::{Flow, FnValve, LogValve, PassThroughValve, SetAttributeValve};
pub use loops::{LoopConfig, LoopValve, LoopValveBuilder, WhileLoopValve, WhileLoopValveBuilder};
pub use sub_pipeline::{SubPipelineValve, SubPipelineValveBuilder};
pub use try_catch::{TryCatchFinallyConfig, TryCatchFinallyValve, TryCatchFinallyValveBuilder};

use crate::context::Invocation;
use crate::errors::ValveError;
use crate::pipeline::Pipeline;
use std::fmt::Debug;

/// Trait for pipeline valves.
///
/// Valves are shared by every invocation of the pipelines that contain
/// them and must not keep per-call state; everything mutable belongs in
/// the [`Invocation`].
pub trait Valve: Send + Sync + Debug {
    /// Returns the short name of the valve.
    fn name(&self) -> &str;

    /// Returns a one-line description including the valve's configuration.
    fn describe(&self) -> String {
        self.name().to_string()
    }

    /// Runs the valve.
    ///
    /// A valve continues its pipeline by calling `ctx.proceed()` at most
    /// once. Returning without proceeding and without requesting a break
    /// silently ends the current pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error to raise it on the exception channel.
    fn invoke(&self, ctx: &mut Invocation) -> Result<(), ValveError>;

    /// Returns the child pipelines owned by this valve.
    fn children(&self) -> Vec<&Pipeline> {
        Vec::new()
    }
}
