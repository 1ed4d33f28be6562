//! # Valveflow
//!
//! A structured control-flow engine for valve pipelines.
//!
//! A pipeline is an immutable, ordered list of valves. Each valve decides
//! whether the walk goes on by calling `proceed()`. Composite valves own
//! child pipelines and give them:
//!
//! - **Loops**: `LoopValve` and `WhileLoopValve`, bounded by `max_loop_count`
//! - **Branches**: `IfValve` and `ChooseValve`
//! - **Nesting**: `SubPipelineValve`
//! - **Recovery**: `TryCatchFinallyValve`
//!
//! Non-local exits travel on a break channel kept apart from errors:
//! `BreakValve` (by level or label), `BreakIfValve`, `BreakUnlessValve`
//! and `ExitValve`.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use valveflow::prelude::*;
//!
//! let body = Pipeline::builder()
//!     .valve(LogValve::new("iteration {loopCount}"))
//!     .valve(BreakValve::levels(0))
//!     .build()?;
//!
//! let pipeline = Pipeline::builder()
//!     .valve(LoopValve::builder().body(body).max_loop_count(10).build()?)
//!     .valve(LogValve::new("done"))
//!     .build()?;
//!
//! let mut invocation = pipeline.new_invocation().with_attribute("user", "ada");
//! let outcome = invocation.invoke()?;
//! assert!(outcome.is_completed());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod conditions;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod testing;
pub mod valves;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::conditions::{
        All, Any, AttributeCondition, Condition, Constant, ExpressionCondition, FnCondition, Not,
    };
    pub use crate::context::{Attributes, Invocation, InvocationIdentity};
    pub use crate::core::{BreakSignal, InvokeOutcome, TOP_LABEL};
    pub use crate::errors::{
        ContractErrorInfo, PipelineError, PipelineValidationError, TooManyLoopsError, ValveError,
    };
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::pipeline::{Pipeline, PipelineBuilder};
    pub use crate::valves::{
        BreakIfValve, BreakUnlessValve, BreakValve, ChooseValve, ExitValve, Flow, FnValve, IfValve,
        LogValve, LoopConfig, LoopValve, PassThroughValve, SetAttributeValve, SubPipelineValve,
        TryCatchFinallyConfig, TryCatchFinallyValve, Valve, WhileLoopValve,
    };
}
