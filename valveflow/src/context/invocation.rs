//! Per-call execution state.

use super::{Attributes, InvocationIdentity};
use crate::core::{BoundaryAction, BoundaryExit, BreakSignal, InvokeOutcome, WalkOutcome};
use crate::errors::{PipelineError, ValveError};
use crate::events::{get_event_sink, EventSink};
use crate::pipeline::Pipeline;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// One active pipeline walk.
struct Frame {
    pipeline: Pipeline,
    /// Index of the valve currently executing in this walk.
    cursor: Option<usize>,
    /// Highest index started so far.
    reached: Option<usize>,
}

impl Frame {
    fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            cursor: None,
            reached: None,
        }
    }
}

/// The mutable state of one execution request.
///
/// An invocation owns the attribute map, the pending break signal and the
/// stack of active pipeline walks. Pipelines and valves hold no per-call
/// state, so all of it lives here. An invocation runs exactly once.
pub struct Invocation {
    identity: InvocationIdentity,
    pipeline: Pipeline,
    attributes: Attributes,
    pending: Option<BreakSignal>,
    frames: Vec<Frame>,
    event_sink: Arc<dyn EventSink>,
    invoked: bool,
}

impl Invocation {
    /// Creates an invocation of `pipeline`.
    #[must_use]
    pub fn new(pipeline: &Pipeline) -> Self {
        Self {
            identity: InvocationIdentity::new(),
            pipeline: pipeline.clone(),
            attributes: Attributes::new(),
            pending: None,
            frames: Vec::new(),
            event_sink: get_event_sink(),
            invoked: false,
        }
    }

    /// Sets the identity.
    #[must_use]
    pub fn with_identity(mut self, identity: InvocationIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// Seeds attributes before the run.
    #[must_use]
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Seeds a single attribute before the run.
    #[must_use]
    pub fn with_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.attributes.set(key, value);
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Runs the pipeline.
    ///
    /// Returns whether the outermost pipeline completed or was unwound by a
    /// break that no boundary absorbed. Attributes stay readable afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Invocation`] wrapping any uncaught valve
    /// error, or [`PipelineError::AlreadyInvoked`] on a second call.
    pub fn invoke(&mut self) -> Result<InvokeOutcome, PipelineError> {
        if self.invoked {
            return Err(PipelineError::AlreadyInvoked(
                self.identity.invocation_id.to_string(),
            ));
        }
        self.invoked = true;

        let pipeline = self.pipeline.clone();
        let span = tracing::debug_span!(
            "invocation",
            invocation_id = %self.identity.invocation_id,
            pipeline = pipeline.display_name(),
        );
        let _guard = span.enter();

        self.emit_event("invocation.started", serde_json::json!({}));

        match self.run_pipeline(&pipeline) {
            Ok(WalkOutcome::Completed) => {
                self.emit_event("invocation.completed", serde_json::json!({}));
                Ok(InvokeOutcome::Completed)
            }
            Ok(WalkOutcome::Unwound) => {
                let outcome = self
                    .pending
                    .clone()
                    .map_or(InvokeOutcome::Completed, InvokeOutcome::Unwound);
                debug!(%outcome, "Invocation unwound");
                self.emit_event(
                    "invocation.unwound",
                    serde_json::json!({ "signal": outcome.signal() }),
                );
                Ok(outcome)
            }
            Err(source) => {
                error!(error = %source, "Invocation failed");
                self.emit_event(
                    "invocation.failed",
                    serde_json::json!({ "error": source.to_json() }),
                );
                Err(PipelineError::Invocation {
                    pipeline: pipeline.display_name().to_string(),
                    source,
                })
            }
        }
    }

    /// Invokes the next valve of the current pipeline.
    ///
    /// Does nothing while a break is pending, at the end of the pipeline,
    /// or when the calling valve has already proceeded.
    ///
    /// # Errors
    ///
    /// Propagates any error raised further down the pipeline.
    pub fn proceed(&mut self) -> Result<(), ValveError> {
        if self.pending.is_some() {
            return Ok(());
        }

        let Some(frame) = self.frames.last_mut() else {
            warn!("proceed() called outside of a pipeline walk");
            return Ok(());
        };

        let next = frame.cursor.map_or(0, |index| index + 1);
        if frame.reached.is_some_and(|reached| reached >= next) {
            warn!(
                pipeline = frame.pipeline.display_name(),
                index = next.saturating_sub(1),
                "Valve called proceed() more than once; ignoring"
            );
            return Ok(());
        }

        let Some(valve) = frame.pipeline.valve(next).cloned() else {
            return Ok(());
        };
        frame.reached = Some(next);
        let previous = frame.cursor.replace(next);

        let result = valve.invoke(self);

        if let Some(frame) = self.frames.last_mut() {
            frame.cursor = previous;
        }
        result
    }

    /// Walks `pipeline` as a nested scope and reports how the walk ended.
    ///
    /// Any break left pending stays in the invocation for the caller to
    /// settle; see [`Invocation::settle_boundary`].
    ///
    /// # Errors
    ///
    /// Propagates any error raised by the walked valves.
    pub fn run_pipeline(&mut self, pipeline: &Pipeline) -> Result<WalkOutcome, ValveError> {
        self.frames.push(Frame::new(pipeline.clone()));
        let result = self.proceed();
        self.frames.pop();
        result?;

        Ok(if self.pending.is_some() {
            WalkOutcome::Unwound
        } else {
            WalkOutcome::Completed
        })
    }

    /// Applies the boundary rule to the pending break, if any, for a
    /// boundary whose child pipeline carries `label`.
    pub fn settle_boundary(&mut self, label: Option<&str>) -> BoundaryExit {
        let Some(signal) = self.pending.take() else {
            return BoundaryExit::Completed;
        };

        match signal.clone().at_boundary(label) {
            BoundaryAction::Absorb => {
                debug!(%signal, label, depth = self.depth(), "Break absorbed at boundary");
                self.emit_event(
                    "boundary.absorbed",
                    serde_json::json!({ "signal": signal, "label": label }),
                );
                BoundaryExit::Absorbed
            }
            BoundaryAction::Propagate(next) => {
                debug!(%signal, %next, label, depth = self.depth(), "Break propagated past boundary");
                self.emit_event(
                    "boundary.propagated",
                    serde_json::json!({ "signal": signal, "next": next, "label": label }),
                );
                self.pending = Some(next);
                BoundaryExit::Propagated
            }
        }
    }

    /// Walks `pipeline` as a boundary: runs it and settles any pending break.
    ///
    /// # Errors
    ///
    /// Propagates any error raised by the walked valves.
    pub fn run_boundary(&mut self, pipeline: &Pipeline) -> Result<BoundaryExit, ValveError> {
        self.run_pipeline(pipeline)?;
        Ok(self.settle_boundary(pipeline.label()))
    }

    /// Continues the current pipeline after a boundary, unless the pending
    /// break propagated past it.
    ///
    /// # Errors
    ///
    /// Propagates any error raised further down the pipeline.
    pub fn resume_after(&mut self, exit: BoundaryExit) -> Result<(), ValveError> {
        if exit.should_continue() {
            self.proceed()
        } else {
            Ok(())
        }
    }

    /// Reinstates a break previously removed with [`Invocation::take_break`].
    pub(crate) fn restore_break(&mut self, signal: BreakSignal) {
        self.pending = Some(signal);
    }

    /// Requests a break of the current pipeline plus `levels` enclosing ones.
    pub fn break_pipeline(&mut self, levels: usize) {
        self.request_break(BreakSignal::level(levels));
    }

    /// Requests a break up to and including the pipeline labelled `label`.
    pub fn break_to_label(&mut self, label: impl Into<String>) {
        self.request_break(BreakSignal::label(label));
    }

    /// Requests an unconditional exit of the whole invocation.
    pub fn exit(&mut self) {
        self.request_break(BreakSignal::Exit);
    }

    /// Makes `signal` the pending break, replacing any other.
    pub fn request_break(&mut self, signal: BreakSignal) {
        if let BreakSignal::Label(ref label) = signal {
            if self.find_label(label).is_none() {
                warn!(
                    label = label.as_str(),
                    "No enclosing pipeline carries this label; the break will unwind to the top"
                );
            }
        }
        debug!(%signal, depth = self.depth(), index = ?self.index(), "Break requested");
        self.pending = Some(signal);
    }

    /// Removes and returns the pending break.
    pub fn take_break(&mut self) -> Option<BreakSignal> {
        self.pending.take()
    }

    /// Returns the pending break, if any.
    #[must_use]
    pub fn pending_break(&self) -> Option<&BreakSignal> {
        self.pending.as_ref()
    }

    /// Returns true while a break is pending.
    #[must_use]
    pub fn is_broken(&self) -> bool {
        self.pending.is_some()
    }

    /// Counts how many enclosing pipelines sit between the current one and
    /// the nearest pipeline labelled `label` (0 = the current pipeline).
    #[must_use]
    pub fn find_label(&self, label: &str) -> Option<usize> {
        self.frames
            .iter()
            .rev()
            .position(|frame| frame.pipeline.label() == Some(label))
    }

    /// Number of active pipeline walks (1 while the top pipeline runs).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Index of the executing valve within the innermost active pipeline.
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        self.frames.last().and_then(|frame| frame.cursor)
    }

    /// Returns an attribute.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&serde_json::Value> {
        self.attributes.get(key)
    }

    /// Sets an attribute, returning the value it replaced.
    pub fn set_attribute(
        &mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Option<serde_json::Value> {
        self.attributes.set(key, value)
    }

    /// Removes an attribute.
    pub fn remove_attribute(&mut self, key: &str) -> Option<serde_json::Value> {
        self.attributes.remove(key)
    }

    /// Returns the attribute map.
    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Returns the attribute map mutably.
    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    /// Consumes the invocation, keeping its attributes.
    #[must_use]
    pub fn into_attributes(self) -> Attributes {
        self.attributes
    }

    /// Returns the identity.
    #[must_use]
    pub fn identity(&self) -> &InvocationIdentity {
        &self.identity
    }

    /// Returns the top-level pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Returns true once `invoke()` has been called.
    #[must_use]
    pub fn is_invoked(&self) -> bool {
        self.invoked
    }

    /// Emits an event enriched with the invocation's position.
    pub fn emit_event(&self, event_type: &str, data: serde_json::Value) {
        let mut enriched = data;

        if let serde_json::Value::Object(ref mut map) = enriched {
            map.insert(
                "invocation_id".to_string(),
                serde_json::json!(self.identity.invocation_id.to_string()),
            );
            if let Some(id) = self.identity.request_id {
                map.insert("request_id".to_string(), serde_json::json!(id.to_string()));
            }
            map.insert(
                "pipeline".to_string(),
                serde_json::json!(self.pipeline.display_name()),
            );
            map.insert("depth".to_string(), serde_json::json!(self.depth()));
            map.insert(
                "timestamp".to_string(),
                serde_json::json!(chrono::Utc::now().to_rfc3339()),
            );
        }

        self.event_sink.try_emit(event_type, Some(enriched));
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("identity", &self.identity)
            .field("pipeline", &self.pipeline.display_name())
            .field("attributes", &self.attributes)
            .field("pending", &self.pending)
            .field("depth", &self.frames.len())
            .field("invoked", &self.invoked)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;
    use crate::valves::{BreakValve, FnValve, Flow, PassThroughValve, SubPipelineValve};

    #[test]
    fn test_empty_pipeline_completes() {
        let pipeline = Pipeline::empty();
        let mut invocation = pipeline.new_invocation();

        assert_eq!(invocation.invoke().unwrap(), InvokeOutcome::Completed);
        assert!(invocation.is_invoked());
    }

    #[test]
    fn test_invocation_is_single_use() {
        let pipeline = Pipeline::empty();
        let mut invocation = pipeline.new_invocation();
        invocation.invoke().unwrap();

        let err = invocation.invoke().unwrap_err();
        assert!(matches!(err, PipelineError::AlreadyInvoked(_)));
    }

    #[test]
    fn test_seeded_attributes_visible_and_kept() {
        let pipeline = Pipeline::builder()
            .valve(FnValve::new("double", |ctx| {
                let n = ctx.attributes().get_i64("n").unwrap_or_default();
                ctx.set_attribute("n", n * 2);
                Ok(Flow::Continue)
            }))
            .build()
            .unwrap();

        let mut invocation = pipeline.new_invocation().with_attribute("n", 21);
        invocation.invoke().unwrap();

        assert_eq!(invocation.attribute("n"), Some(&serde_json::json!(42)));
    }

    #[test]
    fn test_depth_and_index_tracking() {
        let inner = Pipeline::builder()
            .valve(PassThroughValve::new())
            .valve(FnValve::new("probe", |ctx| {
                ctx.set_attribute("inner_depth", ctx.depth());
                ctx.set_attribute("inner_index", ctx.index().unwrap_or(99));
                Ok(Flow::Continue)
            }))
            .build()
            .unwrap();
        let pipeline = Pipeline::builder()
            .valve(SubPipelineValve::builder().pipeline(inner).build().unwrap())
            .valve(FnValve::new("probe", |ctx| {
                ctx.set_attribute("outer_depth", ctx.depth());
                ctx.set_attribute("outer_index", ctx.index().unwrap_or(99));
                Ok(Flow::Continue)
            }))
            .build()
            .unwrap();

        let mut invocation = pipeline.new_invocation();
        invocation.invoke().unwrap();

        let attrs = invocation.attributes();
        assert_eq!(attrs.get_i64("inner_depth"), Some(2));
        assert_eq!(attrs.get_i64("inner_index"), Some(1));
        assert_eq!(attrs.get_i64("outer_depth"), Some(1));
        assert_eq!(attrs.get_i64("outer_index"), Some(1));
        assert_eq!(invocation.depth(), 0);
    }

    #[test]
    fn test_proceed_twice_is_ignored() {
        let pipeline = Pipeline::builder()
            .valve(FnValve::new("eager", |ctx| {
                ctx.proceed()?;
                ctx.proceed()?;
                Ok(Flow::Halt)
            }))
            .valve(FnValve::new("halting", |ctx| {
                let seen = ctx.attributes().get_i64("seen").unwrap_or_default();
                ctx.set_attribute("seen", seen + 1);
                Ok(Flow::Halt)
            }))
            .valve(FnValve::new("never", |ctx| {
                ctx.set_attribute("never", true);
                Ok(Flow::Continue)
            }))
            .build()
            .unwrap();

        let mut invocation = pipeline.new_invocation();
        invocation.invoke().unwrap();

        assert_eq!(invocation.attributes().get_i64("seen"), Some(1));
        assert!(invocation.attribute("never").is_none());
    }

    #[test]
    fn test_find_label() {
        let inner = Pipeline::builder()
            .label("inner")
            .valve(FnValve::new("probe", |ctx| {
                ctx.set_attribute("to_outer", ctx.find_label("outer").map(|n| n as i64));
                ctx.set_attribute("to_inner", ctx.find_label("inner").map(|n| n as i64));
                ctx.set_attribute("to_none", ctx.find_label("none").map(|n| n as i64));
                Ok(Flow::Continue)
            }))
            .build()
            .unwrap();
        let pipeline = Pipeline::builder()
            .label("outer")
            .valve(SubPipelineValve::builder().pipeline(inner).build().unwrap())
            .build()
            .unwrap();

        let mut invocation = pipeline.new_invocation();
        invocation.invoke().unwrap();

        let attrs = invocation.attributes();
        assert_eq!(attrs.get_i64("to_outer"), Some(1));
        assert_eq!(attrs.get_i64("to_inner"), Some(0));
        assert_eq!(attrs.get("to_none"), Some(&serde_json::Value::Null));
    }

    #[test]
    fn test_top_level_break_reports_unwound() {
        let pipeline = Pipeline::builder()
            .valve(BreakValve::levels(0))
            .valve(FnValve::new("after", |ctx| {
                ctx.set_attribute("after", true);
                Ok(Flow::Continue)
            }))
            .build()
            .unwrap();

        let mut invocation = pipeline.new_invocation();
        let outcome = invocation.invoke().unwrap();

        assert_eq!(outcome, InvokeOutcome::Unwound(BreakSignal::Level(0)));
        assert!(invocation.attribute("after").is_none());
        assert!(invocation.is_broken());
    }

    #[test]
    fn test_events_are_enriched() {
        let sink = Arc::new(CollectingEventSink::new());
        let pipeline = Pipeline::builder().label("main").build().unwrap();
        let mut invocation = pipeline.new_invocation().with_event_sink(sink.clone());
        invocation.invoke().unwrap();

        assert_eq!(
            sink.event_types(),
            vec!["invocation.started", "invocation.completed"]
        );
        let events = sink.events();
        let data = events[0].1.as_ref().unwrap();
        assert_eq!(data["pipeline"], "main");
        assert!(data.get("timestamp").is_some());
        assert_eq!(
            data["invocation_id"],
            serde_json::json!(invocation.identity().invocation_id.to_string())
        );
    }

    #[test]
    fn test_failure_is_wrapped() {
        let pipeline = Pipeline::builder()
            .label("main")
            .valve(FnValve::new("boom", |_ctx| Err(anyhow::anyhow!("kaput"))))
            .build()
            .unwrap();

        let err = pipeline.new_invocation().invoke().unwrap_err();
        assert!(err.to_string().contains("Failed to invoke pipeline 'main'"));
        assert!(matches!(err.valve_error(), Some(ValveError::Failed { valve, .. }) if valve == "boom"));
    }
}
