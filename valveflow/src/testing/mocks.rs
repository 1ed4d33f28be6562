//! Mock valves for testing.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::context::Invocation;
use crate::errors::ValveError;
use crate::valves::Valve;

/// An append-only log shared by the valves of one test.
///
/// Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    /// Creates an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    pub fn record(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    /// Returns a copy of all entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Counts the entries equal to `entry`.
    #[must_use]
    pub fn count(&self, entry: &str) -> usize {
        self.entries.lock().iter().filter(|e| *e == entry).count()
    }

    /// Removes all entries.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

/// A valve that records its name in a [`Journal`] and proceeds.
#[derive(Debug, Clone)]
pub struct RecordingValve {
    name: String,
    journal: Journal,
    counter: Option<String>,
}

impl RecordingValve {
    /// Creates a new recording valve.
    #[must_use]
    pub fn new(name: impl Into<String>, journal: &Journal) -> Self {
        Self {
            name: name.into(),
            journal: journal.clone(),
            counter: None,
        }
    }

    /// Also records the value of `attribute`, as `name[value]`.
    #[must_use]
    pub fn with_counter(mut self, attribute: impl Into<String>) -> Self {
        self.counter = Some(attribute.into());
        self
    }
}

impl Valve for RecordingValve {
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(&self, ctx: &mut Invocation) -> Result<(), ValveError> {
        let entry = match self.counter.as_deref().and_then(|key| ctx.attribute(key)) {
            Some(value) => format!("{}[{value}]", self.name),
            None => self.name.clone(),
        };
        self.journal.record(entry);
        ctx.proceed()
    }
}

/// A valve that always fails with a fixed message.
#[derive(Debug, Clone)]
pub struct FailingValve {
    name: String,
    message: String,
}

impl FailingValve {
    /// Creates a new failing valve.
    #[must_use]
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

impl Valve for FailingValve {
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(&self, _ctx: &mut Invocation) -> Result<(), ValveError> {
        Err(ValveError::message(self.name.clone(), self.message.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Pipeline;

    #[test]
    fn test_journal_clones_share_entries() {
        let journal = Journal::new();
        let clone = journal.clone();
        clone.record("a");
        journal.record("b");
        journal.record("a");

        assert_eq!(journal.entries(), vec!["a", "b", "a"]);
        assert_eq!(clone.len(), 3);
        assert_eq!(journal.count("a"), 2);

        clone.clear();
        assert!(journal.is_empty());
    }

    #[test]
    fn test_recording_valve_with_counter() {
        let journal = Journal::new();
        let pipeline = Pipeline::builder()
            .valve(RecordingValve::new("plain", &journal))
            .valve(RecordingValve::new("step", &journal).with_counter("i"))
            .build()
            .unwrap();

        let mut invocation = pipeline.new_invocation().with_attribute("i", 7);
        invocation.invoke().unwrap();

        assert_eq!(journal.entries(), vec!["plain", "step[7]"]);
    }

    #[test]
    fn test_failing_valve() {
        let pipeline = Pipeline::builder()
            .valve(FailingValve::new("broken", "no luck"))
            .build()
            .unwrap();

        let err = pipeline.new_invocation().invoke().unwrap_err();
        let valve_error = err.valve_error().unwrap();
        assert_eq!(valve_error.to_string(), "valve 'broken' failed: no luck");
    }
}
