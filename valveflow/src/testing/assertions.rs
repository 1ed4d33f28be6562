//! Test assertions for invocation outcomes.

use super::Journal;
use crate::context::Invocation;
use crate::core::{BreakSignal, InvokeOutcome};
use crate::errors::{PipelineError, ValveError};

/// Asserts that the invocation completed normally.
pub fn assert_completed(outcome: &InvokeOutcome) {
    assert!(
        outcome.is_completed(),
        "Expected a completed invocation, got: {outcome}"
    );
}

/// Asserts that the invocation was unwound by `expected`.
pub fn assert_unwound(outcome: &InvokeOutcome, expected: &BreakSignal) {
    assert_eq!(
        outcome.signal(),
        Some(expected),
        "Expected an invocation unwound by {expected}, got: {outcome}"
    );
}

/// Asserts that the journal holds exactly `expected`, in order.
pub fn assert_journal(journal: &Journal, expected: &[&str]) {
    let entries = journal.entries();
    assert_eq!(
        entries, expected,
        "Journal mismatch: expected {expected:?}, got {entries:?}"
    );
}

/// Asserts that an attribute holds the expected value.
pub fn assert_attribute(invocation: &Invocation, key: &str, expected: &serde_json::Value) {
    let actual = invocation.attribute(key);
    assert_eq!(
        actual,
        Some(expected),
        "Expected value {expected:?} for attribute '{key}', got {actual:?}"
    );
}

/// Asserts that the invocation failed because a loop exceeded `max_loop_count`.
pub fn assert_too_many_loops(error: &PipelineError, max_loop_count: i64) {
    match error.valve_error() {
        Some(ValveError::TooManyLoops(e)) => assert_eq!(
            e.max_loop_count, max_loop_count,
            "Loop bound mismatch in: {error}"
        ),
        _ => panic!("Expected a too-many-loops failure, got: {error}"),
    }
}
