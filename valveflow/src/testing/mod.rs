//! Testing utilities for valve pipelines.
//!
//! This module provides:
//! - A shared [`Journal`] that records the order valves ran in
//! - Recording and failing valves
//! - Assertions for invocation outcomes

mod assertions;
mod mocks;

pub use assertions::{
    assert_attribute, assert_completed, assert_journal, assert_too_many_loops, assert_unwound,
};
pub use mocks::{FailingValve, Journal, RecordingValve};
