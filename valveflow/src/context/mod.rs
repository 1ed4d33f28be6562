//! Per-invocation state.
//!
//! This module provides:
//! - The invocation: attributes, pending break, active pipeline walks
//! - The flat attribute map shared by a whole call tree
//! - Invocation identity for correlating logs and events

mod attributes;
mod identity;
mod invocation;

pub use attributes::Attributes;
pub use identity::InvocationIdentity;
pub use invocation::Invocation;
