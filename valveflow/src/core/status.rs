//! Outcomes of pipeline walks, boundaries and invocations.

use super::BreakSignal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a single pipeline walk ended, as seen by its host.
///
/// The signal itself stays in the invocation; hosts inspect it there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalkOutcome {
    /// No break is pending.
    Completed,
    /// A break is pending.
    Unwound,
}

/// What a composite valve should do after one of its child pipelines ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryExit {
    /// The child walk completed with nothing pending.
    Completed,
    /// The child walk unwound and the signal stopped at this boundary.
    Absorbed,
    /// The child walk unwound and a signal is still pending. The valve must
    /// return to its host without calling `proceed()`.
    Propagated,
}

impl BoundaryExit {
    /// Returns true if the owning valve may resume its own pipeline.
    #[must_use]
    pub fn should_continue(self) -> bool {
        !matches!(self, Self::Propagated)
    }
}

/// The result of a top-level `invoke()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "signal")]
pub enum InvokeOutcome {
    /// The outermost pipeline finished without a pending break.
    Completed,
    /// A break or exit reached the outermost boundary.
    Unwound(BreakSignal),
}

impl InvokeOutcome {
    /// Returns true if the invocation completed normally.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Returns true if the invocation was unwound.
    #[must_use]
    pub fn is_unwound(&self) -> bool {
        matches!(self, Self::Unwound(_))
    }

    /// Returns the signal that escaped, if any.
    #[must_use]
    pub fn signal(&self) -> Option<&BreakSignal> {
        match self {
            Self::Completed => None,
            Self::Unwound(signal) => Some(signal),
        }
    }
}

impl fmt::Display for InvokeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Unwound(signal) => write!(f, "unwound by {signal}"),
        }
    }
}
