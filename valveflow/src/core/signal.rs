//! Break signals and the boundary rule.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Label addressing the outermost pipeline of an invocation.
pub const TOP_LABEL: &str = "#TOP";

/// A pending request to unwind enclosing pipelines.
///
/// At most one signal is pending in an invocation at a time. While one is
/// pending, `proceed()` is a no-op, so the current pipeline stops walking and
/// control returns to the boundary that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "target")]
pub enum BreakSignal {
    /// Stop the current pipeline plus `n` further enclosing ones.
    Level(usize),
    /// Stop every pipeline up to and including the one carrying this label.
    Label(String),
    /// Stop everything. Never absorbed.
    Exit,
}

impl BreakSignal {
    /// Creates a level-counted break.
    #[must_use]
    pub fn level(levels: usize) -> Self {
        Self::Level(levels)
    }

    /// Creates a label-addressed break. The reserved [`TOP_LABEL`] maps to
    /// [`BreakSignal::Exit`].
    #[must_use]
    pub fn label(name: impl Into<String>) -> Self {
        let name = name.into();
        if name.trim() == TOP_LABEL {
            Self::Exit
        } else {
            Self::Label(name.trim().to_string())
        }
    }

    /// Applies the boundary rule for a boundary whose child pipeline carries
    /// `label`.
    ///
    /// `Exit` always propagates unchanged, `Level(0)` and a matching label
    /// are absorbed, `Level(n)` propagates as `Level(n - 1)` and any other
    /// label propagates unchanged.
    #[must_use]
    pub fn at_boundary(self, label: Option<&str>) -> BoundaryAction {
        match self {
            Self::Exit => BoundaryAction::Propagate(Self::Exit),
            Self::Level(0) => BoundaryAction::Absorb,
            Self::Level(n) => BoundaryAction::Propagate(Self::Level(n - 1)),
            Self::Label(name) if label == Some(name.as_str()) => BoundaryAction::Absorb,
            Self::Label(name) => BoundaryAction::Propagate(Self::Label(name)),
        }
    }

    /// Returns true for [`BreakSignal::Exit`].
    #[must_use]
    pub fn is_exit(&self) -> bool {
        matches!(self, Self::Exit)
    }
}

impl fmt::Display for BreakSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Level(n) => write!(f, "break({n})"),
            Self::Label(name) => write!(f, "break({name})"),
            Self::Exit => write!(f, "exit"),
        }
    }
}

/// The decision a boundary takes for a pending signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundaryAction {
    /// The signal stops here; the boundary resumes its own flow.
    Absorb,
    /// The boundary stops too, leaving this signal pending for its host.
    Propagate(BreakSignal),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_zero_is_absorbed() {
        assert_eq!(BreakSignal::level(0).at_boundary(None), BoundaryAction::Absorb);
    }

    #[test]
    fn test_level_decrements() {
        assert_eq!(
            BreakSignal::level(3).at_boundary(Some("outer")),
            BoundaryAction::Propagate(BreakSignal::Level(2))
        );
    }

    #[test]
    fn test_exit_never_absorbed() {
        assert_eq!(
            BreakSignal::Exit.at_boundary(Some("anything")),
            BoundaryAction::Propagate(BreakSignal::Exit)
        );
    }

    #[test]
    fn test_label_match_and_mismatch() {
        assert_eq!(
            BreakSignal::label("outer").at_boundary(Some("outer")),
            BoundaryAction::Absorb
        );
        assert_eq!(
            BreakSignal::label("outer").at_boundary(Some("inner")),
            BoundaryAction::Propagate(BreakSignal::Label("outer".to_string()))
        );
        assert_eq!(
            BreakSignal::label("outer").at_boundary(None),
            BoundaryAction::Propagate(BreakSignal::Label("outer".to_string()))
        );
    }

    #[test]
    fn test_top_label_is_exit() {
        assert_eq!(BreakSignal::label("#TOP"), BreakSignal::Exit);
        assert_eq!(BreakSignal::label(" loop "), BreakSignal::Label("loop".to_string()));
    }

    #[test]
    fn test_signal_serialize() {
        let json = serde_json::to_value(BreakSignal::Level(2)).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "level", "target": 2}));

        let json = serde_json::to_value(BreakSignal::Exit).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "exit"}));
    }

    #[test]
    fn test_signal_display() {
        assert_eq!(BreakSignal::Level(1).to_string(), "break(1)");
        assert_eq!(BreakSignal::label("x").to_string(), "break(x)");
        assert_eq!(BreakSignal::Exit.to_string(), "exit");
    }
}
