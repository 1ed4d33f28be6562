//! Error types for the valveflow engine.
//!
//! Errors travel on three separate paths:
//!
//! - [`PipelineValidationError`]: configuration problems found while a
//!   pipeline or composite valve is being built. These never reach an
//!   invocation.
//! - [`ValveError`]: the exception channel. Raised by valve work (or by the
//!   loop bound) and catchable only by a try/catch/finally valve.
//! - [`PipelineError`]: what escapes the outermost invocation boundary.
//!
//! Break signals are not errors and never appear here.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Boxed error accepted as the cause of a valve failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Metadata about a contract error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "CONTRACT-VALVE-MISSING_BODY").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), serde_json::json!(self.code));
        map.insert("summary".to_string(), serde_json::json!(self.summary));

        if let Some(ref hint) = self.fix_hint {
            map.insert("fix_hint".to_string(), serde_json::json!(hint));
        }
        if !self.context.is_empty() {
            map.insert("context".to_string(), serde_json::json!(self.context));
        }

        map
    }
}

/// Error raised when a pipeline or valve configuration is invalid.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// Descriptions of the valves involved in the error.
    pub valves: Vec<String>,
    /// Optional contract error info.
    pub error_info: Option<ContractErrorInfo>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            valves: Vec::new(),
            error_info: None,
        }
    }

    /// A composite valve was built without its required child pipeline.
    #[must_use]
    pub fn missing_body(valve: &str, block: &str) -> Self {
        Self::new(format!("{valve}: missing required {block} pipeline"))
            .with_valves(vec![valve.to_string()])
            .with_error_info(
                ContractErrorInfo::new(
                    "CONTRACT-VALVE-MISSING_BODY",
                    format!("No {block} pipeline configured"),
                )
                .with_fix_hint(
                    ContractSuggestions::get("CONTRACT-VALVE-MISSING_BODY").unwrap_or_default(),
                )
                .with_context_entry("block", block),
            )
    }

    /// A conditional valve was built without its condition.
    #[must_use]
    pub fn missing_condition(valve: &str) -> Self {
        Self::new(format!("{valve}: missing required condition"))
            .with_valves(vec![valve.to_string()])
            .with_error_info(
                ContractErrorInfo::new("CONTRACT-VALVE-MISSING_CONDITION", "No condition configured")
                    .with_fix_hint(
                        ContractSuggestions::get("CONTRACT-VALVE-MISSING_CONDITION")
                            .unwrap_or_default(),
                    ),
            )
    }

    /// A choose valve has a `when` entry with no matching condition or block.
    #[must_use]
    pub fn choose_mismatch(index: usize, conditions: usize, blocks: usize) -> Self {
        let missing = if conditions > blocks { "block" } else { "condition" };
        Self::new(format!(
            "choose: when #{index} has no {missing} ({conditions} conditions, {blocks} blocks)"
        ))
        .with_valves(vec!["choose".to_string()])
        .with_error_info(
            ContractErrorInfo::new(
                "CONTRACT-VALVE-CHOOSE_MISMATCH",
                "Conditions and blocks must pair up one to one",
            )
            .with_fix_hint(
                ContractSuggestions::get("CONTRACT-VALVE-CHOOSE_MISMATCH").unwrap_or_default(),
            )
            .with_context_entry("index", index.to_string()),
        )
    }

    /// A label is blank or otherwise unusable.
    #[must_use]
    pub fn bad_label(label: &str) -> Self {
        Self::new(format!("invalid pipeline label '{label}'")).with_error_info(
            ContractErrorInfo::new("CONTRACT-VALVE-BAD_LABEL", "Labels must be non-blank names")
                .with_fix_hint(ContractSuggestions::get("CONTRACT-VALVE-BAD_LABEL").unwrap_or_default()),
        )
    }

    /// The same label is declared by a pipeline and one of its descendants.
    #[must_use]
    pub fn duplicate_label(label: &str) -> Self {
        Self::new(format!("label '{label}' is declared more than once on one nesting path"))
            .with_error_info(
                ContractErrorInfo::new(
                    "CONTRACT-PIPELINE-DUPLICATE_LABEL",
                    "A nested pipeline shadows an enclosing label",
                )
                .with_fix_hint(
                    ContractSuggestions::get("CONTRACT-PIPELINE-DUPLICATE_LABEL").unwrap_or_default(),
                )
                .with_context_entry("label", label),
            )
    }

    /// A condition expression could not be parsed.
    #[must_use]
    pub fn bad_expression(expression: &str, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::new(format!("invalid condition expression '{expression}': {reason}")).with_error_info(
            ContractErrorInfo::new("CONTRACT-VALVE-BAD_EXPRESSION", reason)
                .with_fix_hint(
                    ContractSuggestions::get("CONTRACT-VALVE-BAD_EXPRESSION").unwrap_or_default(),
                )
                .with_context_entry("expression", expression),
        )
    }

    /// Sets the valves involved.
    #[must_use]
    pub fn with_valves(mut self, valves: Vec<String>) -> Self {
        self.valves = valves;
        self
    }

    /// Sets the contract error info.
    #[must_use]
    pub fn with_error_info(mut self, info: ContractErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Returns the contract code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.code.as_str())
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("message".to_string(), serde_json::json!(self.message));
        map.insert("valves".to_string(), serde_json::json!(self.valves));
        if let Some(ref info) = self.error_info {
            let info_map: serde_json::Map<String, serde_json::Value> =
                info.to_dict().into_iter().collect();
            map.insert("error_info".to_string(), serde_json::Value::Object(info_map));
        }
        map
    }
}

/// Raised by a loop valve whose iteration bound is exceeded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Too many loops: exceeds the maximum count: {max_loop_count}")]
pub struct TooManyLoopsError {
    /// The configured bound.
    pub max_loop_count: i64,
}

impl TooManyLoopsError {
    /// Creates a new error citing the configured bound.
    #[must_use]
    pub fn new(max_loop_count: i64) -> Self {
        Self { max_loop_count }
    }
}

/// The exception channel: failures raised while valves run.
#[derive(Debug, Error)]
pub enum ValveError {
    /// A loop ran past its configured bound.
    #[error(transparent)]
    TooManyLoops(#[from] TooManyLoopsError),

    /// A valve's own work failed.
    #[error("valve '{valve}' failed: {source}")]
    Failed {
        /// Description of the failing valve.
        valve: String,
        /// The underlying cause.
        #[source]
        source: BoxError,
    },
}

impl ValveError {
    /// Creates a failure for the named valve.
    pub fn failed(valve: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Failed {
            valve: valve.into(),
            source: source.into(),
        }
    }

    /// Creates a failure from a plain message.
    pub fn message(valve: impl Into<String>, message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self::failed(valve, message)
    }

    /// Returns a stable kind tag.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TooManyLoops(_) => "too_many_loops",
            Self::Failed { .. } => "failed",
        }
    }

    /// The JSON object bound into the exception attribute of a catch block.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::TooManyLoops(err) => serde_json::json!({
                "kind": self.kind(),
                "max_loop_count": err.max_loop_count,
                "message": self.to_string(),
            }),
            Self::Failed { valve, source } => serde_json::json!({
                "kind": self.kind(),
                "valve": valve,
                "cause": source.to_string(),
                "message": self.to_string(),
            }),
        }
    }
}

/// Errors escaping the outermost invocation boundary.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// An uncaught valve error; the original cause is preserved.
    #[error("Failed to invoke pipeline '{pipeline}': {source}")]
    Invocation {
        /// The top-level pipeline's label, or `<anonymous>`.
        pipeline: String,
        /// The uncaught valve error.
        #[source]
        source: ValveError,
    },

    /// The invocation has already run; invocations are single-use.
    #[error("Invocation {0} has already been invoked")]
    AlreadyInvoked(String),
}

impl PipelineError {
    /// Returns the wrapped valve error, if any.
    #[must_use]
    pub fn valve_error(&self) -> Option<&ValveError> {
        match self {
            Self::Invocation { source, .. } => Some(source),
            Self::AlreadyInvoked(_) => None,
        }
    }
}

/// Provides default suggestions for common contract error codes.
pub struct ContractSuggestions;

impl ContractSuggestions {
    /// Gets a suggestion for a given error code.
    #[must_use]
    pub fn get(code: &str) -> Option<&'static str> {
        match code {
            "CONTRACT-VALVE-MISSING_BODY" => Some(
                "Supply the child pipeline on the valve builder before calling build().",
            ),
            "CONTRACT-VALVE-MISSING_CONDITION" => Some(
                "Supply a condition on the valve builder before calling build().",
            ),
            "CONTRACT-VALVE-CHOOSE_MISMATCH" => Some(
                "Every `when` needs exactly one condition and one block. \
                 Prefer `when(condition, block)` over the parallel setters.",
            ),
            "CONTRACT-VALVE-BAD_LABEL" => Some("Use a non-empty label without surrounding whitespace."),
            "CONTRACT-PIPELINE-DUPLICATE_LABEL" => Some(
                "Rename the inner pipeline's label; a label must identify a single enclosing scope.",
            ),
            "CONTRACT-VALVE-BAD_EXPRESSION" => Some(
                "Expressions take the form `name`, `!name` or `name <op> literal` \
                 with op one of ==, !=, <, <=, >, >=.",
            ),
            _ => None,
        }
    }
}
