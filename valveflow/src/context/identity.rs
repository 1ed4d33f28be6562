//! Invocation identity for correlating events and logs.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Identifies one invocation, optionally tied to the request that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationIdentity {
    /// The unique ID for this invocation.
    pub invocation_id: Uuid,

    /// The ID of the request being served, if the caller has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<Uuid>,
}

impl Default for InvocationIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl InvocationIdentity {
    /// Creates a new identity with a generated invocation ID.
    #[must_use]
    pub fn new() -> Self {
        Self {
            invocation_id: Uuid::new_v4(),
            request_id: None,
        }
    }

    /// Sets the request ID.
    #[must_use]
    pub fn with_request_id(mut self, request_id: Uuid) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Converts to a dictionary with string values (or null).
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();

        map.insert(
            "invocation_id".to_string(),
            serde_json::json!(self.invocation_id.to_string()),
        );
        map.insert(
            "request_id".to_string(),
            self.request_id
                .map_or(serde_json::Value::Null, |id| serde_json::json!(id.to_string())),
        );

        map
    }
}
