//! Step results produced by the single-event execution path.

use serde::Serialize;
use serde_json::Value;

/// One completed stage of a single-event execution.
///
/// `execute` returns the full trail; the last entry carries the parsed
/// handler output.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StepResult {
    /// What the stage did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Data produced by the stage, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl StepResult {
    /// A stage note with no data.
    pub fn note(output: impl Into<String>) -> Self {
        Self {
            output: Some(output.into()),
            data: None,
        }
    }

    /// A stage note carrying produced data.
    pub fn with_data(output: impl Into<String>, data: Value) -> Self {
        Self {
            output: Some(output.into()),
            data: Some(data),
        }
    }
}
