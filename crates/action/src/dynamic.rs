//! Dynamic-field choices: responses returned by runtime choice fetchers.

use serde::{Deserialize, Serialize};

/// One selectable choice for a dynamic field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicFieldChoice {
    /// Human-readable display label.
    pub label: String,
    /// The value produced when this choice is selected.
    pub value: String,
    /// Optional tooltip or help text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl DynamicFieldChoice {
    /// Create a choice with no description.
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            description: None,
        }
    }
}

/// Error payload carried by a failed choices response.
///
/// This is data, not an `Err`: a missing handler or an upstream rejection
/// surfaces as an empty choice list with this attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicFieldError {
    /// Human-readable failure description.
    pub message: String,
    /// Machine-readable code, HTTP-status-style (e.g. `"404"`).
    pub code: String,
}

/// The valid choices for a dynamic field, fetched from the partner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicFieldResponse {
    /// The fetched choices.
    pub choices: Vec<DynamicFieldChoice>,
    /// Cursor for fetching the next page, when the partner paginates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page: Option<String>,
    /// Failure payload, when the fetch did not produce choices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<DynamicFieldError>,
}

impl DynamicFieldResponse {
    /// A successful response with the given choices.
    pub fn with_choices(choices: Vec<DynamicFieldChoice>) -> Self {
        Self {
            choices,
            next_page: None,
            error: None,
        }
    }

    /// The soft-failure response for a field with no registered handler.
    pub fn not_found(field: &str) -> Self {
        Self {
            choices: Vec::new(),
            next_page: Some(String::new()),
            error: Some(DynamicFieldError {
                message: format!("no dynamic field named `{field}` found"),
                code: "404".to_owned(),
            }),
        }
    }
}
