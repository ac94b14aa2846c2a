use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered map of field declarations, keyed by field name.
///
/// Declaration order is user-visible (it drives form rendering), so the
/// map preserves insertion order.
pub type FieldMap = IndexMap<String, InputField>;

/// The value type a field accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum FieldType {
    /// Short free-form text.
    String,
    /// Long free-form text.
    Text,
    /// Floating-point number.
    Number,
    /// Whole number.
    Integer,
    /// ISO-8601 timestamp.
    Datetime,
    /// True/false toggle.
    Boolean,
    /// Secret value, masked in the UI.
    Password,
    /// Nested JSON object.
    Object,
}

/// Declaration of one input field of an action.
///
/// These declarations should match what the partner API expects; the
/// schema compiled from them is what resolved payloads are validated
/// against before any call is made.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputField {
    /// Display label.
    pub label: String,
    /// Display description.
    pub description: String,
    /// The value type this field accepts.
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Whether a value must be present after mapping resolution.
    #[serde(default)]
    pub required: bool,
    /// Whether the field accepts a list of values.
    #[serde(default)]
    pub multiple: bool,
    /// Whether valid choices are fetched from the partner at runtime.
    #[serde(default)]
    pub dynamic: bool,
    /// Whether an explicit `null` is accepted (exempts the field from
    /// empty-value stripping).
    #[serde(default)]
    pub allow_null: bool,
    /// Hidden from the UI; set programmatically only.
    #[serde(default)]
    pub unsafe_hidden: bool,
    /// Default value applied when the mapping leaves the field unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

impl InputField {
    /// Create a field with the minimum required declaration.
    pub fn new(
        label: impl Into<String>,
        description: impl Into<String>,
        field_type: FieldType,
    ) -> Self {
        Self {
            label: label.into(),
            description: description.into(),
            field_type,
            required: false,
            multiple: false,
            dynamic: false,
            allow_null: false,
            unsafe_hidden: false,
            default: None,
        }
    }

    /// Mark the field as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Mark the field as accepting multiple values.
    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    /// Mark the field's choices as runtime-fetched.
    pub fn dynamic(mut self) -> Self {
        self.dynamic = true;
        self
    }

    /// Accept explicit `null` values.
    pub fn allow_null(mut self) -> Self {
        self.allow_null = true;
        self
    }

    /// Set the default value.
    pub fn with_default(mut self, value: serde_json::Value) -> Self {
        self.default = Some(value);
        self
    }
}
