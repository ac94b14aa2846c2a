//! Lifecycle hooks: operations triggered at points in a subscription's
//! lifecycle rather than per event.
//!
//! A hook may call the partner through the same request primitive as
//! regular actions; its returned `saved_data` is persisted into the
//! mapping and later surfaces to handlers as a hook output.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::field::InputField;
use crate::handler::{DynamicFieldHandler, HookHandler};

/// The supported hook kinds.
///
/// The serialized name doubles as the reserved mapping key under which a
/// hook's saved outputs are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionHookKind {
    /// Runs when the user saves a mapping.
    OnMappingSave,
    /// Runs when the user saves a sync configuration.
    OnSyncSave,
}

impl ActionHookKind {
    /// All supported hook kinds.
    pub const ALL: [Self; 2] = [Self::OnMappingSave, Self::OnSyncSave];

    /// The stable wire/mapping-key name of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OnMappingSave => "on-mapping-save",
            Self::OnSyncSave => "on-sync-save",
        }
    }
}

impl std::fmt::Display for ActionHookKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One configuration field of a hook.
///
/// Unlike action fields, a hook field carries its choices fetcher
/// directly; the engine flattens it to a `dynamic` flag when compiling
/// the hook's schema.
#[derive(Clone)]
pub struct HookInputField {
    /// The field declaration.
    pub field: InputField,
    /// Runtime choices fetcher, when the field is dynamic.
    pub dynamic_handler: Option<Arc<dyn DynamicFieldHandler>>,
}

impl HookInputField {
    /// A static hook field.
    pub fn new(field: InputField) -> Self {
        Self {
            field,
            dynamic_handler: None,
        }
    }

    /// Attach a runtime choices fetcher.
    pub fn with_dynamic_handler(mut self, handler: Arc<dyn DynamicFieldHandler>) -> Self {
        self.dynamic_handler = Some(handler);
        self
    }
}

impl std::fmt::Debug for HookInputField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookInputField")
            .field("field", &self.field)
            .field("dynamic_handler", &self.dynamic_handler.is_some())
            .finish()
    }
}

/// Declared shape of one value a hook saves for later use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookOutputType {
    /// Display label.
    pub label: String,
    /// Display description.
    pub description: String,
    /// The value type, JSON-Schema style (e.g. `"string"`).
    #[serde(rename = "type")]
    pub value_type: String,
    /// Whether the hook always produces this value.
    pub required: bool,
}

/// Declaration of one lifecycle hook.
#[derive(Clone)]
pub struct ActionHookDefinition {
    /// Display label.
    pub label: String,
    /// Display description.
    pub description: String,
    /// Configuration fields filled by the user before the hook runs.
    pub input_fields: IndexMap<String, HookInputField>,
    /// Declared shape of the hook's saved outputs.
    pub output_types: IndexMap<String, HookOutputType>,
    /// The operation to perform when this hook triggers.
    pub perform_hook: Arc<dyn HookHandler>,
}

impl ActionHookDefinition {
    /// Create a hook with no input fields or output types.
    pub fn new(
        label: impl Into<String>,
        description: impl Into<String>,
        perform_hook: Arc<dyn HookHandler>,
    ) -> Self {
        Self {
            label: label.into(),
            description: description.into(),
            input_fields: IndexMap::new(),
            output_types: IndexMap::new(),
            perform_hook,
        }
    }

    /// Add a configuration field.
    pub fn with_input_field(mut self, name: impl Into<String>, field: HookInputField) -> Self {
        self.input_fields.insert(name.into(), field);
        self
    }

    /// Declare a saved-output value.
    pub fn with_output_type(mut self, name: impl Into<String>, output: HookOutputType) -> Self {
        self.output_types.insert(name.into(), output);
        self
    }
}

impl std::fmt::Debug for ActionHookDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionHookDefinition")
            .field("label", &self.label)
            .field("input_fields", &self.input_fields.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Error payload carried by a failed hook response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookError {
    /// User-facing failure message.
    pub message: String,
    /// Machine-readable code.
    pub code: String,
}

/// What a hook returns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HookResponse {
    /// User-facing message shown on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_message: Option<String>,
    /// Values persisted into the mapping for later use in the action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_data: Option<Value>,
    /// Failure payload; a hook failure is data, shown to the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<HookError>,
}

impl HookResponse {
    /// A successful response with a user-facing message.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success_message: Some(message.into()),
            saved_data: None,
            error: None,
        }
    }

    /// Attach saved data to persist into the mapping.
    pub fn with_saved_data(mut self, data: Value) -> Self {
        self.saved_data = Some(data);
        self
    }

    /// A failed response.
    pub fn failure(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            success_message: None,
            saved_data: None,
            error: Some(HookError {
                message: message.into(),
                code: code.into(),
            }),
        }
    }
}
