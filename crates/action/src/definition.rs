//! Action definitions: the immutable configuration an [`Action`] is
//! constructed from.
//!
//! [`Action`]: crate::action::Action

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::field::FieldMap;
use crate::handler::{DynamicFieldHandler, PerformBatchHandler, PerformHandler};
use crate::hook::{ActionHookDefinition, ActionHookKind};

/// Reserved dynamic-field child addressing an object field's keys.
pub const KEYS_SENTINEL: &str = "__keys__";

/// Reserved dynamic-field child serving an object field's values when no
/// dedicated per-key handler is registered.
pub const VALUES_SENTINEL: &str = "__values__";

/// The target platform for an action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Server-side delivery.
    #[default]
    Cloud,
    /// Browser-side delivery.
    Web,
}

/// How a subscription applies events to the partner's records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Only create new records.
    Add,
    /// Only update existing records.
    Update,
    /// Create or update.
    Upsert,
    /// Remove records.
    Delete,
}

impl SyncMode {
    /// Parse a mapping-carried value into a sync mode.
    ///
    /// Unrecognized values read as `None`; the reserved key is
    /// caller-controlled and never trusted.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value.as_str()? {
            "add" => Some(Self::Add),
            "update" => Some(Self::Update),
            "upsert" => Some(Self::Upsert),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

/// One selectable sync mode in a definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncModeChoice {
    /// Display label.
    pub label: String,
    /// The mode this choice selects.
    pub value: SyncMode,
}

/// Declares that an action supports sync-mode selection, and which modes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncModeDefinition {
    /// Display label for the selector.
    pub label: String,
    /// Display description for the selector.
    pub description: String,
    /// The mode preselected for new subscriptions.
    pub default: SyncMode,
    /// The modes this action supports.
    pub choices: Vec<SyncModeChoice>,
}

/// A registered dynamic-field position: either one handler for the whole
/// field, or a tree of per-child handlers for object/array-of-object
/// fields (including the reserved [`KEYS_SENTINEL`] / [`VALUES_SENTINEL`]
/// children).
#[derive(Clone)]
pub enum DynamicFieldSlot {
    /// One handler serves the whole field.
    Leaf(Arc<dyn DynamicFieldHandler>),
    /// Per-child handlers, keyed by child name.
    Object(IndexMap<String, Arc<dyn DynamicFieldHandler>>),
}

impl std::fmt::Debug for DynamicFieldSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Leaf(_) => f.write_str("Leaf(..)"),
            Self::Object(children) => f
                .debug_tuple("Object")
                .field(&children.keys().collect::<Vec<_>>())
                .finish(),
        }
    }
}

/// The dynamic-field handler tree of a definition.
///
/// A recursive mapping from path segment to either a leaf handler or a
/// nested mapping, looked up by a small interpreter — never by walking
/// arbitrary properties.
#[derive(Clone, Default)]
pub struct DynamicFields {
    roots: IndexMap<String, DynamicFieldSlot>,
}

impl DynamicFields {
    /// An empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no handlers are registered.
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Register one handler for the whole of `field`.
    pub fn insert_leaf(
        &mut self,
        field: impl Into<String>,
        handler: Arc<dyn DynamicFieldHandler>,
    ) {
        self.roots
            .insert(field.into(), DynamicFieldSlot::Leaf(handler));
    }

    /// Register a handler for one child of an object/array field.
    ///
    /// Replaces a previously-registered leaf for `field`, if any.
    pub fn insert_child(
        &mut self,
        field: impl Into<String>,
        child: impl Into<String>,
        handler: Arc<dyn DynamicFieldHandler>,
    ) {
        let slot = self
            .roots
            .entry(field.into())
            .or_insert_with(|| DynamicFieldSlot::Object(IndexMap::new()));
        match slot {
            DynamicFieldSlot::Object(children) => {
                children.insert(child.into(), handler);
            }
            DynamicFieldSlot::Leaf(_) => {
                let mut children = IndexMap::new();
                children.insert(child.into(), handler);
                *slot = DynamicFieldSlot::Object(children);
            }
        }
    }

    /// The registered slot for a top-level field.
    pub fn slot(&self, field: &str) -> Option<&DynamicFieldSlot> {
        self.roots.get(field)
    }

    /// Whether `field` is registered as an object tree containing `child`.
    pub fn has_child(&self, field: &str, child: &str) -> bool {
        matches!(
            self.roots.get(field),
            Some(DynamicFieldSlot::Object(children)) if children.contains_key(child)
        )
    }

    /// Resolve a handler path (`"field"` or `"field.child"`) to its
    /// registered handler.
    pub fn lookup(&self, handler_path: &str) -> Option<&Arc<dyn DynamicFieldHandler>> {
        match handler_path.split_once('.') {
            None => match self.roots.get(handler_path)? {
                DynamicFieldSlot::Leaf(handler) => Some(handler),
                DynamicFieldSlot::Object(_) => None,
            },
            Some((field, child)) => match self.roots.get(field)? {
                DynamicFieldSlot::Object(children) => children.get(child),
                DynamicFieldSlot::Leaf(_) => None,
            },
        }
    }
}

impl std::fmt::Debug for DynamicFields {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.roots.iter()).finish()
    }
}

/// Immutable configuration of one action.
///
/// Everything runtime-derived (compiled schemas, support flags) is
/// computed once at [`Action::new`] and cached for the definition's
/// lifetime.
///
/// [`Action::new`]: crate::action::Action::new
#[derive(Clone)]
pub struct ActionDefinition {
    /// Display title.
    pub title: String,
    /// Display description.
    pub description: String,
    /// Target platform.
    pub platform: Platform,
    /// Query used to prepopulate the subscription when first set up.
    pub default_subscription: Option<String>,
    /// Hidden from the UI.
    pub hidden: bool,
    /// The fields used to perform the action; these should match what the
    /// partner API expects.
    pub fields: FieldMap,
    /// The operation performed per event.
    pub perform: Arc<dyn PerformHandler>,
    /// The operation performed per batch, when batching is supported.
    pub perform_batch: Option<Arc<dyn PerformBatchHandler>>,
    /// Runtime choices fetchers, keyed by field path.
    pub dynamic_fields: DynamicFields,
    /// Lifecycle hooks.
    pub hooks: IndexMap<ActionHookKind, ActionHookDefinition>,
    /// Sync-mode selection, when the action supports it.
    pub sync_mode: Option<SyncModeDefinition>,
}

impl ActionDefinition {
    /// Create a definition with the required parts.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        perform: Arc<dyn PerformHandler>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            platform: Platform::default(),
            default_subscription: None,
            hidden: false,
            fields: FieldMap::new(),
            perform,
            perform_batch: None,
            dynamic_fields: DynamicFields::new(),
            hooks: IndexMap::new(),
            sync_mode: None,
        }
    }

    /// Set the field declarations.
    pub fn with_fields(mut self, fields: FieldMap) -> Self {
        self.fields = fields;
        self
    }

    /// Declare batch support.
    pub fn with_perform_batch(mut self, handler: Arc<dyn PerformBatchHandler>) -> Self {
        self.perform_batch = Some(handler);
        self
    }

    /// Register a choices fetcher for a whole field.
    pub fn with_dynamic_field(
        mut self,
        field: impl Into<String>,
        handler: Arc<dyn DynamicFieldHandler>,
    ) -> Self {
        self.dynamic_fields.insert_leaf(field, handler);
        self
    }

    /// Register a choices fetcher for one child of an object/array field.
    pub fn with_dynamic_field_child(
        mut self,
        field: impl Into<String>,
        child: impl Into<String>,
        handler: Arc<dyn DynamicFieldHandler>,
    ) -> Self {
        self.dynamic_fields.insert_child(field, child, handler);
        self
    }

    /// Declare a lifecycle hook.
    pub fn with_hook(mut self, kind: ActionHookKind, hook: ActionHookDefinition) -> Self {
        self.hooks.insert(kind, hook);
        self
    }

    /// Declare sync-mode support.
    pub fn with_sync_mode(mut self, sync_mode: SyncModeDefinition) -> Self {
        self.sync_mode = Some(sync_mode);
        self
    }

    /// Set the default subscription query.
    pub fn with_default_subscription(mut self, query: impl Into<String>) -> Self {
        self.default_subscription = Some(query.into());
        self
    }
}

impl std::fmt::Debug for ActionDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionDefinition")
            .field("title", &self.title)
            .field("platform", &self.platform)
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .field("has_perform_batch", &self.perform_batch.is_some())
            .field("dynamic_fields", &self.dynamic_fields)
            .field("hooks", &self.hooks.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
