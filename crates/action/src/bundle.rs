//! Per-invocation inputs: what callers hand the engine and what handlers
//! receive.
//!
//! An [`ExecuteBundle`] is consumed once per call and never mutated. The
//! engine turns it into an [`ExecuteInput`] — mapping resolved, reserved
//! keys extracted — before any handler runs.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::definition::SyncMode;
use crate::hook::ActionHookKind;
use crate::ports::{ActionLogger, StateContext, StatsContext, TransactionContext};

/// Reserved mapping key carrying the subscription's selected sync mode.
pub const RESERVED_SYNC_MODE: &str = "__relay_sync_mode";

/// Reserved mapping key carrying the subscription's matching key.
pub const RESERVED_MATCHING_KEY: &str = "__relay_matching_key";

/// A string that redacts its contents in Debug and Display.
///
/// Used for auth material to prevent accidental logging.
#[derive(Clone)]
pub struct SecureString {
    inner: String,
}

impl SecureString {
    /// Create a new secure string.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            inner: value.into(),
        }
    }

    /// Access the underlying value.
    pub fn expose(&self) -> &str {
        &self.inner
    }
}

impl fmt::Debug for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecureString(***)")
    }
}

impl fmt::Display for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Opaque auth tokens threaded from the caller into handlers and the
/// request extension. The engine never inspects them.
#[derive(Debug, Clone, Default)]
pub struct AuthTokens {
    /// OAuth access token, when the destination uses one.
    pub access_token: Option<SecureString>,
    /// OAuth refresh token, when the destination uses one.
    pub refresh_token: Option<SecureString>,
}

impl AuthTokens {
    /// Tokens carrying only an access token.
    pub fn access(token: impl Into<String>) -> Self {
        Self {
            access_token: Some(SecureString::new(token)),
            refresh_token: None,
        }
    }
}

/// Which part of a dynamic field a choices request is about.
///
/// Produced by the field-path resolver and attached to the handler's
/// input: array element access is erased from the handler path, with the
/// selected index carried here instead; object sub-fields served by a
/// generic `__values__` handler receive the requested sub-key.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DynamicFieldContext {
    /// Index of the array element the request addresses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_array_index: Option<usize>,
    /// Object sub-key the request addresses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_key: Option<String>,
}

impl DynamicFieldContext {
    /// Context selecting an array element.
    pub fn array_index(index: usize) -> Self {
        Self {
            selected_array_index: Some(index),
            selected_key: None,
        }
    }

    /// Context selecting an object sub-key.
    pub fn key(key: impl Into<String>) -> Self {
        Self {
            selected_array_index: None,
            selected_key: Some(key.into()),
        }
    }
}

/// Everything one `execute` / `execute_batch` call needs.
///
/// `D` is the raw event data: a single `Value` for `execute`, a
/// `Vec<Value>` for `execute_batch`.
#[derive(Clone)]
pub struct ExecuteBundle<D> {
    /// Raw inbound event data.
    pub data: D,
    /// Mapping specification resolved against the data.
    pub mapping: Value,
    /// Destination settings.
    pub settings: Value,
    /// Audience settings, for audience-scoped destinations.
    pub audience_settings: Option<Value>,
    /// Auth tokens threaded into handlers and the request extension.
    pub auth: Option<AuthTokens>,
    /// Stats sink for this invocation.
    pub stats: Option<StatsContext>,
    /// Logger for handler-emitted messages.
    pub logger: Option<Arc<dyn ActionLogger>>,
    /// Cross-step transaction values.
    pub transaction: Option<Arc<dyn TransactionContext>>,
    /// Host-managed cross-invocation state.
    pub state: Option<Arc<dyn StateContext>>,
    /// Cooperative cancellation signal, threaded unchanged into the
    /// request layer.
    pub cancellation: Option<CancellationToken>,
}

impl<D> ExecuteBundle<D> {
    /// Create a bundle with the required inputs.
    pub fn new(data: D, mapping: Value, settings: Value) -> Self {
        Self {
            data,
            mapping,
            settings,
            audience_settings: None,
            auth: None,
            stats: None,
            logger: None,
            transaction: None,
            state: None,
            cancellation: None,
        }
    }

    /// Attach audience settings.
    pub fn with_audience_settings(mut self, settings: Value) -> Self {
        self.audience_settings = Some(settings);
        self
    }

    /// Attach auth tokens.
    pub fn with_auth(mut self, auth: AuthTokens) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Attach a stats context.
    pub fn with_stats(mut self, stats: StatsContext) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Attach a logger.
    pub fn with_logger(mut self, logger: Arc<dyn ActionLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Attach a transaction context.
    pub fn with_transaction(mut self, transaction: Arc<dyn TransactionContext>) -> Self {
        self.transaction = Some(transaction);
        self
    }

    /// Attach a state context.
    pub fn with_state(mut self, state: Arc<dyn StateContext>) -> Self {
        self.state = Some(state);
        self
    }

    /// Attach a cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

impl<D: fmt::Debug> fmt::Debug for ExecuteBundle<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecuteBundle")
            .field("data", &self.data)
            .field("mapping", &self.mapping)
            .field("cancellation", &self.cancellation.is_some())
            .finish_non_exhaustive()
    }
}

/// What handlers receive: the bundle's contents with the mapping already
/// resolved and reserved keys extracted.
///
/// `P` is the resolved payload: a single `Value` for `perform` and hooks,
/// a `Vec<Value>` (surviving items, compacted order) for `perform_batch`.
#[derive(Clone)]
pub struct ExecuteInput<P> {
    /// Raw inbound event data, as received in the bundle.
    pub raw_data: Option<P>,
    /// The unresolved mapping specification.
    pub raw_mapping: Value,
    /// Destination settings.
    pub settings: Value,
    /// The resolved, validated payload(s).
    pub payload: P,
    /// Audience settings, for audience-scoped destinations.
    pub audience_settings: Option<Value>,
    /// Auth tokens.
    pub auth: Option<AuthTokens>,
    /// Values produced by earlier hook executions, keyed by hook kind.
    pub hook_outputs: HashMap<ActionHookKind, Value>,
    /// Inputs for the hook being executed (hook invocations only).
    pub hook_inputs: Option<Value>,
    /// The subscription's sync mode, when the definition declares one and
    /// the mapping carries a recognized value.
    pub sync_mode: Option<SyncMode>,
    /// The subscription's matching key, stringified.
    pub matching_key: Option<String>,
    /// Stats sink for this invocation.
    pub stats: Option<StatsContext>,
    /// Logger for handler-emitted messages.
    pub logger: Option<Arc<dyn ActionLogger>>,
    /// Cross-step transaction values.
    pub transaction: Option<Arc<dyn TransactionContext>>,
    /// Host-managed cross-invocation state.
    pub state: Option<Arc<dyn StateContext>>,
    /// Cooperative cancellation signal.
    pub cancellation: Option<CancellationToken>,
}

impl<P> ExecuteInput<P> {
    /// Create an input with the required parts; everything else defaults
    /// to absent.
    pub fn new(settings: Value, payload: P) -> Self {
        Self {
            raw_data: None,
            raw_mapping: Value::Object(serde_json::Map::new()),
            settings,
            payload,
            audience_settings: None,
            auth: None,
            hook_outputs: HashMap::new(),
            hook_inputs: None,
            sync_mode: None,
            matching_key: None,
            stats: None,
            logger: None,
            transaction: None,
            state: None,
            cancellation: None,
        }
    }

    /// Attach inputs for a hook invocation.
    pub fn with_hook_inputs(mut self, inputs: Value) -> Self {
        self.hook_inputs = Some(inputs);
        self
    }

    /// Attach auth tokens.
    pub fn with_auth(mut self, auth: AuthTokens) -> Self {
        self.auth = Some(auth);
        self
    }
}

impl<P: fmt::Debug> fmt::Debug for ExecuteInput<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecuteInput")
            .field("payload", &self.payload)
            .field("sync_mode", &self.sync_mode)
            .field("matching_key", &self.matching_key)
            .field("cancellation", &self.cancellation.is_some())
            .finish_non_exhaustive()
    }
}

/// Input for a dynamic-field choices request.
#[derive(Clone)]
pub struct DynamicFieldInput {
    /// Destination settings.
    pub settings: Value,
    /// Audience settings, for audience-scoped destinations.
    pub audience_settings: Option<Value>,
    /// The partially-filled payload the user is editing.
    pub payload: Value,
    /// Pagination cursor from a previous choices response.
    pub page: Option<String>,
    /// Auth tokens.
    pub auth: Option<AuthTokens>,
    /// Stats sink for this request.
    pub stats: Option<StatsContext>,
    /// Hook inputs, when the field belongs to a hook.
    pub hook_inputs: Option<Value>,
    /// Which part of the field the request addresses; set by the engine
    /// from the resolved field path.
    pub context: Option<DynamicFieldContext>,
}

impl DynamicFieldInput {
    /// Create an input with the required parts.
    pub fn new(settings: Value, payload: Value) -> Self {
        Self {
            settings,
            audience_settings: None,
            payload,
            page: None,
            auth: None,
            stats: None,
            hook_inputs: None,
            context: None,
        }
    }

    /// Attach a pagination cursor.
    pub fn with_page(mut self, page: impl Into<String>) -> Self {
        self.page = Some(page.into());
        self
    }

    /// Attach auth tokens.
    pub fn with_auth(mut self, auth: AuthTokens) -> Self {
        self.auth = Some(auth);
        self
    }
}

impl fmt::Debug for DynamicFieldInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicFieldInput")
            .field("payload", &self.payload)
            .field("page", &self.page)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}
