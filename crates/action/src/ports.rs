//! Dependency-injection ports for the engine's external collaborators.
//!
//! The engine consumes mapping resolution, schema derivation/validation,
//! and observability through these object-safe traits. Hosts implement
//! them once and hand the implementations to [`Action::new`]
//! (via [`ActionServices`](crate::action::ActionServices)) or per
//! invocation on the bundle.
//!
//! [`Action::new`]: crate::action::Action::new

use std::sync::Arc;

use serde_json::Value;

use crate::field::FieldMap;

/// Resolves a mapping specification against raw event data.
///
/// The mapping/transform engine itself lives outside this crate; the
/// engine only relies on these two pure operations.
pub trait MappingResolver: Send + Sync {
    /// Resolve a mapping against a single event.
    fn resolve(&self, mapping: &Value, data: &Value) -> Result<Value, MappingError>;

    /// Resolve a mapping against a batch of events.
    ///
    /// Implementations **must** preserve length and order: the payload at
    /// index `i` corresponds to the event at index `i`.
    fn resolve_batch(&self, mapping: &Value, data: &[Value]) -> Result<Vec<Value>, MappingError>;
}

/// Mapping resolution failure.
#[derive(Debug, Clone, thiserror::Error)]
#[error("mapping resolution failed: {message}")]
pub struct MappingError {
    /// Human-readable failure description.
    pub message: String,
}

impl MappingError {
    /// Create a mapping error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Options passed to [`SchemaService::validate`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationOptions<'a> {
    /// Identity key for the schema being applied, used by validator-side
    /// caches and stats (e.g. `"my-destination:Track Event"`).
    pub schema_key: Option<&'a str>,
    /// Stats sink for validator-emitted counters.
    pub stats: Option<&'a StatsContext>,
    /// Field names exempt from strict validation.
    pub exempt_fields: &'a [&'a str],
}

/// A payload rejected by schema validation.
///
/// The message is user-facing: it ends up verbatim in per-item error
/// outcomes and single-call rejections.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct SchemaViolation {
    /// Human-readable description of what failed to validate.
    pub message: String,
}

impl SchemaViolation {
    /// Create a violation with the given user-facing message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Field declarations could not be compiled into a schema document.
#[derive(Debug, Clone, thiserror::Error)]
#[error("schema compilation failed: {message}")]
pub struct SchemaError {
    /// Human-readable failure description.
    pub message: String,
}

impl SchemaError {
    /// Create a schema compilation error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Schema derivation, validation, and empty-value stripping.
///
/// Backed by an external JSON-Schema engine; this crate only defines the
/// contract.
pub trait SchemaService: Send + Sync {
    /// Compile field declarations into a JSON-Schema document.
    fn fields_to_schema(&self, fields: &FieldMap) -> Result<Value, SchemaError>;

    /// Validate a payload against a compiled schema.
    fn validate(
        &self,
        payload: &Value,
        schema: &Value,
        options: &ValidationOptions<'_>,
    ) -> Result<(), SchemaViolation>;

    /// Strip `null` / empty-string values the schema does not explicitly
    /// accept. `single_event` distinguishes the single-event path from
    /// per-item batch stripping.
    fn remove_empty_values(&self, payload: Value, schema: Option<&Value>, single_event: bool)
    -> Value;
}

/// Port trait for counter-style stats emission.
///
/// Implemented by the host's metrics infrastructure; the engine emits
/// `action.multistatus_discard`, `action.multistatus_surplus`, and
/// `destination.multistatus_discard` through it.
pub trait StatsClient: Send + Sync {
    /// Increment a counter by `value`, tagged with `tags`.
    fn incr(&self, name: &str, value: u64, tags: &[String]);
}

/// A stats sink plus the tags every emission carries.
#[derive(Clone)]
pub struct StatsContext {
    /// The host's counter sink.
    pub client: Arc<dyn StatsClient>,
    /// Tags attached to every counter emitted in this invocation.
    pub tags: Vec<String>,
}

impl StatsContext {
    /// Create a stats context with the given sink and tags.
    pub fn new(client: Arc<dyn StatsClient>, tags: Vec<String>) -> Self {
        Self { client, tags }
    }

    /// Increment `name` by one with this context's tags.
    pub fn incr(&self, name: &str) {
        self.client.incr(name, 1, &self.tags);
    }
}

impl std::fmt::Debug for StatsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsContext")
            .field("tags", &self.tags)
            .finish_non_exhaustive()
    }
}

/// Port trait for handler-level logging.
///
/// Handlers use this to emit messages captured by the host's logging
/// infrastructure without coupling to it.
pub trait ActionLogger: Send + Sync {
    /// Log a debug message.
    fn debug(&self, message: &str);
    /// Log an info message.
    fn info(&self, message: &str);
    /// Log a warning.
    fn warn(&self, message: &str);
    /// Log an error.
    fn error(&self, message: &str);
}

/// Cross-step transaction values shared between hooks and handlers within
/// one delivery attempt.
pub trait TransactionContext: Send + Sync {
    /// Read a transaction value.
    fn get(&self, key: &str) -> Option<String>;
    /// Write a transaction value.
    fn set(&self, key: &str, value: String);
}

/// Host-managed request/response state carried across invocations of the
/// same subscription.
pub trait StateContext: Send + Sync {
    /// Read a value stored by an earlier invocation.
    fn get_request_context(&self, key: &str) -> Option<String>;
    /// Store a value for later invocations, with an optional TTL.
    fn set_response_context(&self, key: &str, value: String, ttl_seconds: Option<u64>);
}
