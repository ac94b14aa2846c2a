//! # Relay Action Engine
//!
//! Execution and multi-status reconciliation engine for partner
//! integration actions.
//!
//! An action turns one or more inbound structured events into partner-API
//! calls: the engine resolves each event through an external mapping
//! engine, validates the resolved payload against the action's declared
//! schema, invokes the partner-supplied handler through a shared request
//! primitive, and — for batches — reconciles whatever shape of result the
//! handler returned into per-event outcomes addressable by the event's
//! original position in the batch.
//!
//! This crate defines **what** actions are and **how results are
//! reconciled**, but not how mappings resolve, how schemas validate, or
//! how HTTP is spoken. It follows the Ports & Drivers architecture:
//! collaborator contracts live in [`ports`] and [`request`], concrete
//! engines are injected by the host.
//!
//! ## Core Types
//!
//! - [`Action`] — an executable action bound to its destination and
//!   services, with schemas compiled once at construction
//! - [`ActionDefinition`] — immutable configuration: fields, handlers,
//!   dynamic-field tree, hooks, sync modes
//! - [`ExecuteBundle`] / [`ExecuteInput`] — per-invocation inputs, as
//!   supplied by the caller and as received by handlers
//! - [`MultiStatusResponse`] — a batch handler's per-item outcomes for
//!   one physical request
//! - [`BatchOutcome`] — the resolved outcome for one original batch
//!   position
//! - [`ActionError`] — engine-level failures (single path and caller
//!   configuration errors only; batch-item failures are data)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use relay_action::*;
//! use async_trait::async_trait;
//!
//! struct SendEvent;
//!
//! #[async_trait]
//! impl PerformHandler for SendEvent {
//!     async fn perform(
//!         &self,
//!         request: &RequestClient,
//!         data: &ExecuteInput<serde_json::Value>,
//!     ) -> Result<PerformReturn, ActionError> {
//!         let url = url::Url::parse("https://partner.example/events")?;
//!         let response = request
//!             .request(HttpRequest::post(url, data.payload.clone()))
//!             .await?;
//!         Ok(response.into())
//!     }
//! }
//!
//! let definition = ActionDefinition::new("Send Event", "Deliver one event", Arc::new(SendEvent));
//! let action = Action::new("my-destination", definition, services)?;
//! let results = action.execute(bundle).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// The action engine: execution entry points and outcome orchestration.
pub mod action;
/// Per-invocation inputs for callers and handlers.
pub mod bundle;
/// Action definitions and the dynamic-field handler tree.
pub mod definition;
/// Dynamic-field choices responses.
pub mod dynamic;
/// Engine error types and the HTTP-status error-code mapping.
pub mod error;
/// Input field declarations.
pub mod field;
/// Field-path resolution for dynamic-field requests.
pub mod field_path;
/// Handler contracts and their closed return shapes.
pub mod handler;
/// Lifecycle hook declarations and responses.
pub mod hook;
/// Per-item outcome containers for batch calls.
pub mod multi_status;
/// Dependency-injection ports for external collaborators.
pub mod ports;
mod prepare;
mod reconcile;
/// The shared request-invocation primitive.
pub mod request;
/// Step results of the single-event path.
pub mod result;

// ── Public re-exports ───────────────────────────────────────────────────────

pub use action::{Action, ActionServices};
pub use bundle::{
    AuthTokens, DynamicFieldContext, DynamicFieldInput, ExecuteBundle, ExecuteInput,
    RESERVED_MATCHING_KEY, RESERVED_SYNC_MODE, SecureString,
};
pub use definition::{
    ActionDefinition, DynamicFieldSlot, DynamicFields, KEYS_SENTINEL, Platform, SyncMode,
    SyncModeChoice, SyncModeDefinition, VALUES_SENTINEL,
};
pub use dynamic::{DynamicFieldChoice, DynamicFieldError, DynamicFieldResponse};
pub use error::{ActionError, ErrorCode};
pub use field::{FieldMap, FieldType, InputField};
pub use field_path::{ResolvedDynamicField, resolve as resolve_dynamic_field_path};
pub use handler::{
    BatchReturn, DynamicFieldHandler, HookHandler, PerformBatchHandler, PerformHandler,
    PerformReturn,
};
pub use hook::{
    ActionHookDefinition, ActionHookKind, HookError, HookInputField, HookOutputType, HookResponse,
};
pub use multi_status::{
    BatchOutcome, ErrorOutcome, ErrorReporter, MultiStatusEntry, MultiStatusResponse,
    SuccessOutcome,
};
pub use ports::{
    ActionLogger, MappingError, MappingResolver, SchemaError, SchemaService, SchemaViolation,
    StateContext, StatsClient, StatsContext, TransactionContext, ValidationOptions,
};
pub use request::{
    HttpDispatcher, HttpError, HttpRequest, HttpResponse, RequestClient, RequestExtension,
    RequestOptions, ResponseEvent, ResponseObserver,
};
pub use result::StepResult;
