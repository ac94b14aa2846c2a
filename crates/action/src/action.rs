//! The action engine: orchestrates preparation, handler invocation, and
//! outcome reconciliation.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::bundle::{
    AuthTokens, DynamicFieldInput, ExecuteBundle, ExecuteInput, RESERVED_MATCHING_KEY,
    RESERVED_SYNC_MODE,
};
use crate::definition::{ActionDefinition, SyncMode};
use crate::dynamic::DynamicFieldResponse;
use crate::error::ActionError;
use crate::field::FieldMap;
use crate::field_path;
use crate::handler::{DynamicFieldHandler, PerformReturn};
use crate::hook::{ActionHookKind, HookResponse};
use crate::multi_status::BatchOutcome;
use crate::ports::{MappingResolver, SchemaService, StatsContext, ValidationOptions};
use crate::prepare::{prepare_batch, prepare_single};
use crate::reconcile::{OutcomeSlots, reconcile};
use crate::request::{
    HttpDispatcher, ObserverList, RequestClient, RequestExtension, ResponseObserver,
};
use crate::result::StepResult;

/// The collaborator implementations an [`Action`] is wired with.
#[derive(Clone)]
pub struct ActionServices {
    /// Mapping/transform engine.
    pub mapping: Arc<dyn MappingResolver>,
    /// Schema derivation and validation.
    pub schema: Arc<dyn SchemaService>,
    /// The HTTP client performing partner calls.
    pub http: Arc<dyn HttpDispatcher>,
}

impl std::fmt::Debug for ActionServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionServices").finish_non_exhaustive()
    }
}

/// An executable action: an [`ActionDefinition`] bound to a destination
/// name and collaborator services, with schemas compiled once at
/// construction.
///
/// Immutable after construction; share it as `Arc<Action>` across
/// concurrent invocations. Each `execute*` call is strictly sequential
/// internally — the only cross-call state is this read-only
/// configuration.
pub struct Action {
    destination_name: String,
    definition: ActionDefinition,
    services: ActionServices,
    extend_request: Option<Arc<dyn RequestExtension>>,
    schema: Option<Value>,
    hook_schemas: HashMap<ActionHookKind, Value>,
    has_batch_support: bool,
    has_hook_support: bool,
    observers: ObserverList,
}

impl Action {
    /// Bind a definition to its destination and services.
    ///
    /// Compiles the action schema (when fields are declared) and one
    /// schema per hook with input fields; these are cached for the
    /// action's lifetime.
    pub fn new(
        destination_name: impl Into<String>,
        definition: ActionDefinition,
        services: ActionServices,
    ) -> Result<Self, ActionError> {
        let destination_name = destination_name.into();
        let has_batch_support = definition.perform_batch.is_some();
        let has_hook_support = !definition.hooks.is_empty();

        let schema = if definition.fields.is_empty() {
            None
        } else {
            Some(services.schema.fields_to_schema(&definition.fields)?)
        };

        let mut hook_schemas = HashMap::new();
        for (kind, hook) in &definition.hooks {
            if hook.input_fields.is_empty() {
                continue;
            }
            // Hook fields carry their choices fetcher directly; flatten
            // it to the `dynamic` flag the schema compiler understands.
            let mut fields = FieldMap::new();
            for (name, input) in &hook.input_fields {
                let mut field = input.field.clone();
                field.dynamic = input.dynamic_handler.is_some() || field.dynamic;
                fields.insert(name.clone(), field);
            }
            hook_schemas.insert(*kind, services.schema.fields_to_schema(&fields)?);
        }

        Ok(Self {
            destination_name,
            definition,
            services,
            extend_request: None,
            schema,
            hook_schemas,
            has_batch_support,
            has_hook_support,
            observers: Arc::new(RwLock::new(Vec::new())),
        })
    }

    /// Attach the per-destination request extension (auth headers etc.).
    pub fn with_request_extension(mut self, extension: Arc<dyn RequestExtension>) -> Self {
        self.extend_request = Some(extension);
        self
    }

    /// Subscribe to the response event emitted for every underlying
    /// partner call.
    pub fn subscribe(&self, observer: Arc<dyn ResponseObserver>) {
        self.observers.write().push(observer);
    }

    /// The definition this action was constructed from.
    pub fn definition(&self) -> &ActionDefinition {
        &self.definition
    }

    /// The destination this action belongs to.
    pub fn destination_name(&self) -> &str {
        &self.destination_name
    }

    /// The compiled payload schema, when fields are declared.
    pub fn schema(&self) -> Option<&Value> {
        self.schema.as_ref()
    }

    /// The compiled input schema of a hook, when it declares input fields.
    pub fn hook_schema(&self, kind: ActionHookKind) -> Option<&Value> {
        self.hook_schemas.get(&kind)
    }

    /// Whether the definition declares a batch handler.
    pub fn has_batch_support(&self) -> bool {
        self.has_batch_support
    }

    /// Whether the definition declares any hooks.
    pub fn has_hook_support(&self) -> bool {
        self.has_hook_support
    }

    /// Execute the action for a single event.
    ///
    /// The pipeline is all-or-nothing: a mapping or validation failure
    /// rejects the whole call. Partial-failure semantics exist only at
    /// batch granularity.
    pub async fn execute(
        &self,
        bundle: ExecuteBundle<Value>,
    ) -> Result<Vec<StepResult>, ActionError> {
        debug!(action = %self.definition.title, "executing action");
        let mut results = Vec::new();

        let payload = prepare_single(
            &bundle.mapping,
            &bundle.data,
            self.schema.as_ref(),
            &self.schema_key(),
            self.services.mapping.as_ref(),
            self.services.schema.as_ref(),
            bundle.stats.as_ref(),
        )?;
        results.push(StepResult::note("Mappings resolved"));
        if self.schema.is_some() {
            results.push(StepResult::note("Payload validated"));
        }

        let input = self.input_from_bundle(&bundle, payload);
        let client = self.request_client(
            &input.settings,
            input.auth.as_ref(),
            input.stats.clone(),
            input.cancellation.clone(),
        );
        let output = self.definition.perform.perform(&client, &input).await?;
        results.push(StepResult::with_data("Action Executed", parse_return(output)));

        Ok(results)
    }

    /// Execute the action for a batch of events.
    ///
    /// Returns exactly one outcome per inbound event, at the event's
    /// original index, regardless of how many items were filtered out or
    /// how the handler reported its results. Items that fail validation
    /// are resolved immediately and never reach the handler; if nothing
    /// survives, the handler is not invoked at all.
    pub async fn execute_batch(
        &self,
        bundle: ExecuteBundle<Vec<Value>>,
    ) -> Result<Vec<BatchOutcome>, ActionError> {
        let Some(perform_batch) = self.definition.perform_batch.clone() else {
            return Err(ActionError::not_implemented(
                "this action does not support batched requests",
            ));
        };
        debug!(
            action = %self.definition.title,
            batch_len = bundle.data.len(),
            "executing action batch"
        );

        let prepared = prepare_batch(
            &bundle.mapping,
            &bundle.data,
            self.schema.as_ref(),
            &self.schema_key(),
            self.services.mapping.as_ref(),
            self.services.schema.as_ref(),
            bundle.stats.as_ref(),
        )?;

        let mut slots = OutcomeSlots::new(prepared.batch_len);
        for (index, outcome) in prepared.failures {
            slots.resolve(index, BatchOutcome::Error(outcome));
        }

        if prepared.payloads.is_empty() {
            // Nothing survived filtering; no call is made for an empty
            // effective batch.
            return Ok(slots.finish());
        }

        let input = self.input_from_bundle(&bundle, prepared.payloads);
        let client = self.request_client(
            &input.settings,
            input.auth.as_ref(),
            input.stats.clone(),
            input.cancellation.clone(),
        );
        let handler_return = perform_batch.perform_batch(&client, &input).await?;
        reconcile(
            &mut slots,
            handler_return,
            &input.payload,
            bundle.stats.as_ref(),
        );

        Ok(slots.finish())
    }

    /// Fetch the valid choices for a dynamic field.
    ///
    /// An explicitly supplied handler (used by dynamic hook input fields)
    /// wins; otherwise the field address is resolved against the
    /// definition's dynamic-field tree. A field with no registered
    /// handler fails softly with an empty-choices 404 response.
    pub async fn execute_dynamic_field(
        &self,
        field: &str,
        mut data: DynamicFieldInput,
        handler_override: Option<Arc<dyn DynamicFieldHandler>>,
    ) -> Result<DynamicFieldResponse, ActionError> {
        let client =
            self.request_client(&data.settings, data.auth.as_ref(), data.stats.clone(), None);

        if let Some(handler) = handler_override {
            return handler.fetch(&client, &data).await;
        }

        let resolved = field_path::resolve(&self.definition.dynamic_fields, field);
        let Some(handler) = self
            .definition
            .dynamic_fields
            .lookup(&resolved.handler_path)
            .cloned()
        else {
            debug!(field, handler_path = %resolved.handler_path, "no dynamic field handler registered");
            return Ok(DynamicFieldResponse::not_found(field));
        };

        data.context = resolved.context;
        handler.fetch(&client, &data).await
    }

    /// Execute a lifecycle hook.
    ///
    /// Requires the definition to declare hook support and the specific
    /// hook to be implemented. When the hook declares input fields, the
    /// supplied inputs are validated against the hook's compiled schema
    /// before the handler runs.
    pub async fn execute_hook(
        &self,
        kind: ActionHookKind,
        data: ExecuteInput<Value>,
    ) -> Result<HookResponse, ActionError> {
        if !self.has_hook_support {
            return Err(ActionError::not_implemented(
                "this action does not support any hooks",
            ));
        }
        let Some(hook) = self.definition.hooks.get(&kind) else {
            return Err(ActionError::not_implemented(format!(
                "missing implementation for hook `{kind}`"
            )));
        };

        if let Some(schema) = self.hook_schemas.get(&kind) {
            let inputs = data.hook_inputs.clone().unwrap_or(Value::Null);
            let options = ValidationOptions {
                schema_key: None,
                stats: data.stats.as_ref(),
                exempt_fields: &[],
            };
            self.services.schema.validate(&inputs, schema, &options)?;
        }

        let client = self.request_client(
            &data.settings,
            data.auth.as_ref(),
            data.stats.clone(),
            data.cancellation.clone(),
        );
        hook.perform_hook.perform_hook(&client, &data).await
    }

    fn schema_key(&self) -> String {
        format!("{}:{}", self.destination_name, self.definition.title)
    }

    /// Turn a bundle into the input handlers receive: reserved keys
    /// extracted, payload attached.
    fn input_from_bundle<D: Clone>(
        &self,
        bundle: &ExecuteBundle<D>,
        payload: D,
    ) -> ExecuteInput<D> {
        ExecuteInput {
            raw_data: Some(bundle.data.clone()),
            raw_mapping: bundle.mapping.clone(),
            settings: bundle.settings.clone(),
            payload,
            audience_settings: bundle.audience_settings.clone(),
            auth: bundle.auth.clone(),
            hook_outputs: self.hook_outputs(&bundle.mapping),
            hook_inputs: None,
            sync_mode: self.sync_mode(&bundle.mapping),
            matching_key: matching_key(&bundle.mapping),
            stats: bundle.stats.clone(),
            logger: bundle.logger.clone(),
            transaction: bundle.transaction.clone(),
            state: bundle.state.clone(),
            cancellation: bundle.cancellation.clone(),
        }
    }

    /// Saved hook outputs live in the mapping under each declared hook's
    /// reserved key.
    fn hook_outputs(&self, mapping: &Value) -> HashMap<ActionHookKind, Value> {
        self.definition
            .hooks
            .keys()
            .filter_map(|kind| Some((*kind, mapping.get(kind.as_str())?.clone())))
            .collect()
    }

    /// The sync mode is honored only when the definition declares
    /// support; unknown values read as absent.
    fn sync_mode(&self, mapping: &Value) -> Option<SyncMode> {
        self.definition.sync_mode.as_ref()?;
        SyncMode::from_value(mapping.get(RESERVED_SYNC_MODE)?)
    }

    fn request_client(
        &self,
        settings: &Value,
        auth: Option<&AuthTokens>,
        stats: Option<StatsContext>,
        cancellation: Option<CancellationToken>,
    ) -> RequestClient {
        let options = self
            .extend_request
            .as_ref()
            .map(|extension| extension.extend(settings, auth))
            .unwrap_or_default();
        RequestClient::new(
            self.services.http.clone(),
            options,
            Arc::clone(&self.observers),
            stats,
            cancellation,
        )
    }
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Action")
            .field("destination_name", &self.destination_name)
            .field("action", &self.definition.title)
            .field("has_batch_support", &self.has_batch_support)
            .field("has_hook_support", &self.has_hook_support)
            .field("has_schema", &self.schema.is_some())
            .finish_non_exhaustive()
    }
}

/// Normalize a single-event handler return: prefer the response's parsed
/// `data`, then its raw `content`; anything else passes through as-is.
fn parse_return(output: PerformReturn) -> Value {
    match output {
        PerformReturn::HttpResponse(response) => match (response.data, response.content) {
            (Some(data), _) => data,
            (None, Some(content)) => Value::String(content),
            (None, None) => Value::Null,
        },
        PerformReturn::Json(value) => value,
    }
}

/// The matching key is caller-controlled; anything non-empty is carried
/// as its string form.
fn matching_key(mapping: &Value) -> Option<String> {
    match mapping.get(RESERVED_MATCHING_KEY)? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
