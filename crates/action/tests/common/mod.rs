//! Shared collaborator doubles for the engine's integration tests.
//!
//! The real mapping, schema, and HTTP engines live outside this crate;
//! these doubles implement just enough of each port contract to drive
//! the engine end to end.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use relay_action::{
    ActionError, ActionServices, BatchReturn, DynamicFieldHandler, DynamicFieldInput,
    DynamicFieldResponse, ExecuteInput, FieldMap, HookHandler, HookResponse, HttpDispatcher,
    HttpError, HttpRequest, HttpResponse, MappingError, MappingResolver, PerformBatchHandler,
    PerformHandler, PerformReturn, RequestClient, RequestOptions, ResponseEvent,
    ResponseObserver, SchemaError, SchemaService, SchemaViolation, StatsClient,
    ValidationOptions,
};

/// Mapping resolver over a small template language: object values that
/// are strings of the form `"$.key"` read that key from the event data,
/// everything else is literal.
pub struct TemplateResolver;

impl TemplateResolver {
    fn apply(mapping: &Value, data: &Value) -> Value {
        match mapping {
            Value::Object(entries) => Value::Object(
                entries
                    .iter()
                    .filter(|(key, _)| !key.starts_with("__"))
                    .filter_map(|(key, template)| {
                        Self::apply_entry(template, data).map(|value| (key.clone(), value))
                    })
                    .collect(),
            ),
            other => Self::apply_entry(other, data).unwrap_or(Value::Null),
        }
    }

    /// `None` means the pointer missed; the key is left out entirely, the
    /// way the real transform drops unresolved directives.
    fn apply_entry(template: &Value, data: &Value) -> Option<Value> {
        match template {
            Value::String(text) => match text.strip_prefix("$.") {
                Some(path) => data.get(path).cloned(),
                None => Some(template.clone()),
            },
            Value::Object(_) => Some(Self::apply(template, data)),
            other => Some(other.clone()),
        }
    }
}

impl MappingResolver for TemplateResolver {
    fn resolve(&self, mapping: &Value, data: &Value) -> Result<Value, MappingError> {
        Ok(Self::apply(mapping, data))
    }

    fn resolve_batch(&self, mapping: &Value, data: &[Value]) -> Result<Vec<Value>, MappingError> {
        Ok(data.iter().map(|event| Self::apply(mapping, event)).collect())
    }
}

/// Schema service that compiles field declarations to a required-keys
/// document and validates presence/nullability only.
pub struct RequiredFieldsSchema;

impl SchemaService for RequiredFieldsSchema {
    fn fields_to_schema(&self, fields: &FieldMap) -> Result<Value, SchemaError> {
        let required: Vec<&str> = fields
            .iter()
            .filter(|(_, field)| field.required)
            .map(|(name, _)| name.as_str())
            .collect();
        let nullable: Vec<&str> = fields
            .iter()
            .filter(|(_, field)| field.allow_null)
            .map(|(name, _)| name.as_str())
            .collect();
        Ok(json!({
            "type": "object",
            "required": required,
            "nullable": nullable,
        }))
    }

    fn validate(
        &self,
        payload: &Value,
        schema: &Value,
        _options: &ValidationOptions<'_>,
    ) -> Result<(), SchemaViolation> {
        let required = schema["required"].as_array().cloned().unwrap_or_default();
        for name in required {
            let name = name.as_str().unwrap_or_default();
            if payload.get(name).is_none_or(Value::is_null) {
                return Err(SchemaViolation::new(format!(
                    "missing required field `{name}`"
                )));
            }
        }
        Ok(())
    }

    fn remove_empty_values(
        &self,
        payload: Value,
        schema: Option<&Value>,
        _single_event: bool,
    ) -> Value {
        let nullable: Vec<String> = schema
            .and_then(|schema| schema["nullable"].as_array().cloned())
            .unwrap_or_default()
            .into_iter()
            .filter_map(|name| name.as_str().map(str::to_owned))
            .collect();
        match payload {
            Value::Object(entries) => Value::Object(
                entries
                    .into_iter()
                    .filter(|(name, value)| {
                        if value.is_null() {
                            nullable.iter().any(|n| n == name)
                        } else {
                            *value != json!("")
                        }
                    })
                    .collect(),
            ),
            other => other,
        }
    }
}

/// Scripted HTTP dispatcher: pops pre-programmed results in order and
/// records every request it sees.
#[derive(Default)]
pub struct MockDispatcher {
    results: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
    pub requests: Mutex<Vec<HttpRequest>>,
    pub options_seen: Mutex<Vec<RequestOptions>>,
    pub saw_cancellation: Mutex<Vec<bool>>,
}

impl MockDispatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn enqueue(&self, result: Result<HttpResponse, HttpError>) {
        self.results.lock().push_back(result);
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl HttpDispatcher for MockDispatcher {
    async fn dispatch(
        &self,
        request: HttpRequest,
        options: &RequestOptions,
        cancellation: Option<&CancellationToken>,
    ) -> Result<HttpResponse, HttpError> {
        self.requests.lock().push(request);
        self.options_seen.lock().push(options.clone());
        self.saw_cancellation.lock().push(cancellation.is_some());
        self.results
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(HttpResponse::new(200)))
    }
}

/// Response-event collector.
#[derive(Default)]
pub struct EventCollector {
    pub events: Mutex<Vec<ResponseEvent>>,
}

impl EventCollector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl ResponseObserver for EventCollector {
    fn on_response(&self, event: &ResponseEvent) {
        self.events.lock().push(event.clone());
    }
}

/// In-memory counter sink.
#[derive(Default)]
pub struct MemoryStats {
    pub counters: Mutex<HashMap<String, u64>>,
}

impl MemoryStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn count(&self, name: &str) -> u64 {
        self.counters.lock().get(name).copied().unwrap_or(0)
    }
}

impl StatsClient for MemoryStats {
    fn incr(&self, name: &str, value: u64, _tags: &[String]) {
        *self.counters.lock().entry(name.to_owned()).or_insert(0) += value;
    }
}

/// Perform handler that posts the resolved payload to the partner and
/// returns the raw response.
pub struct CallPartner;

#[async_trait]
impl PerformHandler for CallPartner {
    async fn perform(
        &self,
        request: &RequestClient,
        data: &ExecuteInput<Value>,
    ) -> Result<PerformReturn, ActionError> {
        let url = url::Url::parse("https://partner.example/events").expect("static url");
        let response = request
            .request(HttpRequest::post(url, data.payload.clone()))
            .await?;
        Ok(response.into())
    }
}

/// Perform handler that records the inputs it receives and returns a
/// fixed JSON value without calling out.
#[derive(Default)]
pub struct RecordingPerform {
    pub result: Value,
    pub seen: Mutex<Vec<ExecuteInput<Value>>>,
}

impl RecordingPerform {
    pub fn returning(result: Value) -> Arc<Self> {
        Arc::new(Self {
            result,
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl PerformHandler for RecordingPerform {
    async fn perform(
        &self,
        _request: &RequestClient,
        data: &ExecuteInput<Value>,
    ) -> Result<PerformReturn, ActionError> {
        self.seen.lock().push(data.clone());
        Ok(self.result.clone().into())
    }
}

/// Perform handler that returns a fixed JSON value without calling out.
pub struct StaticPerform(pub Value);

#[async_trait]
impl PerformHandler for StaticPerform {
    async fn perform(
        &self,
        _request: &RequestClient,
        _data: &ExecuteInput<Value>,
    ) -> Result<PerformReturn, ActionError> {
        Ok(self.0.clone().into())
    }
}

/// Batch handler that returns a scripted [`BatchReturn`] and records the
/// payload lists it receives.
pub struct ScriptedBatch {
    result: Mutex<Option<BatchReturn>>,
    pub seen_payloads: Mutex<Vec<Vec<Value>>>,
    pub invocations: Mutex<u64>,
}

impl ScriptedBatch {
    pub fn returning(result: BatchReturn) -> Arc<Self> {
        Arc::new(Self {
            result: Mutex::new(Some(result)),
            seen_payloads: Mutex::new(Vec::new()),
            invocations: Mutex::new(0),
        })
    }
}

#[async_trait]
impl PerformBatchHandler for ScriptedBatch {
    async fn perform_batch(
        &self,
        _request: &RequestClient,
        data: &ExecuteInput<Vec<Value>>,
    ) -> Result<BatchReturn, ActionError> {
        *self.invocations.lock() += 1;
        self.seen_payloads.lock().push(data.payload.clone());
        Ok(self
            .result
            .lock()
            .clone()
            .expect("scripted batch handler invoked without a result"))
    }
}

/// Batch handler that performs one physical request and lifts the result.
pub struct PostBatch;

#[async_trait]
impl PerformBatchHandler for PostBatch {
    async fn perform_batch(
        &self,
        request: &RequestClient,
        data: &ExecuteInput<Vec<Value>>,
    ) -> Result<BatchReturn, ActionError> {
        let url = url::Url::parse("https://partner.example/events/batch").expect("static url");
        let result = request
            .request(HttpRequest::post(url, Value::Array(data.payload.clone())))
            .await;
        Ok(result.into())
    }
}

/// Dynamic-field handler that returns scripted choices and records the
/// inputs it was invoked with.
#[derive(Default)]
pub struct RecordingDynamic {
    pub response: DynamicFieldResponse,
    pub seen: Mutex<Vec<DynamicFieldInput>>,
}

impl RecordingDynamic {
    pub fn with_response(response: DynamicFieldResponse) -> Arc<Self> {
        Arc::new(Self {
            response,
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl DynamicFieldHandler for RecordingDynamic {
    async fn fetch(
        &self,
        _request: &RequestClient,
        data: &DynamicFieldInput,
    ) -> Result<DynamicFieldResponse, ActionError> {
        self.seen.lock().push(data.clone());
        Ok(self.response.clone())
    }
}

/// Hook handler returning a fixed response.
pub struct StaticHook(pub HookResponse);

#[async_trait]
impl HookHandler for StaticHook {
    async fn perform_hook(
        &self,
        _request: &RequestClient,
        _data: &ExecuteInput<Value>,
    ) -> Result<HookResponse, ActionError> {
        Ok(self.0.clone())
    }
}

/// Services wired with the standard doubles and the given dispatcher.
pub fn services(dispatcher: Arc<MockDispatcher>) -> ActionServices {
    ActionServices {
        mapping: Arc::new(TemplateResolver),
        schema: Arc::new(RequiredFieldsSchema),
        http: dispatcher,
    }
}
