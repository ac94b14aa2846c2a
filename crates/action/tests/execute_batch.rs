//! Batch execution: per-item filtering, the four reconciliation
//! strategies, and the positional invariant.

mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use common::{
    EventCollector, MemoryStats, MockDispatcher, PostBatch, ScriptedBatch, StaticPerform,
    services,
};
use relay_action::{
    Action, ActionDefinition, ActionError, BatchOutcome, BatchReturn, ErrorCode, ErrorOutcome,
    ErrorReporter, ExecuteBundle, FieldMap, FieldType, HttpError, HttpResponse, InputField,
    MultiStatusResponse, PerformBatchHandler, StatsContext, SuccessOutcome,
};

fn audience_fields() -> FieldMap {
    let mut fields = FieldMap::new();
    fields.insert(
        "email".into(),
        InputField::new("Email", "The user's email address", FieldType::String).required(),
    );
    fields
}

fn audience_mapping() -> Value {
    json!({"email": "$.email"})
}

/// Three events; the middle one is missing its required field.
fn three_events() -> Vec<Value> {
    vec![
        json!({"email": "a@example.com"}),
        json!({"name": "no email"}),
        json!({"email": "c@example.com"}),
    ]
}

fn batch_action(
    dispatcher: Arc<MockDispatcher>,
    perform_batch: Arc<dyn PerformBatchHandler>,
) -> Action {
    let definition = ActionDefinition::new(
        "Update Audience",
        "Add or remove users from an audience",
        Arc::new(StaticPerform(json!({}))),
    )
    .with_fields(audience_fields())
    .with_perform_batch(perform_batch);
    Action::new("test-destination", definition, services(dispatcher)).unwrap()
}

fn batch_bundle(events: Vec<Value>) -> ExecuteBundle<Vec<Value>> {
    ExecuteBundle::new(events, audience_mapping(), json!({}))
}

fn assert_validation_error(outcome: &BatchOutcome) {
    let error = outcome.as_error().expect("expected a validation error");
    assert_eq!(error.status, 400);
    assert_eq!(error.errortype, ErrorCode::PayloadValidationFailed);
    assert_eq!(error.errorreporter, Some(ErrorReporter::Integrations));
}

#[tokio::test]
async fn undeclared_batch_handler_is_a_configuration_error() {
    let definition = ActionDefinition::new(
        "Update Audience",
        "No batch handler declared",
        Arc::new(StaticPerform(json!({}))),
    );
    let action = Action::new(
        "test-destination",
        definition,
        services(MockDispatcher::new()),
    )
    .unwrap();
    assert!(!action.has_batch_support());

    let err = action.execute_batch(batch_bundle(three_events())).await.unwrap_err();
    assert!(matches!(err, ActionError::NotImplemented { .. }));
    assert_eq!(err.status(), 501);
}

#[tokio::test]
async fn end_to_end_multi_status_scenario() {
    // Batch of 3, event 1 fails validation; the handler sees 2 payloads
    // and reports one success then one destination error.
    let mut response = MultiStatusResponse::new();
    response.push_success(SuccessOutcome::new().with_body(json!({"id": "ok_1"})));
    response.push_error(ErrorOutcome::new(409, "user already exists").with_body(json!({
        "error": "duplicate"
    })));
    let handler = ScriptedBatch::returning(BatchReturn::MultiStatus(response));
    let action = batch_action(MockDispatcher::new(), handler.clone());

    let outcomes = action.execute_batch(batch_bundle(three_events())).await.unwrap();

    assert_eq!(outcomes.len(), 3);
    assert_eq!(
        outcomes[0].as_success().unwrap().body,
        Some(json!({"id": "ok_1"}))
    );
    assert_validation_error(&outcomes[1]);
    let destination_error = outcomes[2].as_error().unwrap();
    assert_eq!(destination_error.status, 409);
    assert_eq!(
        destination_error.errorreporter,
        Some(ErrorReporter::Destination)
    );

    // The handler received only the surviving payloads, compacted.
    assert_eq!(
        handler.seen_payloads.lock()[0],
        vec![json!({"email": "a@example.com"}), json!({"email": "c@example.com"})]
    );
}

#[tokio::test]
async fn all_invalid_short_circuits_without_invoking_the_handler() {
    let handler = ScriptedBatch::returning(BatchReturn::Json(json!(null)));
    let dispatcher = MockDispatcher::new();
    let action = batch_action(dispatcher.clone(), handler.clone());

    let events = vec![json!({"name": "x"}), json!({"name": "y"})];
    let outcomes = action.execute_batch(batch_bundle(events)).await.unwrap();

    assert_eq!(outcomes.len(), 2);
    for outcome in &outcomes {
        assert_validation_error(outcome);
    }
    assert_eq!(*handler.invocations.lock(), 0);
    assert_eq!(dispatcher.request_count(), 0);
}

#[tokio::test]
async fn empty_batch_returns_empty_outcomes() {
    let handler = ScriptedBatch::returning(BatchReturn::Json(json!(null)));
    let action = batch_action(MockDispatcher::new(), handler.clone());

    let outcomes = action.execute_batch(batch_bundle(Vec::new())).await.unwrap();
    assert_eq!(outcomes, Vec::new());
    assert_eq!(*handler.invocations.lock(), 0);
}

#[tokio::test]
async fn legacy_response_fans_out_to_every_surviving_index() {
    let dispatcher = MockDispatcher::new();
    dispatcher.enqueue(Ok(HttpResponse::new(200).with_data(json!({"accepted": 2}))));
    let action = batch_action(dispatcher, Arc::new(PostBatch));

    let outcomes = action.execute_batch(batch_bundle(three_events())).await.unwrap();

    assert_eq!(outcomes.len(), 3);
    let first = outcomes[0].as_success().unwrap();
    assert_eq!(first.status, 200);
    assert_eq!(first.body, Some(json!({"accepted": 2})));
    assert_eq!(first.sent, Some(json!({"email": "a@example.com"})));
    assert_validation_error(&outcomes[1]);
    let third = outcomes[2].as_success().unwrap();
    assert_eq!(third.sent, Some(json!({"email": "c@example.com"})));
}

#[tokio::test]
async fn legacy_error_fans_out_with_the_error_status_and_message() {
    let dispatcher = MockDispatcher::new();
    dispatcher.enqueue(Err(HttpError::new(
        "Too Many Requests",
        HttpResponse::new(429),
    )));
    let action = batch_action(dispatcher, Arc::new(PostBatch));
    let collector = EventCollector::new();
    action.subscribe(collector.clone());

    let outcomes = action.execute_batch(batch_bundle(three_events())).await.unwrap();

    for index in [0, 2] {
        let error = outcomes[index].as_error().unwrap();
        assert_eq!(error.status, 429);
        assert_eq!(error.errormessage, "Too Many Requests");
        assert_eq!(error.body, Some(json!("Too Many Requests")));
        assert_eq!(error.errorreporter, Some(ErrorReporter::Destination));
    }
    assert_validation_error(&outcomes[1]);

    // The failed call still produced a response event.
    assert_eq!(collector.events.lock().len(), 1);
    assert_eq!(collector.events.lock()[0].response.status, 429);
}

#[tokio::test]
async fn unknown_return_value_assumes_total_success() {
    let handler = ScriptedBatch::returning(BatchReturn::Json(json!("whatever")));
    let action = batch_action(MockDispatcher::new(), handler);

    let outcomes = action.execute_batch(batch_bundle(three_events())).await.unwrap();

    let first = outcomes[0].as_success().unwrap();
    assert_eq!(first.status, 200);
    assert_eq!(first.body, Some(json!({})));
    assert_eq!(first.sent, Some(json!({"email": "a@example.com"})));
    assert_validation_error(&outcomes[1]);
    assert_eq!(
        outcomes[2].as_success().unwrap().sent,
        Some(json!({"email": "c@example.com"}))
    );
}

#[tokio::test]
async fn short_multi_status_response_synthesizes_missing_tail() {
    let mut response = MultiStatusResponse::new();
    response.push_success(SuccessOutcome::new().with_body(json!({"id": "ok_1"})));
    let handler = ScriptedBatch::returning(BatchReturn::MultiStatus(response));
    let action = batch_action(MockDispatcher::new(), handler);

    let outcomes = action.execute_batch(batch_bundle(three_events())).await.unwrap();

    // Index 0 got the single entry; index 1 is the validation failure;
    // index 2 ran out of entries and reads as a reporter bug.
    assert!(outcomes[0].is_success());
    assert_validation_error(&outcomes[1]);
    let missing = outcomes[2].as_error().unwrap();
    assert_eq!(missing.status, 500);
    assert!(missing.errormessage.contains("missing an entry"));
    assert_eq!(missing.errorreporter, Some(ErrorReporter::Integrations));
}

#[tokio::test]
async fn discard_and_surplus_counters_are_emitted() {
    let mut response = MultiStatusResponse::new();
    // Two surviving items, three entries: one success, one local error,
    // one surplus.
    response.push_success(SuccessOutcome::new());
    response.push_error(ErrorOutcome::new(400, "refused locally"));
    response.push_success(SuccessOutcome::new());
    let handler = ScriptedBatch::returning(BatchReturn::MultiStatus(response));
    let action = batch_action(MockDispatcher::new(), handler);

    let stats = MemoryStats::new();
    let bundle = batch_bundle(three_events())
        .with_stats(StatsContext::new(stats.clone(), vec!["destination:test".into()]));
    let outcomes = action.execute_batch(bundle).await.unwrap();

    assert_eq!(outcomes.len(), 3);
    // One event discarded by validation.
    assert_eq!(stats.count("action.multistatus_discard"), 1);
    // One structured error entry.
    assert_eq!(stats.count("destination.multistatus_discard"), 1);
    // One entry had no surviving position to land on.
    assert_eq!(stats.count("action.multistatus_surplus"), 1);

    let local_error = outcomes[2].as_error().unwrap();
    assert_eq!(local_error.errorreporter, Some(ErrorReporter::Integrations));
}
