//! Reconciliation of handler return values into per-index outcomes.
//!
//! A batch handler may return one of four shapes ([`BatchReturn`]); each
//! has its own strategy for filling the outcome array. All strategies
//! share two invariants: the output is addressed in *original* batch
//! positions, and slots already resolved by payload validation are never
//! overwritten.

use serde_json::Value;
use tracing::warn;

use crate::error::ErrorCode;
use crate::handler::BatchReturn;
use crate::multi_status::{
    BatchOutcome, ErrorOutcome, ErrorReporter, MultiStatusEntry, MultiStatusResponse,
    SuccessOutcome,
};
use crate::ports::StatsContext;
use crate::prepare::DISCARD_COUNTER;
use crate::request::{HttpError, HttpResponse};

/// Counter emitted when a structured response carries more entries than
/// there were surviving items.
const SURPLUS_COUNTER: &str = "action.multistatus_surplus";

/// Counter emitted when a structured error outcome is attributed to the
/// destination.
const DESTINATION_DISCARD_COUNTER: &str = "destination.multistatus_discard";

/// Fixed-size outcome table addressed by original batch position.
///
/// `resolve` fills empty slots only; whoever resolves an index first wins.
/// Validation failures are seeded before the handler runs, which is what
/// keeps reconciliation from ever touching them.
#[derive(Debug)]
pub(crate) struct OutcomeSlots {
    slots: Vec<Option<BatchOutcome>>,
}

impl OutcomeSlots {
    pub(crate) fn new(batch_len: usize) -> Self {
        Self {
            slots: vec![None; batch_len],
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn is_resolved(&self, index: usize) -> bool {
        matches!(self.slots.get(index), Some(Some(_)))
    }

    /// Resolve `index`, unless it already is.
    pub(crate) fn resolve(&mut self, index: usize, outcome: BatchOutcome) {
        if let Some(slot) = self.slots.get_mut(index)
            && slot.is_none()
        {
            *slot = Some(outcome);
        }
    }

    /// Densify into the caller-facing array. Positions no strategy
    /// resolved surface as the synthetic missing-entry error rather than
    /// being dropped.
    pub(crate) fn finish(self) -> Vec<BatchOutcome> {
        self.slots
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| BatchOutcome::Error(missing_entry_error())))
            .collect()
    }
}

fn missing_entry_error() -> ErrorOutcome {
    ErrorOutcome::new(500, "multi-status response is missing an entry at the expected position")
        .with_errortype(ErrorCode::PayloadValidationFailed)
        .with_reporter(ErrorReporter::Integrations)
}

/// Apply the reconciliation strategy selected by the handler's return
/// shape.
///
/// `filtered_payloads` is the compacted surviving-payload list the
/// handler received; fan-out strategies correlate `sent` values by
/// walking it in order against the unresolved original indices.
pub(crate) fn reconcile(
    slots: &mut OutcomeSlots,
    handler_return: BatchReturn,
    filtered_payloads: &[Value],
    stats: Option<&StatsContext>,
) {
    match handler_return {
        BatchReturn::HttpResponse(response) => fan_out_response(slots, &response, filtered_payloads),
        BatchReturn::HttpError(error) => fan_out_error(slots, &error, filtered_payloads),
        BatchReturn::MultiStatus(response) => {
            consume_multi_status(slots, response, stats);
        }
        BatchReturn::Json(_) => fan_out_assumed_success(slots, filtered_payloads),
    }
}

/// Legacy single response: every surviving item receives the same status
/// and parsed body, with `sent` correlated from the surviving payloads.
fn fan_out_response(slots: &mut OutcomeSlots, response: &HttpResponse, payloads: &[Value]) {
    let body = response.parsed_body();
    fan_out(slots, payloads, |sent| {
        if response.status >= 400 {
            BatchOutcome::Error(
                ErrorOutcome::new(response.status, body_message(&body))
                    .with_body(body.clone())
                    .with_sent(sent)
                    .with_reporter(ErrorReporter::Destination),
            )
        } else {
            BatchOutcome::Success(
                SuccessOutcome::new()
                    .with_status(response.status)
                    .with_body(body.clone())
                    .with_sent(sent),
            )
        }
    });
}

/// Legacy error: like the response fan-out, but the body is the error
/// message and the status comes from the error's response.
fn fan_out_error(slots: &mut OutcomeSlots, error: &HttpError, payloads: &[Value]) {
    fan_out(slots, payloads, |sent| {
        BatchOutcome::Error(
            ErrorOutcome::new(error.response.status, error.message.clone())
                .with_body(Value::String(error.message.clone()))
                .with_sent(sent)
                .with_reporter(ErrorReporter::Destination),
        )
    });
}

/// Unrecognized return value: assume the entire surviving batch succeeded.
fn fan_out_assumed_success(slots: &mut OutcomeSlots, payloads: &[Value]) {
    fan_out(slots, payloads, |sent| {
        BatchOutcome::Success(
            SuccessOutcome::new()
                .with_body(Value::Object(serde_json::Map::new()))
                .with_sent(sent),
        )
    });
}

/// User-facing message for a body-only failure: strings verbatim,
/// anything else in its JSON form.
fn body_message(body: &Value) -> String {
    match body {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn fan_out(
    slots: &mut OutcomeSlots,
    payloads: &[Value],
    mut outcome: impl FnMut(Value) -> BatchOutcome,
) {
    let mut payload_read_index = 0;
    for index in 0..slots.len() {
        if slots.is_resolved(index) {
            continue;
        }
        let sent = payloads
            .get(payload_read_index)
            .cloned()
            .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
        payload_read_index += 1;
        slots.resolve(index, outcome(sent));
    }
}

/// Structured multi-status: entries are in surviving-item order and are
/// consumed sequentially — never indexed directly — while walking the
/// original positions. A missing entry resolves its position with a
/// synthetic 500 instead of aborting the batch.
fn consume_multi_status(
    slots: &mut OutcomeSlots,
    response: MultiStatusResponse,
    stats: Option<&StatsContext>,
) {
    let provided = response.len();
    let mut entries = response.into_entries().into_iter();
    let mut consumed = 0usize;

    for index in 0..slots.len() {
        if slots.is_resolved(index) {
            continue;
        }

        let Some(entry) = entries.next().flatten() else {
            // Either the handler returned too few entries or it unset one
            // mid-list; both read as a reporter bug for this item.
            slots.resolve(index, BatchOutcome::Error(missing_entry_error()));
            consumed += 1;
            if let Some(stats) = stats {
                stats.incr(DISCARD_COUNTER);
            }
            continue;
        };
        consumed += 1;

        match entry {
            MultiStatusEntry::Success(outcome) => {
                slots.resolve(index, BatchOutcome::Success(outcome));
            }
            MultiStatusEntry::Error(outcome) => {
                let reporter = if outcome.reached_destination() {
                    ErrorReporter::Destination
                } else {
                    ErrorReporter::Integrations
                };
                slots.resolve(index, BatchOutcome::Error(outcome.with_reporter(reporter)));
                if let Some(stats) = stats {
                    stats.incr(DESTINATION_DISCARD_COUNTER);
                }
            }
        }
    }

    if provided > consumed {
        // Entries with no position to land on are a handler bug; report
        // them instead of dropping them silently.
        warn!(
            provided,
            consumed,
            surplus = provided - consumed,
            "multi-status response carries more entries than surviving batch items"
        );
        if let Some(stats) = stats {
            stats.incr(SURPLUS_COUNTER);
        }
    }
}
