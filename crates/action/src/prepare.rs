//! Payload preparation: mapping resolution, empty-value stripping, and
//! schema validation composed into one step.
//!
//! The single-event variant aborts on the first failure. The batch
//! variant isolates failures per item: a validation error resolves that
//! item's original index immediately and the rest of the batch proceeds.

use serde_json::Value;
use tracing::debug;

use crate::error::{ActionError, ErrorCode};
use crate::multi_status::{ErrorOutcome, ErrorReporter};
use crate::ports::{MappingResolver, SchemaService, StatsContext, ValidationOptions};

/// Counter emitted when an event is discarded before reaching the
/// handler.
pub(crate) const DISCARD_COUNTER: &str = "action.multistatus_discard";

/// Result of preparing a batch: surviving payloads in compacted order,
/// plus the per-index validation failures.
#[derive(Debug)]
pub(crate) struct PreparedBatch {
    /// Number of events in the inbound batch; every result structure is
    /// addressed in this index space.
    pub batch_len: usize,
    /// Payloads that passed validation, original order preserved minus
    /// removed indices.
    pub payloads: Vec<Value>,
    /// Validation failures, as `(original index, resolved outcome)`.
    pub failures: Vec<(usize, ErrorOutcome)>,
}

/// Resolve, strip, and validate a single event's payload.
pub(crate) fn prepare_single(
    mapping: &Value,
    data: &Value,
    schema: Option<&Value>,
    schema_key: &str,
    resolver: &dyn MappingResolver,
    schemas: &dyn SchemaService,
    stats: Option<&StatsContext>,
) -> Result<Value, ActionError> {
    let payload = resolver.resolve(mapping, data)?;
    let payload = schemas.remove_empty_values(payload, schema, true);

    if let Some(schema) = schema {
        let options = ValidationOptions {
            schema_key: Some(schema_key),
            stats,
            exempt_fields: &[],
        };
        schemas.validate(&payload, schema, &options)?;
    }

    Ok(payload)
}

/// Resolve all events, then strip and validate each independently.
///
/// Items that fail validation are recorded as 400 outcomes at their
/// original index and removed from the surviving payload list; they never
/// reach the handler.
pub(crate) fn prepare_batch(
    mapping: &Value,
    data: &[Value],
    schema: Option<&Value>,
    schema_key: &str,
    resolver: &dyn MappingResolver,
    schemas: &dyn SchemaService,
    stats: Option<&StatsContext>,
) -> Result<PreparedBatch, ActionError> {
    let payloads = resolver.resolve_batch(mapping, data)?;
    let batch_len = payloads.len();

    let Some(schema) = schema else {
        return Ok(PreparedBatch {
            batch_len,
            payloads,
            failures: Vec::new(),
        });
    };

    let options = ValidationOptions {
        schema_key: Some(schema_key),
        stats,
        exempt_fields: &[],
    };

    let mut surviving = Vec::with_capacity(batch_len);
    let mut failures = Vec::new();
    for (index, payload) in payloads.into_iter().enumerate() {
        let payload = schemas.remove_empty_values(payload, Some(schema), false);
        match schemas.validate(&payload, schema, &options) {
            Ok(()) => surviving.push(payload),
            Err(violation) => {
                debug!(index, %violation, "discarding batch item that failed validation");
                failures.push((
                    index,
                    ErrorOutcome::new(400, violation.message)
                        .with_errortype(ErrorCode::PayloadValidationFailed)
                        .with_reporter(ErrorReporter::Integrations),
                ));
                if let Some(stats) = stats {
                    stats.incr(DISCARD_COUNTER);
                }
            }
        }
    }

    Ok(PreparedBatch {
        batch_len,
        payloads: surviving,
        failures,
    })
}
