//! Handler contracts: the traits partner integrations implement, and the
//! closed set of return shapes the engine knows how to reconcile.

use async_trait::async_trait;
use serde_json::Value;

use crate::bundle::{DynamicFieldInput, ExecuteInput};
use crate::dynamic::DynamicFieldResponse;
use crate::error::ActionError;
use crate::hook::HookResponse;
use crate::multi_status::MultiStatusResponse;
use crate::request::{HttpError, HttpResponse, RequestClient};

/// What a single-event `perform` handler may return.
///
/// A raw partner response is normalized (parsed `data`, then `content`)
/// before it reaches the caller; anything else is passed through as-is.
#[derive(Debug, Clone)]
pub enum PerformReturn {
    /// A normalized partner response.
    HttpResponse(HttpResponse),
    /// Any other value the handler chose to return.
    Json(Value),
}

impl From<HttpResponse> for PerformReturn {
    fn from(response: HttpResponse) -> Self {
        Self::HttpResponse(response)
    }
}

impl From<Value> for PerformReturn {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

/// What a `perform_batch` handler may return.
///
/// Exactly one of four reconciliation strategies applies to each variant;
/// the engine dispatches on the variant, never on structure.
#[derive(Debug, Clone)]
pub enum BatchReturn {
    /// Legacy: one response for the entire batch. Fanned out to every
    /// surviving item.
    HttpResponse(HttpResponse),
    /// Legacy: one transport failure for the entire batch. Fanned out to
    /// every surviving item with the error's status and message.
    HttpError(HttpError),
    /// Structured per-item outcomes, in surviving-item order.
    MultiStatus(MultiStatusResponse),
    /// Anything else: the engine assumes total success.
    Json(Value),
}

impl From<HttpResponse> for BatchReturn {
    fn from(response: HttpResponse) -> Self {
        Self::HttpResponse(response)
    }
}

impl From<HttpError> for BatchReturn {
    fn from(error: HttpError) -> Self {
        Self::HttpError(error)
    }
}

impl From<MultiStatusResponse> for BatchReturn {
    fn from(response: MultiStatusResponse) -> Self {
        Self::MultiStatus(response)
    }
}

impl From<Value> for BatchReturn {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<Result<HttpResponse, HttpError>> for BatchReturn {
    /// Lift a request-client result directly into a batch return, so a
    /// handler can end with `Ok(client.request(req).await.into())`.
    fn from(result: Result<HttpResponse, HttpError>) -> Self {
        match result {
            Ok(response) => Self::HttpResponse(response),
            Err(error) => Self::HttpError(error),
        }
    }
}

/// The operation performed when an action is triggered for one event.
#[async_trait]
pub trait PerformHandler: Send + Sync {
    /// Perform the partner call for one resolved payload.
    async fn perform(
        &self,
        request: &RequestClient,
        data: &ExecuteInput<Value>,
    ) -> Result<PerformReturn, ActionError>;
}

/// The operation performed when an action is triggered for a batch of
/// events, made as one physical request.
///
/// The handler receives surviving payloads in compacted order (original
/// order minus validation-failed items) and is invoked exactly once per
/// batch regardless of size.
#[async_trait]
pub trait PerformBatchHandler: Send + Sync {
    /// Perform the partner call for a batch of resolved payloads.
    async fn perform_batch(
        &self,
        request: &RequestClient,
        data: &ExecuteInput<Vec<Value>>,
    ) -> Result<BatchReturn, ActionError>;
}

/// Fetches the valid choices for a dynamic field from the partner.
#[async_trait]
pub trait DynamicFieldHandler: Send + Sync {
    /// Fetch choices for the field addressed by `data`.
    async fn fetch(
        &self,
        request: &RequestClient,
        data: &DynamicFieldInput,
    ) -> Result<DynamicFieldResponse, ActionError>;
}

/// The operation performed when a lifecycle hook is triggered.
#[async_trait]
pub trait HookHandler: Send + Sync {
    /// Perform the hook, optionally calling the partner through `request`.
    async fn perform_hook(
        &self,
        request: &RequestClient,
        data: &ExecuteInput<Value>,
    ) -> Result<HookResponse, ActionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_return_from_request_result() {
        let ok: Result<HttpResponse, HttpError> = Ok(HttpResponse::new(200));
        assert!(matches!(BatchReturn::from(ok), BatchReturn::HttpResponse(_)));

        let err: Result<HttpResponse, HttpError> =
            Err(HttpError::new("boom", HttpResponse::new(500)));
        assert!(matches!(BatchReturn::from(err), BatchReturn::HttpError(_)));
    }
}
