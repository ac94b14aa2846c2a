//! The shared request-invocation primitive.
//!
//! Every partner call — from `perform`, `perform_batch`, dynamic-field
//! fetchers, and hooks alike — goes through a [`RequestClient`]. The
//! client binds the injected [`HttpDispatcher`] to the invocation's
//! options, stats context, and cancellation token, and notifies
//! subscribed [`ResponseObserver`]s of every dispatched call.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http::{HeaderMap, Method};
use parking_lot::RwLock;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::bundle::AuthTokens;
use crate::ports::StatsContext;

/// One partner HTTP call, described before dispatch.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: Method,
    /// Fully-resolved request URL.
    pub url: Url,
    /// Request headers.
    pub headers: HeaderMap,
    /// JSON request body, if any.
    pub body: Option<Value>,
}

impl HttpRequest {
    /// Create a request with no headers and no body.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Shorthand for a GET request.
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Shorthand for a POST request carrying a JSON body.
    pub fn post(url: Url, body: Value) -> Self {
        let mut request = Self::new(Method::POST, url);
        request.body = Some(body);
        request
    }

    /// Attach a JSON body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Per-invocation request configuration, produced by the optional
/// [`RequestExtension`] before any handler runs.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Headers merged into every request (auth headers live here).
    pub headers: HeaderMap,
    /// Query parameters appended to every request.
    pub search_params: Vec<(String, String)>,
    /// Timeout the dispatcher should enforce, if any.
    pub timeout: Option<Duration>,
}

/// A normalized partner response.
///
/// The response-decoration middleware lives in the request layer; by the
/// time a response reaches the engine it exposes a parsed `data` body
/// and/or the raw `content` string.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HeaderMap,
    /// Parsed JSON body, when the response carried one.
    pub data: Option<Value>,
    /// Raw body text, when available.
    pub content: Option<String>,
}

impl HttpResponse {
    /// Create a response with the given status and no body.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            data: None,
            content: None,
        }
    }

    /// Attach a parsed JSON body.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Attach a raw body text.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// The parsed body, preferring `data` over `content`, defaulting to
    /// an empty object when neither is present.
    pub fn parsed_body(&self) -> Value {
        match (&self.data, &self.content) {
            (Some(data), _) => data.clone(),
            (None, Some(content)) => Value::String(content.clone()),
            (None, None) => Value::Object(serde_json::Map::new()),
        }
    }
}

/// A failed partner call, carrying the normalized response that failed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct HttpError {
    /// Human-readable failure description.
    pub message: String,
    /// The normalized response the failure was derived from.
    pub response: HttpResponse,
}

impl HttpError {
    /// Create an error from a message and the failing response.
    pub fn new(message: impl Into<String>, response: HttpResponse) -> Self {
        Self {
            message: message.into(),
            response,
        }
    }
}

/// Performs the actual partner HTTP call.
///
/// The HTTP client, its middleware, and response decoration are external;
/// the engine depends only on this contract. Cancellation enforcement is
/// the dispatcher's job — the engine threads the token through unchanged.
#[async_trait]
pub trait HttpDispatcher: Send + Sync {
    /// Dispatch one request and return its normalized response.
    async fn dispatch(
        &self,
        request: HttpRequest,
        options: &RequestOptions,
        cancellation: Option<&CancellationToken>,
    ) -> Result<HttpResponse, HttpError>;
}

/// Notification emitted for every request dispatched through a
/// [`RequestClient`], for logging/telemetry subscribers.
#[derive(Debug, Clone)]
pub struct ResponseEvent {
    /// The request as dispatched.
    pub request: HttpRequest,
    /// The options the request was dispatched with.
    pub options: RequestOptions,
    /// The normalized response (for failures, the response carried by the
    /// error).
    pub response: HttpResponse,
}

/// Subscriber to [`ResponseEvent`]s.
pub trait ResponseObserver: Send + Sync {
    /// Called after every dispatched request, success or failure.
    fn on_response(&self, event: &ResponseEvent);
}

/// Shared, append-only list of response observers.
pub(crate) type ObserverList = Arc<RwLock<Vec<Arc<dyn ResponseObserver>>>>;

/// Optional per-destination hook producing the base [`RequestOptions`]
/// for an invocation (typically auth headers derived from settings).
pub trait RequestExtension: Send + Sync {
    /// Produce the base request options for one invocation.
    fn extend(&self, settings: &Value, auth: Option<&AuthTokens>) -> RequestOptions;
}

/// The request client handed to every handler.
///
/// Cheap to construct, created once per invocation.
pub struct RequestClient {
    dispatcher: Arc<dyn HttpDispatcher>,
    options: RequestOptions,
    observers: ObserverList,
    stats: Option<StatsContext>,
    cancellation: Option<CancellationToken>,
}

impl RequestClient {
    pub(crate) fn new(
        dispatcher: Arc<dyn HttpDispatcher>,
        options: RequestOptions,
        observers: ObserverList,
        stats: Option<StatsContext>,
        cancellation: Option<CancellationToken>,
    ) -> Self {
        Self {
            dispatcher,
            options,
            observers,
            stats,
            cancellation,
        }
    }

    /// The options every request on this client is dispatched with.
    pub fn options(&self) -> &RequestOptions {
        &self.options
    }

    /// The stats context of the current invocation, if any.
    pub fn stats(&self) -> Option<&StatsContext> {
        self.stats.as_ref()
    }

    /// Dispatch a request and notify subscribed observers.
    ///
    /// Observers are notified for failures too, with the response carried
    /// by the error, so telemetry sees every partner interaction.
    pub async fn request(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let result = self
            .dispatcher
            .dispatch(request.clone(), &self.options, self.cancellation.as_ref())
            .await;

        let response = match &result {
            Ok(response) => response.clone(),
            Err(error) => error.response.clone(),
        };
        let event = ResponseEvent {
            request,
            options: self.options.clone(),
            response,
        };
        for observer in self.observers.read().iter() {
            observer.on_response(&event);
        }

        result
    }
}

impl std::fmt::Debug for RequestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestClient")
            .field("options", &self.options)
            .field("cancellation", &self.cancellation.is_some())
            .finish_non_exhaustive()
    }
}
