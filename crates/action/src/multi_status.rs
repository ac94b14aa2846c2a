//! Per-item outcome containers for batch calls made as one physical
//! request.
//!
//! A batch handler reports heterogeneous per-item results by returning a
//! [`MultiStatusResponse`]; the engine reconciles it (or one of the
//! legacy return shapes) into a dense array of [`BatchOutcome`]s indexed
//! by the event's original position in the batch.

use serde::Serialize;
use serde_json::Value;

use crate::error::ErrorCode;

/// Which layer is attributed as the source of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorReporter {
    /// The partner API was called and rejected the item.
    Destination,
    /// The item never reached the partner; the failure is local
    /// (validation or handler-side rejection).
    Integrations,
}

/// A successful per-item outcome.
///
/// The payload is handler-chosen: an echo of the sent body, an ID, or any
/// other value the partner returned for the item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuccessOutcome {
    /// HTTP status attributed to the item.
    pub status: u16,
    /// The payload that was sent for this item, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent: Option<Value>,
    /// The partner's response body for this item, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl SuccessOutcome {
    /// A bare 200 outcome.
    pub fn new() -> Self {
        Self {
            status: 200,
            sent: None,
            body: None,
        }
    }

    /// Override the status.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Record the payload sent for this item.
    pub fn with_sent(mut self, sent: Value) -> Self {
        self.sent = Some(sent);
        self
    }

    /// Record the partner's response body for this item.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

impl Default for SuccessOutcome {
    fn default() -> Self {
        Self::new()
    }
}

/// A failed per-item outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorOutcome {
    /// HTTP status attributed to the item.
    pub status: u16,
    /// Machine-readable error classification. Inferred from `status` at
    /// construction time when not set explicitly.
    pub errortype: ErrorCode,
    /// Human-readable failure description.
    pub errormessage: String,
    /// The payload that was sent for this item, when the partner was
    /// actually called.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent: Option<Value>,
    /// The partner's response body for this item, when the partner was
    /// actually called.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// Failure attribution, filled in by the engine during
    /// reconciliation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errorreporter: Option<ErrorReporter>,
}

impl ErrorOutcome {
    /// Create an error outcome, inferring `errortype` from the status.
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            errortype: ErrorCode::from_status(status),
            errormessage: message.into(),
            sent: None,
            body: None,
            errorreporter: None,
        }
    }

    /// Override the inferred error classification.
    pub fn with_errortype(mut self, errortype: ErrorCode) -> Self {
        self.errortype = errortype;
        self
    }

    /// Record the payload sent for this item.
    pub fn with_sent(mut self, sent: Value) -> Self {
        self.sent = Some(sent);
        self
    }

    /// Record the partner's response body for this item.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub(crate) fn with_reporter(mut self, reporter: ErrorReporter) -> Self {
        self.errorreporter = Some(reporter);
        self
    }

    /// Whether the outcome carries evidence the partner was actually
    /// called: a non-empty `sent` or `body`.
    pub fn reached_destination(&self) -> bool {
        has_content(self.sent.as_ref()) || has_content(self.body.as_ref())
    }
}

fn has_content(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

/// One entry of a [`MultiStatusResponse`].
#[derive(Debug, Clone, PartialEq)]
pub enum MultiStatusEntry {
    /// The item was delivered.
    Success(SuccessOutcome),
    /// The item failed.
    Error(ErrorOutcome),
}

impl MultiStatusEntry {
    /// Whether this entry is a success.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

impl From<SuccessOutcome> for MultiStatusEntry {
    fn from(outcome: SuccessOutcome) -> Self {
        Self::Success(outcome)
    }
}

impl From<ErrorOutcome> for MultiStatusEntry {
    fn from(outcome: ErrorOutcome) -> Self {
        Self::Error(outcome)
    }
}

/// Ordered, sparse, index-addressable list of per-item outcomes.
///
/// This is a batch handler's declared way of reporting heterogeneous
/// per-item results for one physical request. Entries are in
/// *surviving-item* order — the compacted order the handler received
/// payloads in — not in original batch positions; the engine maps them
/// back to original positions during reconciliation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultiStatusResponse {
    entries: Vec<Option<MultiStatusEntry>>,
}

impl MultiStatusResponse {
    /// An empty response.
    pub fn new() -> Self {
        Self::default()
    }

    /// Length of the response: the highest index used, not a fixed
    /// capacity. Unset positions inside that range read as missing.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no index has been used yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a success outcome.
    pub fn push_success(&mut self, outcome: SuccessOutcome) {
        self.entries.push(Some(MultiStatusEntry::Success(outcome)));
    }

    /// Append an error outcome.
    pub fn push_error(&mut self, outcome: ErrorOutcome) {
        self.entries.push(Some(MultiStatusEntry::Error(outcome)));
    }

    /// Append an entry of either kind.
    pub fn push_entry(&mut self, entry: MultiStatusEntry) {
        self.entries.push(Some(entry));
    }

    /// Set a success outcome at an explicit index, growing the response
    /// as needed.
    pub fn set_success_at_index(&mut self, index: usize, outcome: SuccessOutcome) {
        self.set_entry_at_index(index, MultiStatusEntry::Success(outcome));
    }

    /// Set an error outcome at an explicit index, growing the response
    /// as needed.
    pub fn set_error_at_index(&mut self, index: usize, outcome: ErrorOutcome) {
        self.set_entry_at_index(index, MultiStatusEntry::Error(outcome));
    }

    /// Set an entry of either kind at an explicit index, growing the
    /// response as needed.
    pub fn set_entry_at_index(&mut self, index: usize, entry: MultiStatusEntry) {
        if index >= self.entries.len() {
            self.entries.resize(index + 1, None);
        }
        self.entries[index] = Some(entry);
    }

    /// Clear the entry at `index` without shifting later entries; the
    /// length is unchanged and the position reads as missing.
    pub fn unset_at_index(&mut self, index: usize) {
        if let Some(slot) = self.entries.get_mut(index) {
            *slot = None;
        }
    }

    /// The entry at `index`, if one was set.
    pub fn get_at_index(&self, index: usize) -> Option<&MultiStatusEntry> {
        self.entries.get(index).and_then(Option::as_ref)
    }

    /// Whether the entry at `index` is a set success outcome.
    pub fn is_success_at_index(&self, index: usize) -> bool {
        matches!(
            self.get_at_index(index),
            Some(MultiStatusEntry::Success(_))
        )
    }

    /// Whether the entry at `index` is a set error outcome.
    pub fn is_error_at_index(&self, index: usize) -> bool {
        matches!(self.get_at_index(index), Some(MultiStatusEntry::Error(_)))
    }

    /// Iterate over all positions, missing ones included.
    pub fn iter(&self) -> impl Iterator<Item = Option<&MultiStatusEntry>> {
        self.entries.iter().map(Option::as_ref)
    }

    pub(crate) fn into_entries(self) -> Vec<Option<MultiStatusEntry>> {
        self.entries
    }
}

/// The resolved outcome for one original batch position.
///
/// `execute_batch` returns exactly one of these per inbound event, at the
/// event's original index. Callers must match on the kind — absence of an
/// error variant is the only success signal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BatchOutcome {
    /// The event was delivered.
    Success(SuccessOutcome),
    /// The event failed, before or after reaching the partner.
    Error(ErrorOutcome),
}

impl BatchOutcome {
    /// Whether this outcome is a success.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// HTTP status attributed to the item.
    pub fn status(&self) -> u16 {
        match self {
            Self::Success(outcome) => outcome.status,
            Self::Error(outcome) => outcome.status,
        }
    }

    /// The error outcome, if this is a failure.
    pub fn as_error(&self) -> Option<&ErrorOutcome> {
        match self {
            Self::Error(outcome) => Some(outcome),
            Self::Success(_) => None,
        }
    }

    /// The success outcome, if this is a success.
    pub fn as_success(&self) -> Option<&SuccessOutcome> {
        match self {
            Self::Success(outcome) => Some(outcome),
            Self::Error(_) => None,
        }
    }
}
