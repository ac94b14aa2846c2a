//! Field-path resolution for dynamic-field requests.
//!
//! Maps a dotted/bracketed field address coming from the UI to the
//! handler path it is served by, plus the selection context the handler
//! needs:
//!
//! - `"structured.first_name"` → handler `"structured.first_name"`
//! - `"unstructuredObject.testProperty"` (no dedicated handler for
//!   `testProperty`) → handler `"unstructuredObject.__values__"` with
//!   `selected_key = "testProperty"`
//! - `"structuredArray.[0].first_name"` → handler
//!   `"structuredArray.first_name"` with `selected_array_index = 0`

use crate::bundle::DynamicFieldContext;
use crate::definition::{DynamicFieldSlot, DynamicFields, VALUES_SENTINEL};

/// A resolved field address: where the handler lives and what part of the
/// field the request selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDynamicField {
    /// The path the handler is registered under.
    pub handler_path: String,
    /// Selection context to attach to the handler's input.
    pub context: Option<DynamicFieldContext>,
}

/// Resolve a field address against a definition's dynamic-field tree.
///
/// Rules, in priority order:
/// 1. `parent.[index].child` — array element access is erased from the
///    handler path (one handler serves all elements); the index travels
///    as context.
/// 2. `parent.child` where `parent` is registered as an object tree
///    without a dedicated `child` handler — served by the parent's
///    generic `__values__` handler, with the requested sub-key as
///    context.
/// 3. `parent.child` with a dedicated handler — the path is used
///    unchanged.
/// 4. Anything else — the path is used unchanged, no context.
///
/// Resolution never fails: an address with no registered handler resolves
/// to a path the subsequent lookup will miss, which the engine turns into
/// a soft 404-style response.
pub fn resolve(dynamic_fields: &DynamicFields, field: &str) -> ResolvedDynamicField {
    if let Some((parent, index, child)) = split_array(field) {
        return ResolvedDynamicField {
            handler_path: format!("{parent}.{child}"),
            context: Some(DynamicFieldContext::array_index(index)),
        };
    }

    if let Some((parent, child)) = split_object(field)
        && let Some(DynamicFieldSlot::Object(children)) = dynamic_fields.slot(parent)
        && !children.contains_key(child)
    {
        return ResolvedDynamicField {
            handler_path: format!("{parent}.{VALUES_SENTINEL}"),
            context: Some(DynamicFieldContext::key(child)),
        };
    }

    ResolvedDynamicField {
        handler_path: field.to_owned(),
        context: None,
    }
}

/// Split `parent.[index].child`, taking the rightmost well-formed index
/// segment so nested parents keep their own brackets.
fn split_array(field: &str) -> Option<(&str, usize, &str)> {
    let mut search_end = field.len();
    while let Some(start) = field[..search_end].rfind(".[") {
        let after = &field[start + 2..];
        if let Some(close) = after.find("].") {
            let digits = &after[..close];
            let parent = &field[..start];
            let child = &after[close + 2..];
            if !digits.is_empty()
                && digits.bytes().all(|b| b.is_ascii_digit())
                && !parent.is_empty()
                && !child.is_empty()
                && let Ok(index) = digits.parse::<usize>()
            {
                return Some((parent, index, child));
            }
        }
        search_end = start;
    }
    None
}

/// Split `parent.child` at the rightmost delimiter.
fn split_object(field: &str) -> Option<(&str, &str)> {
    let (parent, child) = field.rsplit_once('.')?;
    if parent.is_empty() || child.is_empty() {
        return None;
    }
    Some((parent, child))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::bundle::DynamicFieldInput;
    use crate::dynamic::DynamicFieldResponse;
    use crate::error::ActionError;
    use crate::handler::DynamicFieldHandler;
    use crate::request::RequestClient;

    struct NoChoices;

    #[async_trait]
    impl DynamicFieldHandler for NoChoices {
        async fn fetch(
            &self,
            _request: &RequestClient,
            _data: &DynamicFieldInput,
        ) -> Result<DynamicFieldResponse, ActionError> {
            Ok(DynamicFieldResponse::default())
        }
    }

    fn tree() -> DynamicFields {
        let handler = || -> Arc<dyn DynamicFieldHandler> { Arc::new(NoChoices) };
        let mut fields = DynamicFields::new();
        fields.insert_leaf("audience_id", handler());
        fields.insert_child("structured", "first_name", handler());
        fields.insert_child("structuredArray", "first_name", handler());
        fields.insert_child("unstructuredObject", VALUES_SENTINEL, handler());
        fields
    }

    #[test]
    fn dedicated_child_handler_passes_through() {
        let resolved = resolve(&tree(), "structured.first_name");
        assert_eq!(resolved.handler_path, "structured.first_name");
        assert_eq!(resolved.context, None);
    }

    #[test]
    fn object_subkey_falls_back_to_values_handler() {
        let resolved = resolve(&tree(), "unstructuredObject.testProperty");
        assert_eq!(resolved.handler_path, "unstructuredObject.__values__");
        assert_eq!(
            resolved.context,
            Some(DynamicFieldContext::key("testProperty"))
        );
    }

    #[test]
    fn array_index_is_erased_into_context() {
        let resolved = resolve(&tree(), "structuredArray.[2].first_name");
        assert_eq!(resolved.handler_path, "structuredArray.first_name");
        assert_eq!(resolved.context, Some(DynamicFieldContext::array_index(2)));
    }

    #[rstest]
    #[case("audience_id")]
    #[case("unknown_field")]
    #[case("structured")]
    fn undelimited_paths_pass_through(#[case] field: &str) {
        let resolved = resolve(&tree(), field);
        assert_eq!(resolved.handler_path, field);
        assert_eq!(resolved.context, None);
    }

    #[test]
    fn structured_sibling_without_dedicated_handler_gets_values_path() {
        // `structured` is an object tree, but only `first_name` has a
        // dedicated handler; other children route to `__values__` even
        // though none is registered (the lookup then misses, softly).
        let resolved = resolve(&tree(), "structured.last_name");
        assert_eq!(resolved.handler_path, "structured.__values__");
        assert_eq!(
            resolved.context,
            Some(DynamicFieldContext::key("last_name"))
        );
    }

    #[test]
    fn rightmost_index_segment_wins() {
        let resolved = resolve(&tree(), "outer.[1].inner.[3].name");
        assert_eq!(resolved.handler_path, "outer.[1].inner.name");
        assert_eq!(resolved.context, Some(DynamicFieldContext::array_index(3)));
    }

    #[test]
    fn malformed_index_segment_is_not_an_array_access() {
        let resolved = resolve(&tree(), "structuredArray.[x].first_name");
        assert_eq!(resolved.handler_path, "structuredArray.[x].first_name");
        assert_eq!(resolved.context, None);
    }
}
