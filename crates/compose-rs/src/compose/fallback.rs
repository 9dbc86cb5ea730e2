//! Substitute values for inactive sections.

use serde_json::{Value, json};

use crate::sections::{Fallback, FallbackAction};

/// Value an inactive section stores, or `None` when its key must be absent.
///
/// | action | stored |
/// |--------|--------|
/// | `null` | `null` |
/// | `emptyObject` | `fallback.value`, else `{}` |
/// | `omit` / `skip` | nothing |
pub fn fallback_value(fallback: &Fallback) -> Option<Value> {
    match fallback.action {
        FallbackAction::Null => Some(Value::Null),
        FallbackAction::EmptyObject => Some(fallback.value.clone().unwrap_or_else(|| json!({}))),
        FallbackAction::Omit | FallbackAction::Skip => None,
    }
}
