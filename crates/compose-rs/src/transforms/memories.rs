//! Memory list transforms: de-duplication and grouping by category.

use std::collections::HashMap;

use serde_json::{Map, Value, json};

use super::{f64_field, items, str_field};
use crate::compose::context::ComposeContext;
use crate::sections::SectionDefinition;

const UNCATEGORIZED: &str = "general";

/// Collapse memories that share a category and key, keeping the most
/// confident one (the earliest on ties). Order of first appearance is kept.
/// Non-array input passes through.
pub fn dedupe_memories(
    input: &Value,
    _ctx: &ComposeContext<'_>,
    _section: &SectionDefinition,
) -> Value {
    let Some(list) = input.as_array() else {
        return input.clone();
    };

    let mut kept: Vec<&Value> = Vec::with_capacity(list.len());
    let mut index: HashMap<String, usize> = HashMap::new();

    for memory in list {
        let Some(identity) = identity_key(memory) else {
            kept.push(memory);
            continue;
        };
        match index.get(&identity) {
            Some(&slot) => {
                if confidence(memory) > confidence(kept[slot]) {
                    kept[slot] = memory;
                }
            }
            None => {
                index.insert(identity, kept.len());
                kept.push(memory);
            }
        }
    }

    Value::Array(kept.into_iter().cloned().collect())
}

/// Memory list → `{totalCount, byCategory}`; the flat list stays under `_all`.
pub fn group_memories(
    input: &Value,
    _ctx: &ComposeContext<'_>,
    _section: &SectionDefinition,
) -> Value {
    let list = items(input);
    let mut by_category: Map<String, Value> = Map::new();

    for memory in list {
        let category = str_field(memory, &["category"]).unwrap_or(UNCATEGORIZED);
        let entry = match (str_field(memory, &["key"]), memory.get("value")) {
            (Some(key), Some(value)) => json!({"key": key, "value": value}),
            _ => memory.clone(),
        };
        if let Value::Array(bucket) = by_category
            .entry(category.to_string())
            .or_insert_with(|| Value::Array(Vec::new()))
        {
            bucket.push(entry);
        }
    }

    json!({
        "totalCount": list.len(),
        "byCategory": by_category,
        "_all": list,
    })
}

fn identity_key(memory: &Value) -> Option<String> {
    let key = str_field(memory, &["key"])?;
    let category = str_field(memory, &["category"]).unwrap_or(UNCATEGORIZED);
    Some(format!("{}::{}", category.to_lowercase(), key.trim().to_lowercase()))
}

fn confidence(memory: &Value) -> f64 {
    f64_field(memory, &["confidence"]).unwrap_or(0.0)
}
