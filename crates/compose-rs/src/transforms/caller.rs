//! Transforms over the subject record and its directly attached fragments.

use serde_json::{Map, Value, json};

use super::{f64_field, humanize, items, str_field};
use crate::compose::context::ComposeContext;
use crate::sections::SectionDefinition;
use crate::template::LevelThresholds;

/// Calls listed in `recent` by [`summarize_call_history`].
const RECENT_CALL_LIMIT: usize = 3;

/// Subject record → the caller facts a prompt needs. The raw record is kept
/// under `_record` for later sections.
pub fn map_caller_info(
    input: &Value,
    _ctx: &ComposeContext<'_>,
    _section: &SectionDefinition,
) -> Value {
    let mut out = Map::new();
    if let Some(id) = input.get("id").filter(|v| v.is_string() || v.is_number()) {
        out.insert("id".into(), id.clone());
    }
    if let Some(name) = str_field(input, &["name", "displayName"]) {
        out.insert("name".into(), json!(name));
        if let Some(first) = name.split_whitespace().next() {
            out.insert("firstName".into(), json!(first));
        }
    }
    let copied = [
        ("locale", "locale"),
        ("timezone", "timezone"),
        ("createdAt", "memberSince"),
    ];
    for (from, to) in copied {
        if let Some(v) = str_field(input, &[from]) {
            out.insert(to.into(), json!(v));
        }
    }
    let domain = input
        .get("domain")
        .and_then(|d| str_field(d, &["name"]).or_else(|| d.as_str()));
    if let Some(domain) = domain {
        out.insert("domain".into(), json!(domain));
    }
    out.insert("_record".into(), input.clone());
    Value::Object(out)
}

/// Personality scores → labelled traits plus a one-line summary.
///
/// Accepts `{"traits": {"warmth": 0.8}}` or a flat `{"warmth": 0.8}`; non-numeric
/// entries are ignored. Raw scores stay available under `_scores`.
pub fn map_personality(
    input: &Value,
    _ctx: &ComposeContext<'_>,
    _section: &SectionDefinition,
) -> Value {
    let Some(scores) = input.get("traits").unwrap_or(input).as_object() else {
        return Value::Null;
    };
    let thresholds = LevelThresholds::default();

    let mut traits = Vec::new();
    let mut notable = Vec::new();
    let mut raw = Map::new();
    for (id, score) in scores {
        let Some(score) = score.as_f64() else {
            continue;
        };
        let name = humanize(id);
        let level = thresholds.level(score);
        if level != "medium" {
            notable.push(format!("{level} {}", name.to_lowercase()));
        }
        traits.push(json!({"id": id, "name": name, "score": score, "level": level}));
        raw.insert(id.clone(), json!(score));
    }

    let summary = if notable.is_empty() {
        "Balanced profile with no strongly marked traits.".to_string()
    } else {
        let mut text = notable.join(", ");
        if let Some(first) = text.get(..1) {
            text = first.to_uppercase() + text.get(1..).unwrap_or_default();
        }
        format!("{text}.")
    };

    json!({
        "traits": traits,
        "summary": summary,
        "_scores": raw,
    })
}

/// Recent call list → count, totals and the latest few summaries.
pub fn summarize_call_history(
    input: &Value,
    _ctx: &ComposeContext<'_>,
    _section: &SectionDefinition,
) -> Value {
    let mut calls: Vec<&Value> = items(input).iter().collect();
    if calls.is_empty() {
        return Value::Null;
    }
    calls.sort_by(|a, b| {
        let at = |c: &Value| {
            str_field(c, &["startedAt", "createdAt"])
                .unwrap_or_default()
                .to_string()
        };
        at(b).cmp(&at(a))
    });

    let total_seconds: f64 = calls
        .iter()
        .filter_map(|c| f64_field(c, &["durationSeconds"]))
        .sum();
    let recent: Vec<Value> = calls
        .iter()
        .take(RECENT_CALL_LIMIT)
        .map(|c| {
            json!({
                "when": str_field(c, &["startedAt", "createdAt"]),
                "summary": str_field(c, &["summary"]).unwrap_or("No summary recorded."),
            })
        })
        .collect();

    json!({
        "totalCalls": calls.len(),
        "totalMinutes": (total_seconds / 60.0).round() as u64,
        "lastCallAt": calls.first().and_then(|c| str_field(c, &["startedAt", "createdAt"])),
        "recent": recent,
    })
}

/// Goal list → active goals (with progress) and completed goal names.
pub fn map_goals(input: &Value, _ctx: &ComposeContext<'_>, _section: &SectionDefinition) -> Value {
    let mut active = Vec::new();
    let mut completed = Vec::new();

    for goal in items(input) {
        let (name, status, progress) = match goal {
            Value::String(name) => (name.as_str(), "active", None),
            _ => match str_field(goal, &["name", "title"]) {
                Some(name) => (
                    name,
                    str_field(goal, &["status"]).unwrap_or("active"),
                    f64_field(goal, &["progress"]),
                ),
                None => continue,
            },
        };
        if status == "completed" || status == "done" {
            completed.push(json!(name));
        } else {
            active.push(json!({"name": name, "progress": progress}));
        }
    }

    if active.is_empty() && completed.is_empty() {
        return Value::Null;
    }
    json!({
        "active": active,
        "completed": completed,
        "count": active.len() + completed.len(),
    })
}
