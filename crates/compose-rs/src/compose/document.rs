//! Markdown rendering of a composed document.
//!
//! [`PromptBuilder`] assembles `## Section` blocks; [`render_prompt`] walks a
//! composed document in emission order and turns each non-null key into one
//! block, with the summary line as preamble.

use serde_json::{Map, Value};

use crate::transforms::humanize;
use crate::{SUMMARY_KEY, VERSION_KEY};

/// Builder for multi-section prompt text.
///
/// Sections are joined with blank lines; sections with empty content are
/// dropped.
///
/// ```
/// use compose_rs::compose::document::PromptBuilder;
///
/// let prompt = PromptBuilder::new("Identity: Tutor")
///     .section("Caller", "- **name**: Ada")
///     .section_opt("Missing", None::<String>)
///     .build();
///
/// assert_eq!(prompt, "Identity: Tutor\n\n## Caller\n\n- **name**: Ada");
/// ```
pub struct PromptBuilder {
    sections: Vec<String>,
    heading_prefix: String,
}

impl PromptBuilder {
    /// Start with a preamble, included as-is (skipped when empty).
    pub fn new(preamble: impl Into<String>) -> Self {
        let preamble = preamble.into();
        Self {
            sections: if preamble.is_empty() { Vec::new() } else { vec![preamble] },
            heading_prefix: "##".to_string(),
        }
    }

    /// Heading depth for subsequent sections (2 = `##`), clamped to 1..=6.
    pub fn heading_level(mut self, level: u8) -> Self {
        self.heading_prefix = "#".repeat(usize::from(level.clamp(1, 6)));
        self
    }

    pub fn section(mut self, heading: &str, content: impl Into<String>) -> Self {
        let content = content.into();
        if !content.is_empty() {
            self.sections.push(format!("{} {heading}\n\n{content}", self.heading_prefix));
        }
        self
    }

    pub fn section_opt(self, heading: &str, content: Option<impl Into<String>>) -> Self {
        match content {
            Some(c) => self.section(heading, c),
            None => self,
        }
    }

    pub fn build(self) -> String {
        self.sections.join("\n\n")
    }
}

/// Render a composed document as markdown prompt text.
///
/// The fixed `version` field is left out; `summary` becomes the preamble.
pub fn render_prompt(document: &Map<String, Value>) -> String {
    let preamble = document.get(SUMMARY_KEY).and_then(Value::as_str).unwrap_or_default();
    document
        .iter()
        .filter(|(key, value)| {
            key.as_str() != SUMMARY_KEY && key.as_str() != VERSION_KEY && !value.is_null()
        })
        .fold(PromptBuilder::new(preamble), |builder, (key, value)| {
            builder.section(&humanize(key), render_value(value))
        })
        .build()
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| format!("- {}", inline(item)))
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Object(fields) => fields
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| match v {
                Value::Array(items)
                    if !items.is_empty() && items.iter().all(|i| !i.is_object()) =>
                {
                    let lines: Vec<String> =
                        items.iter().map(|i| format!("  - {}", inline(i))).collect();
                    format!("- **{k}**:\n{}", lines.join("\n"))
                }
                _ => format!("- **{k}**: {}", inline(v)),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}

/// One-line form: strings bare, flat objects as `k: v` pairs, anything
/// deeper as compact JSON.
fn inline(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(fields) if fields.values().all(|v| !v.is_object() && !v.is_array()) => fields
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| format!("{k}: {}", inline(v)))
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_sections_in_document_order() {
        let doc = json!({
            "caller": {"name": "Ada", "timezone": "UTC"},
            "personality": null,
            "instructions": {"rules": ["Be brief.", "Be kind."]},
            "quickStart": {"headline": "Call with Ada."},
            "version": "compose/1",
            "summary": "Identity: Tutor",
        });
        let Value::Object(doc) = doc else { unreachable!() };
        let text = render_prompt(&doc);

        assert!(
            text.starts_with("Identity: Tutor\n\n## Caller\n\n- **name**: Ada\n- **timezone**: UTC")
        );
        assert!(text.contains("## Instructions\n\n- **rules**:\n  - Be brief.\n  - Be kind."));
        assert!(text.contains("## Quick start"));
        assert!(!text.contains("Personality"));
        assert!(!text.contains("compose/1"));
    }

    #[test]
    fn heading_level_applies_to_later_sections() {
        let prompt = PromptBuilder::new("")
            .section("Top", "a")
            .heading_level(3)
            .section("Nested", "b")
            .heading_level(0)
            .section("Clamped", "c")
            .build();
        assert_eq!(prompt, "## Top\n\na\n\n### Nested\n\nb\n\n# Clamped\n\nc");
    }

    #[test]
    fn arrays_of_records_render_inline() {
        let doc = json!({"recent": [{"when": "today", "summary": "Greetings."}]});
        let Value::Object(doc) = doc else { unreachable!() };
        assert_eq!(render_prompt(&doc), "## Recent\n\n- when: today, summary: Greetings.");
    }

    #[test]
    fn empty_values_drop_their_section() {
        let doc = json!({"memories": {}, "summary": ""});
        let Value::Object(doc) = doc else { unreachable!() };
        assert_eq!(render_prompt(&doc), "");
    }
}
