//! Fragment catalogues: prioritized templates rendered against scored
//! attributes.
//!
//! A catalogue is a list of [`FragmentTemplate`]s. For each scored attribute
//! the candidates are tried in priority order and the first one that renders
//! to non-blank text becomes the [`CompiledFragment`] for that attribute.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::compile;

/// One author-editable template in a catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FragmentTemplate {
    pub id: String,
    /// Attribute this template applies to. `None` matches every attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    /// Lower runs first.
    #[serde(default)]
    pub priority: i32,
    pub template: String,
}

impl FragmentTemplate {
    pub fn new(id: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attribute: None,
            priority: 0,
            template: template.into(),
        }
    }

    pub fn for_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    fn applies_to(&self, attribute: &str) -> bool {
        self.attribute.as_deref().is_none_or(|a| a == attribute)
    }
}

/// A rendered fragment with enough provenance to trace it back.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledFragment {
    /// Attribute (or caller-chosen) identifier.
    pub id: String,
    pub template_id: String,
    pub text: String,
    /// The template source that produced `text`.
    pub template: String,
    /// The data the template was rendered against.
    pub values: Value,
}

/// Render the first candidate that produces non-blank text.
///
/// Candidates are tried in ascending `priority`; ties keep catalogue order.
pub fn render_first(
    id: &str,
    candidates: &[&FragmentTemplate],
    data: &Value,
) -> Option<CompiledFragment> {
    let mut ordered = candidates.to_vec();
    ordered.sort_by_key(|t| t.priority);

    ordered.into_iter().find_map(|candidate| {
        let text = compile(&candidate.template, data);
        (!text.trim().is_empty()).then(|| CompiledFragment {
            id: id.to_string(),
            template_id: candidate.id.clone(),
            text,
            template: candidate.template.clone(),
            values: data.clone(),
        })
    })
}

/// Render every template in `catalogue` against `data`, skipping blank output.
pub fn render_all(catalogue: &[FragmentTemplate], data: &Value) -> Vec<CompiledFragment> {
    let mut ordered: Vec<&FragmentTemplate> = catalogue.iter().collect();
    ordered.sort_by_key(|t| t.priority);

    ordered
        .into_iter()
        .filter_map(|t| render_first(&t.id, &[t], data))
        .collect()
}

/// Score boundaries for the `high` / `medium` / `low` flags.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelThresholds {
    /// Scores at or above this are `high`.
    pub high: f64,
    /// Scores at or below this are `low`.
    pub low: f64,
}

impl Default for LevelThresholds {
    fn default() -> Self {
        Self {
            high: 0.65,
            low: 0.35,
        }
    }
}

impl LevelThresholds {
    pub fn level(&self, value: f64) -> &'static str {
        if value >= self.high {
            "high"
        } else if value <= self.low {
            "low"
        } else {
            "medium"
        }
    }
}

/// A named score in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredAttribute {
    pub id: String,
    pub name: String,
    pub value: f64,
}

impl ScoredAttribute {
    pub fn new(id: impl Into<String>, name: impl Into<String>, value: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            value,
        }
    }
}

/// Template data for one scored attribute.
///
/// `value` is pre-formatted to two decimals for display; `score` keeps the
/// raw number for conditionals.
pub fn attribute_context(attribute: &ScoredAttribute, thresholds: &LevelThresholds) -> Value {
    let level = thresholds.level(attribute.value);
    json!({
        "id": attribute.id,
        "name": attribute.name,
        "value": format!("{:.2}", attribute.value),
        "score": attribute.value,
        "level": level,
        "high": level == "high",
        "medium": level == "medium",
        "low": level == "low",
    })
}

/// One fragment per attribute, using the best-matching catalogue entry.
/// Attributes with no non-blank render are left out.
pub fn compile_attribute_fragments(
    attributes: &[ScoredAttribute],
    catalogue: &[FragmentTemplate],
    thresholds: &LevelThresholds,
) -> Vec<CompiledFragment> {
    attributes
        .iter()
        .filter_map(|attribute| {
            let candidates: Vec<&FragmentTemplate> = catalogue
                .iter()
                .filter(|t| t.applies_to(&attribute.id))
                .collect();
            let data = attribute_context(attribute, thresholds);
            render_first(&attribute.id, &candidates, &data)
        })
        .collect()
}
