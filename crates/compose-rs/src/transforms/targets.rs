//! Behaviour target transforms.
//!
//! System-wide targets come from `behaviorTargets`, per-caller overrides
//! from `callerTargets`. Both are lists of `{parameterId, name?, targetValue}`.

use serde_json::{Map, Value, json};
use tracing::warn;

use super::{f64_field, humanize, items, str_field};
use crate::compose::context::ComposeContext;
use crate::sections::SectionDefinition;
use crate::sections::defaults::{keys, sources};
use crate::template::{
    FragmentTemplate, LevelThresholds, ScoredAttribute, compile_attribute_fragments,
};

/// Merge system and caller targets; caller values win per `parameterId`.
pub fn merge_targets(
    input: &Value,
    _ctx: &ComposeContext<'_>,
    _section: &SectionDefinition,
) -> Value {
    let mut merged: Vec<Value> = Vec::new();

    let layers = [
        (sources::BEHAVIOR_TARGETS, "system"),
        (sources::CALLER_TARGETS, "caller"),
    ];
    for (source, origin) in layers {
        let list = input.get(source).map(items).unwrap_or_default();
        for target in list {
            let Some(id) = str_field(target, &["parameterId", "id"]) else {
                continue;
            };
            let Some(value) = f64_field(target, &["targetValue", "value"]) else {
                continue;
            };
            let name = str_field(target, &["name"]).map_or_else(|| humanize(id), str::to_string);
            let entry = json!({"parameterId": id, "name": name, "value": value, "source": origin});

            match merged.iter_mut().find(|t| t["parameterId"] == id) {
                Some(existing) => *existing = entry,
                None => merged.push(entry),
            }
        }
    }

    if merged.is_empty() {
        return Value::Null;
    }
    let by_parameter: Map<String, Value> = merged
        .iter()
        .filter_map(|t| Some((t["parameterId"].as_str()?.to_string(), t["value"].clone())))
        .collect();

    json!({
        "targets": merged,
        "count": merged.len(),
        "_byParameter": by_parameter,
    })
}

/// Built-in catalogue used when no `voiceTemplates` fragment is loaded.
pub fn default_voice_catalogue() -> Vec<FragmentTemplate> {
    vec![
        FragmentTemplate::new(
            "voice-high",
            "{{#if high}}Lean into {{name}}: aim for {{value}} and make it a clear feature of how you speak.{{/if}}",
        ),
        FragmentTemplate::new(
            "voice-low",
            "{{#if low}}Keep {{name}} understated (target {{value}}).{{/if}}",
        )
        .with_priority(1),
        FragmentTemplate::new(
            "voice-medium",
            "{{#if medium}}Use a moderate level of {{name}} ({{value}}).{{/if}}",
        )
        .with_priority(2),
    ]
}

/// One guidance sentence per merged target and personality trait.
///
/// Reads the `behaviorTargets` and `personality` outputs. Rendered fragments
/// with their template and values are kept under `_fragments`.
pub fn compute_voice_guidance(
    _input: &Value,
    ctx: &ComposeContext<'_>,
    _section: &SectionDefinition,
) -> Value {
    let mut attributes: Vec<ScoredAttribute> = Vec::new();

    if let Some(targets) = ctx.output(keys::BEHAVIOR_TARGETS) {
        for target in items(&targets["targets"]) {
            let id = str_field(target, &["parameterId"]);
            if let (Some(id), Some(value)) = (id, f64_field(target, &["value"])) {
                let name = str_field(target, &["name"])
                    .map_or_else(|| humanize(id), str::to_string);
                attributes.push(ScoredAttribute::new(id, name.to_lowercase(), value));
            }
        }
    }
    if let Some(Value::Object(scores)) = ctx.output(keys::PERSONALITY).map(|p| &p["_scores"]) {
        for (id, score) in scores {
            if attributes.iter().any(|a| &a.id == id) {
                continue;
            }
            if let Some(value) = score.as_f64() {
                attributes.push(ScoredAttribute::new(id, humanize(id).to_lowercase(), value));
            }
        }
    }

    if attributes.is_empty() {
        return Value::Null;
    }

    let catalogue = voice_catalogue(ctx);
    let fragments =
        compile_attribute_fragments(&attributes, &catalogue, &LevelThresholds::default());
    let guidance: Vec<&str> = fragments.iter().map(|f| f.text.as_str()).collect();

    json!({
        "guidance": guidance,
        "count": guidance.len(),
        "_fragments": fragments,
    })
}

fn voice_catalogue(ctx: &ComposeContext<'_>) -> Vec<FragmentTemplate> {
    let Some(raw) = ctx.source(sources::VOICE_TEMPLATES) else {
        return default_voice_catalogue();
    };
    match serde_json::from_value::<Vec<FragmentTemplate>>(raw.clone()) {
        Ok(catalogue) if !catalogue.is_empty() => catalogue,
        Ok(_) => default_voice_catalogue(),
        Err(e) => {
            warn!("[transform] ignoring malformed {}: {e}", sources::VOICE_TEMPLATES);
            default_voice_catalogue()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::context::LoadedData;
    use crate::transforms::test_support::{context, context_with};

    fn section() -> SectionDefinition {
        SectionDefinition::new("t", "t", "x")
    }

    #[test]
    fn caller_targets_override_system_targets() {
        let loaded = LoadedData::new(json!({}));
        let ctx = context(&loaded);
        let input = json!({
            "behaviorTargets": [
                {"parameterId": "warmth", "targetValue": 0.5},
                {"parameterId": "pace", "name": "Speaking pace", "targetValue": 0.4},
            ],
            "callerTargets": [
                {"parameterId": "warmth", "targetValue": 0.9},
                {"parameterId": "humour", "targetValue": 0.2},
            ],
        });
        let out = merge_targets(&input, &ctx, &section());
        assert_eq!(out["count"], 3);
        assert_eq!(
            out["targets"][0],
            json!({"parameterId": "warmth", "name": "Warmth", "value": 0.9, "source": "caller"})
        );
        assert_eq!(out["targets"][1]["name"], "Speaking pace");
        assert_eq!(out["_byParameter"]["humour"], 0.2);
    }

    #[test]
    fn merge_with_nothing_is_null() {
        let loaded = LoadedData::new(json!({}));
        let ctx = context(&loaded);
        let input = json!({"behaviorTargets": null, "callerTargets": []});
        assert_eq!(merge_targets(&input, &ctx, &section()), Value::Null);
    }

    #[test]
    fn voice_guidance_renders_one_fragment_per_attribute() {
        let loaded = LoadedData::new(json!({}));
        let targets =
            json!({"targets": [{"parameterId": "warmth", "name": "Warmth", "value": 0.9}]});
        let personality = json!({"_scores": {"formality": 0.2, "warmth": 0.1}});
        let ctx = context_with(
            &loaded,
            &[(keys::BEHAVIOR_TARGETS, targets), (keys::PERSONALITY, personality)],
        );

        let out = compute_voice_guidance(&Value::Null, &ctx, &section());
        assert_eq!(out["count"], 2);
        assert_eq!(
            out["guidance"][0],
            "Lean into warmth: aim for 0.90 and make it a clear feature of how you speak."
        );
        assert_eq!(out["guidance"][1], "Keep formality understated (target 0.20).");
        assert_eq!(out["_fragments"][1]["templateId"], "voice-low");
    }

    #[test]
    fn voice_templates_fragment_overrides_catalogue() {
        let loaded = LoadedData::new(json!({})).with_fragment(
            sources::VOICE_TEMPLATES,
            json!([{"id": "plain", "template": "{{name}}={{value}}"}]),
        );
        let ctx = context_with(&loaded, &[(keys::PERSONALITY, json!({"_scores": {"pace": 0.5}}))]);
        let out = compute_voice_guidance(&Value::Null, &ctx, &section());
        assert_eq!(out["guidance"], json!(["pace=0.50"]));
    }

    #[test]
    fn voice_guidance_without_attributes_is_null() {
        let loaded = LoadedData::new(json!({}));
        let ctx = context(&loaded);
        assert_eq!(compute_voice_guidance(&Value::Null, &ctx, &section()), Value::Null);
    }
}
