//! Transforms over resolved identity, content and onboarding spec records.

use serde_json::{Value, json};

use super::{items, str_field};
use crate::compose::context::ComposeContext;
use crate::sections::SectionDefinition;
use crate::sections::defaults::keys;
use crate::template::compile;

const DEFAULT_GREETING: &str = "Hi{{#if caller.firstName}} {{caller.firstName}}{{/if}}, \
welcome{{#if domain.name}} to {{domain.name}}{{/if}}! \
This is our first conversation, so let's get to know each other.";

const DEFAULT_FIRST_CALL_STEPS: [&str; 3] = [
    "Introduce yourself and explain what these calls are for.",
    "Ask what the caller hopes to get out of them.",
    "Agree on one goal for the next conversation.",
];

/// A resolved spec record → `{name, slug, description, version, config}`.
/// The full record stays under `_spec`.
pub fn extract_spec(
    input: &Value,
    _ctx: &ComposeContext<'_>,
    _section: &SectionDefinition,
) -> Value {
    if !input.is_object() {
        return Value::Null;
    }
    let slug = str_field(input, &["slug", "id"]);
    json!({
        "name": str_field(input, &["name", "title"]).or(slug),
        "slug": slug,
        "description": str_field(input, &["description"]),
        "version": input.get("version"),
        "config": input
            .get("config")
            .filter(|c| c.is_object())
            .cloned()
            .unwrap_or_else(|| json!({})),
        "_spec": input,
    })
}

/// Onboarding plan for the subject's very first call.
///
/// The optional onboarding spec may supply `greetingTemplate` and `steps`
/// (top level or under `config`); otherwise built-in defaults are used.
pub fn compute_first_call(
    input: &Value,
    ctx: &ComposeContext<'_>,
    _section: &SectionDefinition,
) -> Value {
    let setting = |name: &str| {
        input
            .get("config")
            .and_then(|c| c.get(name))
            .or_else(|| input.get(name))
    };

    let template = setting("greetingTemplate")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_GREETING);
    let steps: Vec<Value> = match setting("steps").map(items) {
        Some(steps) if !steps.is_empty() => steps.to_vec(),
        _ => DEFAULT_FIRST_CALL_STEPS.iter().map(|s| json!(s)).collect(),
    };

    let data = json!({
        "caller": ctx.output(keys::CALLER),
        "domain": ctx.output(keys::DOMAIN),
    });
    json!({
        "isFirstCall": true,
        "greeting": compile(template, &data),
        "steps": steps,
        "_template": template,
    })
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
    fn extract_spec_prefers_name_over_slug() {
        let loaded = LoadedData::new(json!({}));
        let ctx = context(&loaded);
        let out = extract_spec(
            &json!({"slug": "tutor-v2", "name": "Patient Tutor", "config": {"tone": "warm"}}),
            &ctx,
            &section(),
        );
        assert_eq!(out["name"], "Patient Tutor");
        assert_eq!(out["config"]["tone"], "warm");
        assert_eq!(out["_spec"]["slug"], "tutor-v2");

        let unnamed = extract_spec(&json!({"slug": "tutor-v2"}), &ctx, &section());
        assert_eq!(unnamed["name"], "tutor-v2");
        assert_eq!(unnamed["config"], json!({}));
    }

    #[test]
    fn first_call_defaults() {
        let loaded = LoadedData::new(json!({}));
        let ctx = context_with(
            &loaded,
            &[
                (keys::CALLER, json!({"firstName": "Ada"})),
                (keys::DOMAIN, json!({"name": "Spanish"})),
            ],
        );
        let out = compute_first_call(&Value::Null, &ctx, &section());
        assert_eq!(
            out["greeting"],
            "Hi Ada, welcome to Spanish! This is our first conversation, so let's get to know each other."
        );
        assert_eq!(out["steps"].as_array().map(Vec::len), Some(3));
    }

    #[test]
    fn first_call_uses_spec_settings() {
        let loaded = LoadedData::new(json!({}));
        let ctx = context_with(&loaded, &[(keys::CALLER, json!({"firstName": "Ada"}))]);
        let spec = json!({
            "config": {"greetingTemplate": "Hello {{caller.firstName}}.", "steps": ["Say hi"]}
        });
        let out = compute_first_call(&spec, &ctx, &section());
        assert_eq!(out["greeting"], "Hello Ada.");
        assert_eq!(out["steps"], json!(["Say hi"]));
    }
}
