//! Transforms that read the whole context (`"_all"`) and combine the outputs
//! of earlier sections.

use serde_json::{Value, json};

use super::{items, str_field};
use crate::compose::context::ComposeContext;
use crate::sections::SectionDefinition;
use crate::sections::defaults::keys;
use crate::template::{compile, resolve_path, truthy};

/// Memories quoted in a session plan's `recall` list.
const RECALL_LIMIT: usize = 3;

const HEADLINE_TEMPLATE: &str = "{{#if caller.name}}Call with {{caller.name}}{{/if}}\
{{#unless caller.name}}Call{{/unless}}\
{{#if domain.name}} about {{domain.name}}{{/if}}.\
{{#if sessionPlan.focus}} Focus: {{sessionPlan.focus}}.{{/if}}\
{{#if firstCall}} First call.{{/if}}";

fn text<'v>(all: &'v Value, path: &str) -> Option<&'v str> {
    resolve_path(all, path).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn count(all: &Value, path: &str) -> u64 {
    resolve_path(all, path).and_then(Value::as_u64).unwrap_or(0)
}

/// What this session should cover: a focus, a recap of the last call, a few
/// memories worth recalling and an ordered step list.
pub fn compute_session_plan(
    all: &Value,
    _ctx: &ComposeContext<'_>,
    _section: &SectionDefinition,
) -> Value {
    let current_module = text(all, &format!("{}.currentModule.name", keys::CURRICULUM));
    let first_goal = text(all, &format!("{}.active.0.name", keys::LEARNER_GOALS));
    let focus = match (current_module, first_goal) {
        (Some(module), _) => format!("Continue the {module} module"),
        (None, Some(goal)) => format!("Work towards: {goal}"),
        (None, None) => "Open conversation".to_string(),
    };
    let last_call = text(all, &format!("{}.recent.0.summary", keys::CALL_HISTORY));

    let recall: Vec<String> = resolve_path(all, &format!("{}._all", keys::MEMORIES))
        .map(items)
        .unwrap_or_default()
        .iter()
        .filter_map(|m| {
            let key = str_field(m, &["key"])?;
            let value = m.get("value").and_then(Value::as_str)?;
            Some(format!("{key}: {value}"))
        })
        .take(RECALL_LIMIT)
        .collect();

    let mut steps = Vec::new();
    if truthy(all.get(keys::FIRST_CALL)) {
        steps.push("Follow the first-call onboarding steps.".to_string());
    } else if let Some(summary) = last_call {
        steps.push(format!("Briefly recap the last call: {summary}"));
    }
    steps.push(format!("{focus}."));
    if !recall.is_empty() {
        steps.push("Weave in something you remember about the caller.".to_string());
    }
    steps.push("Close by agreeing on a next step.".to_string());

    json!({
        "focus": focus,
        "lastCallSummary": last_call,
        "recall": recall,
        "steps": steps,
    })
}

/// Behaviour rules for the agent, derived from which sections produced
/// content.
pub fn compute_instructions(
    all: &Value,
    _ctx: &ComposeContext<'_>,
    _section: &SectionDefinition,
) -> Value {
    let mut rules = Vec::new();

    if let Some(name) = text(all, &format!("{}.firstName", keys::CALLER)) {
        rules.push(format!("Address the caller as {name}."));
    }
    if let Some(identity) = text(all, &format!("{}.name", keys::IDENTITY)) {
        rules.push(format!("Stay in character as {identity}."));
    }
    if let Some(summary) = text(all, &format!("{}.summary", keys::PERSONALITY)) {
        rules.push(format!("Caller personality: {summary}"));
    }
    let memories = count(all, &format!("{}.totalCount", keys::MEMORIES));
    if memories > 0 {
        rules.push(format!(
            "You remember {memories} thing(s) about the caller; bring them up naturally and never recite them as a list."
        ));
    }
    if count(all, &format!("{}.count", keys::VOICE_GUIDANCE)) > 0 {
        rules.push("Follow the voice guidance.".to_string());
    }
    if truthy(all.get(keys::FIRST_CALL)) {
        rules.push(
            "This is the caller's first call: open with the onboarding greeting.".to_string(),
        );
    }
    if let Some(domain) = text(all, &format!("{}.name", keys::DOMAIN)) {
        rules.push(format!("Keep the conversation within {domain}."));
    }
    rules.push("Keep responses short and conversational.".to_string());

    json!({
        "rules": rules,
        "count": rules.len(),
    })
}

/// At-a-glance summary of the run for the top of the prompt.
pub fn compute_quick_start(
    all: &Value,
    _ctx: &ComposeContext<'_>,
    _section: &SectionDefinition,
) -> Value {
    let name = |key: &str| text(all, &format!("{key}.name"));
    json!({
        "headline": compile(HEADLINE_TEMPLATE, all),
        "callerName": name(keys::CALLER),
        "domain": name(keys::DOMAIN),
        "identity": name(keys::IDENTITY),
        "content": name(keys::CONTENT),
        "focus": text(all, &format!("{}.focus", keys::SESSION_PLAN)),
        "memoryCount": count(all, &format!("{}.totalCount", keys::MEMORIES)),
        "isFirstCall": truthy(all.get(keys::FIRST_CALL)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::context::LoadedData;
    use crate::transforms::test_support::context;

    fn run(f: crate::transforms::TransformFn, all: Value) -> Value {
        let loaded = LoadedData::new(json!({}));
        let ctx = context(&loaded);
        f(&all, &ctx, &SectionDefinition::new("t", "t", crate::WHOLE_CONTEXT))
    }

    fn returning_caller() -> Value {
        json!({
            "caller": {"name": "Ada Lovelace", "firstName": "Ada"},
            "domain": {"name": "Spanish"},
            "curriculum": {"currentModule": {"name": "Food"}},
            "callHistory": {"recent": [{"summary": "Practised greetings."}]},
            "memories": {
                "totalCount": 2,
                "_all": [{"key": "pet", "value": "dog"}, {"key": "likes", "value": "tea"}],
            },
            "firstCall": null,
        })
    }

    #[test]
    fn session_plan_for_returning_caller() {
        let out = run(compute_session_plan, returning_caller());
        assert_eq!(out["focus"], "Continue the Food module");
        assert_eq!(out["recall"], json!(["pet: dog", "likes: tea"]));
        assert_eq!(out["steps"][0], "Briefly recap the last call: Practised greetings.");
        assert_eq!(out["steps"].as_array().map(Vec::len), Some(4));
    }

    #[test]
    fn session_plan_for_empty_context() {
        let out = run(compute_session_plan, json!({}));
        assert_eq!(out["focus"], "Open conversation");
        assert_eq!(out["lastCallSummary"], Value::Null);
        assert_eq!(
            out["steps"],
            json!(["Open conversation.", "Close by agreeing on a next step."])
        );
    }

    #[test]
    fn instructions_reflect_available_sections() {
        let out = run(compute_instructions, returning_caller());
        let rules: Vec<&str> = items(&out["rules"]).iter().filter_map(Value::as_str).collect();
        assert_eq!(rules[0], "Address the caller as Ada.");
        assert!(rules.iter().any(|r| r.starts_with("You remember 2 thing(s)")));
        assert!(rules.contains(&"Keep the conversation within Spanish."));
        assert!(!rules.iter().any(|r| r.contains("first call")));
    }

    #[test]
    fn instructions_always_have_a_baseline_rule() {
        let out = run(compute_instructions, json!({}));
        assert_eq!(out["rules"], json!(["Keep responses short and conversational."]));
    }

    #[test]
    fn quick_start_headline() {
        let mut all = returning_caller();
        all["sessionPlan"] = json!({"focus": "Continue the Food module"});
        let out = run(compute_quick_start, all);
        assert_eq!(
            out["headline"],
            "Call with Ada Lovelace about Spanish. Focus: Continue the Food module."
        );
        assert_eq!(out["memoryCount"], 2);
        assert_eq!(out["isFirstCall"], false);

        let bare = run(compute_quick_start, json!({}));
        assert_eq!(bare["headline"], "Call.");
    }
}
