//! Domain and curriculum transforms.

use serde_json::{Value, json};

use super::{f64_field, items, str_field};
use crate::compose::context::ComposeContext;
use crate::sections::SectionDefinition;
use crate::sections::defaults::keys;
use crate::template::compile;

/// Mastery at or above this marks a module complete when no status is given.
pub const MASTERY_COMPLETE: f64 = 0.8;

const WELCOME_TEMPLATE: &str = "Welcome{{#if domain.name}} to {{domain.name}}{{/if}}\
{{#if caller.firstName}}, {{caller.firstName}}{{/if}}!\
{{#if domain.description}} {{domain.description}}{{/if}}\
{{#if curriculum.currentModule}} We'll begin with {{curriculum.currentModule.name}}.{{/if}}";

/// The subject's grouping (`subject.domain`) → `{id, name, description}`.
/// A bare string is taken as the name. An object needs a name or an id.
pub fn map_domain(input: &Value, _ctx: &ComposeContext<'_>, _section: &SectionDefinition) -> Value {
    match input {
        Value::String(name) => json!({"name": name}),
        Value::Object(_) => {
            let name = str_field(input, &["name", "title"]);
            if name.is_none() && input.get("id").is_none_or(Value::is_null) {
                return Value::Null;
            }
            json!({
                "id": input.get("id"),
                "name": name,
                "description": str_field(input, &["description"]),
            })
        }
        _ => Value::Null,
    }
}

/// Curriculum fragment → per-module status plus current/next module.
///
/// Expects `{"modules": [{id, name, order?, mastery?, status?}], "progress":
/// {<moduleId>: {mastery?, status?, completed?}}}`. Modules are ordered by
/// `order` when present, otherwise kept in list order.
pub fn compute_module_progress(
    input: &Value,
    ctx: &ComposeContext<'_>,
    _section: &SectionDefinition,
) -> Value {
    let mut modules: Vec<&Value> = items(&input["modules"]).iter().collect();
    if modules.is_empty() {
        return Value::Null;
    }
    modules.sort_by(|a, b| {
        let order = |m: &Value| f64_field(m, &["order"]).unwrap_or(f64::MAX);
        order(a).total_cmp(&order(b))
    });

    let rows: Vec<Value> = modules
        .iter()
        .map(|module| {
            let id = str_field(module, &["id"]).unwrap_or_default();
            let progress = input["progress"].get(id).unwrap_or(&Value::Null);
            let mastery = f64_field(progress, &["mastery"])
                .or_else(|| f64_field(module, &["mastery"]))
                .unwrap_or(0.0);
            let status = module_status(progress, module, mastery);
            json!({
                "id": id,
                "name": str_field(module, &["name", "title"]).unwrap_or(id),
                "mastery": mastery,
                "status": status,
            })
        })
        .collect();

    let completed = rows.iter().filter(|r| r["status"] == "completed").count();
    let mut open = rows.iter().filter(|r| r["status"] != "completed");
    let current = open.next().cloned();
    let next = open.next().cloned();
    let domain = ctx.output(keys::DOMAIN).and_then(|d| str_field(d, &["name"]));

    json!({
        "domain": domain,
        "modules": rows,
        "completedCount": completed,
        "totalCount": rows.len(),
        "percentComplete": (completed as f64 * 100.0 / rows.len() as f64).round() as u64,
        "currentModule": current,
        "nextModule": next,
    })
}

fn module_status(progress: &Value, module: &Value, mastery: f64) -> &'static str {
    let explicit = str_field(progress, &["status"]).or_else(|| str_field(module, &["status"]));
    let completed_flag = progress.get("completed").and_then(Value::as_bool).unwrap_or(false);
    match explicit {
        Some("completed") => "completed",
        Some("in_progress") => "in_progress",
        Some("not_started") => "not_started",
        _ if completed_flag || mastery >= MASTERY_COMPLETE => "completed",
        _ if mastery > 0.0 => "in_progress",
        _ => "not_started",
    }
}

/// First-call-in-this-domain greeting, rendered from the domain, caller and
/// curriculum outputs.
pub fn compute_domain_welcome(
    input: &Value,
    ctx: &ComposeContext<'_>,
    section: &SectionDefinition,
) -> Value {
    let domain = match ctx.output(keys::DOMAIN) {
        Some(d) if !d.is_null() => d.clone(),
        _ => map_domain(input, ctx, section),
    };
    if domain.is_null() {
        return Value::Null;
    }

    let data = json!({
        "domain": domain,
        "caller": ctx.output(keys::CALLER),
        "curriculum": ctx.output(keys::CURRICULUM),
    });
    json!({
        "domain": domain["name"],
        "message": compile(WELCOME_TEMPLATE, &data),
    })
}
