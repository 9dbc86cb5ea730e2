//! Micro-template language for author-editable text fragments.
//!
//! [`compile`] renders a template string against arbitrary JSON data. It is
//! stateless, synchronous and never fails: anything it cannot resolve renders
//! as empty text, and leftover directives are deleted.
//!
//! # Directives
//!
//! | Syntax | Meaning |
//! |--------|---------|
//! | `{{path.to.value}}` | Interpolate a dot-path (`null`/missing → empty, objects → JSON) |
//! | `{{#name}}...{{/name}}` | Scoped block: drop if falsy, repeat per array element, or open an object's fields |
//! | `{{#if path}}...{{/if}}` | Keep the body if the value is truthy |
//! | `{{#unless path}}...{{/unless}}` | Keep the body if the value is falsy |
//! | `{{#each path}}...{{/each}}` | Repeat per array element with `{{this}}`, `{{this.field}}`, `{{@index}}` |
//!
//! # Processing order
//!
//! Scoped blocks, then `if`, then `unless`, then `each`, then interpolation,
//! then deletion of any unresolved tag, then whitespace normalization (runs
//! of three or more newlines collapse to two; the result is trimmed). Blocks
//! of the same kind do not nest: a body ends at the first matching close tag.
//!
//! # Example
//!
//! ```
//! use compose_rs::template::compile;
//! use serde_json::json;
//!
//! let data = json!({"name": "Ada", "high": true, "value": "0.82"});
//! let text = compile("{{#if high}}Keep {{name}} engaged ({{value}}).{{/if}}", &data);
//! assert_eq!(text, "Keep Ada engaged (0.82).");
//! ```
//!
//! For authoring tools, [`validate`] and [`validate_with_data`] report the
//! mistakes the lenient compiler silently absorbs.

pub mod catalogue;
mod scan;
pub mod validate;

pub use catalogue::{
    CompiledFragment, FragmentTemplate, LevelThresholds, ScoredAttribute, attribute_context,
    compile_attribute_fragments, render_all, render_first,
};
pub use validate::{TemplateIssue, validate, validate_with_data};

use serde_json::{Map, Number, Value};

use scan::{replace_blocks, replace_tags};

/// Block keywords that are never treated as scoped-block names.
const RESERVED_BLOCKS: [&str; 3] = ["if", "unless", "each"];

/// Render `template` against `data`.
///
/// Deterministic and side-effect free; safe to call concurrently.
pub fn compile(template: &str, data: &Value) -> String {
    let expanded = expand(template, data);
    let cleaned = replace_tags(&expanded, |_| Some(String::new()));
    normalize_whitespace(&cleaned)
}

/// Directive expansion without cleanup or normalization. Scoped blocks
/// recurse through here with their merged scope.
fn expand(template: &str, data: &Value) -> String {
    let out = render_scoped_blocks(template, data);
    let out = render_conditionals(&out, data, "if", true);
    let out = render_conditionals(&out, data, "unless", false);
    let out = render_each(&out, data);
    interpolate(&out, data)
}

fn render_scoped_blocks(template: &str, data: &Value) -> String {
    replace_blocks(
        template,
        |inner| {
            let name = inner.strip_prefix('#')?;
            (is_block_name(name) && !RESERVED_BLOCKS.contains(&name))
                .then(|| (name.to_string(), name.to_string()))
        },
        |name, body| {
            let value = resolve_path(data, name);
            if !truthy(value) {
                return String::new();
            }
            match value {
                Some(Value::Array(items)) => items
                    .iter()
                    .map(|item| expand(body, &merge_scope(data, item)))
                    .collect(),
                Some(object @ Value::Object(_)) => expand(body, &merge_scope(data, object)),
                _ => body.to_string(),
            }
        },
    )
}

fn render_conditionals(template: &str, data: &Value, keyword: &str, keep_when: bool) -> String {
    replace_blocks(
        template,
        |inner| directive_argument(inner, keyword).map(|path| (keyword.to_string(), path)),
        |path, body| {
            if truthy(resolve_path(data, path)) == keep_when {
                body.to_string()
            } else {
                String::new()
            }
        },
    )
}

fn render_each(template: &str, data: &Value) -> String {
    replace_blocks(
        template,
        |inner| directive_argument(inner, "each").map(|path| ("each".to_string(), path)),
        |path, body| match resolve_path(data, path) {
            Some(Value::Array(items)) if !items.is_empty() => items
                .iter()
                .enumerate()
                .map(|(index, item)| bind_iteration(body, item, index))
                .collect::<Vec<_>>()
                .join("\n"),
            _ => String::new(),
        },
    )
}

/// Substitute `{{this}}`, `{{this.field}}` and `{{@index}}` for one element.
/// Everything else is left for the interpolation pass.
fn bind_iteration(body: &str, item: &Value, index: usize) -> String {
    replace_tags(body, |inner| {
        let key = inner.trim();
        if key == "@index" {
            Some(index.to_string())
        } else if key == "this" {
            Some(format_value(Some(item)))
        } else {
            key.strip_prefix("this.")
                .map(|field| format_value(resolve_path(item, field)))
        }
    })
}

fn interpolate(template: &str, data: &Value) -> String {
    replace_tags(template, |inner| {
        let key = inner.trim();
        is_variable(key).then(|| format_value(resolve_path(data, key)))
    })
}

/// Parse `#keyword path` into `path`.
fn directive_argument(inner: &str, keyword: &str) -> Option<String> {
    let rest = inner.strip_prefix('#')?.strip_prefix(keyword)?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let path = rest.trim();
    is_variable(path).then(|| path.to_string())
}

/// Outer scope with `inner`'s fields (or `this` for scalars) layered on top.
fn merge_scope(outer: &Value, inner: &Value) -> Value {
    let mut scope = match outer {
        Value::Object(fields) => fields.clone(),
        _ => Map::new(),
    };
    if let Value::Object(fields) = inner {
        for (key, value) in fields {
            scope.insert(key.clone(), value.clone());
        }
    }
    scope.insert("this".to_string(), inner.clone());
    Value::Object(scope)
}

fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut newlines = 0;
    for ch in text.chars() {
        if ch == '\n' {
            newlines += 1;
            if newlines <= 2 {
                out.push(ch);
            }
        } else {
            newlines = 0;
            out.push(ch);
        }
    }
    out.trim().to_string()
}

// ── Value helpers ──────────────────────────────────────────────────

/// Template truthiness.
///
/// Missing and `null` are false, booleans are themselves, numbers are true
/// when nonzero, strings and arrays when non-empty, objects when they have at
/// least one key.
pub fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(fields)) => !fields.is_empty(),
    }
}

/// Walk a dot-path through objects (by key) and arrays (by numeric index).
///
/// ```
/// use compose_rs::template::resolve_path;
/// use serde_json::json;
///
/// let data = json!({"caller": {"goals": [{"name": "fluency"}]}});
/// assert_eq!(resolve_path(&data, "caller.goals.0.name"), Some(&json!("fluency")));
/// assert_eq!(resolve_path(&data, "caller.missing"), None);
/// ```
pub fn resolve_path<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }
    path.split('.').try_fold(data, |current, segment| match current {
        Value::Object(fields) => fields.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Text form of an interpolated value.
pub(crate) fn format_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => format_number(n),
        Some(other) => other.to_string(),
    }
}

/// Integral floats print without a fractional part (`3.0` → `3`).
fn format_number(n: &Number) -> String {
    if n.is_f64()
        && let Some(f) = n.as_f64()
        && f.fract() == 0.0
        && f.abs() < 1e15
    {
        return format!("{}", f as i64);
    }
    n.to_string()
}

/// `[A-Za-z0-9_.@]+`: anything interpolation will try to resolve.
pub(crate) fn is_variable(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '@')
}

/// `word(.word)*`: valid scoped-block names.
pub(crate) fn is_block_name(s: &str) -> bool {
    !s.is_empty()
        && s.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

pub(crate) fn is_reserved_block(name: &str) -> bool {
    RESERVED_BLOCKS.contains(&name)
}
