//! Strict authoring checks for templates.
//!
//! [`compile`](super::compile) never fails, so typos in directives or paths
//! silently produce empty text. These functions report those mistakes for
//! editors and tests. They do not change how templates render.

use serde::Serialize;
use serde_json::Value;

use super::scan::next_tag;
use super::{RESERVED_BLOCKS, is_block_name, is_reserved_block, is_variable, resolve_path};

/// A problem found in a template. `offset` is the byte offset of the tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TemplateIssue {
    #[error("block '{{{{#{name}}}}}' at byte {offset} is never closed")]
    UnmatchedOpen { name: String, offset: usize },
    #[error("'{{{{/{name}}}}}' at byte {offset} has no matching opening tag")]
    UnmatchedClose { name: String, offset: usize },
    #[error("block '{name}' at byte {offset} is nested inside another '{name}' block; the inner close tag ends the outer block")]
    NestedBlock { name: String, offset: usize },
    #[error("malformed tag '{{{{{tag}}}}}' at byte {offset}")]
    MalformedTag { tag: String, offset: usize },
    #[error("'{{{{' at byte {offset} is never terminated")]
    UnterminatedTag { offset: usize },
    #[error("path '{path}' at byte {offset} does not resolve in the sample data")]
    UnknownPath { path: String, offset: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Scoped,
    If,
    Unless,
    Each,
}

struct Frame {
    kind: BlockKind,
    name: String,
    offset: usize,
}

/// Structural checks: directive pairing and tag syntax.
pub fn validate(template: &str) -> Vec<TemplateIssue> {
    check(template, None)
}

/// Structural checks plus path resolution against sample `data`.
///
/// Paths inside scoped blocks are not checked, since their scope depends on
/// the block's value. Inside `#each`, `this`, `this.*` and `@index` are
/// always accepted.
pub fn validate_with_data(template: &str, data: &Value) -> Vec<TemplateIssue> {
    check(template, Some(data))
}

fn check(template: &str, data: Option<&Value>) -> Vec<TemplateIssue> {
    let mut issues = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut from = 0;

    while let Some(tag) = next_tag(template, from) {
        if let Some(offset) = stray_open(template, from, tag.start) {
            issues.push(TemplateIssue::UnterminatedTag { offset });
        }
        from = tag.end;

        if let Some(name) = tag.inner.strip_prefix('/') {
            close_block(&mut stack, &mut issues, name, tag.start);
        } else if let Some((kind, name, path)) = classify_opener(tag.inner) {
            if stack.iter().any(|f| f.name == name) {
                issues.push(TemplateIssue::NestedBlock {
                    name: name.clone(),
                    offset: tag.start,
                });
            }
            if let Some(data) = data {
                check_path(&stack, data, &path, tag.start, &mut issues);
            }
            stack.push(Frame {
                kind,
                name,
                offset: tag.start,
            });
        } else if tag.inner.starts_with('#') || !is_variable(tag.inner.trim()) {
            issues.push(TemplateIssue::MalformedTag {
                tag: tag.inner.to_string(),
                offset: tag.start,
            });
        } else if let Some(data) = data {
            check_path(&stack, data, tag.inner.trim(), tag.start, &mut issues);
        }
    }

    if let Some(offset) = stray_open(template, from, template.len()) {
        issues.push(TemplateIssue::UnterminatedTag { offset });
    }
    issues.extend(stack.into_iter().map(|f| TemplateIssue::UnmatchedOpen {
        name: f.name,
        offset: f.offset,
    }));
    issues
}

/// `(kind, close name, path to check)` for an opening directive.
fn classify_opener(inner: &str) -> Option<(BlockKind, String, String)> {
    let rest = inner.strip_prefix('#')?;
    for (keyword, kind) in RESERVED_BLOCKS
        .iter()
        .zip([BlockKind::If, BlockKind::Unless, BlockKind::Each])
    {
        if let Some(path) = super::directive_argument(inner, keyword) {
            return Some((kind, keyword.to_string(), path));
        }
    }
    (is_block_name(rest) && !is_reserved_block(rest))
        .then(|| (BlockKind::Scoped, rest.to_string(), rest.to_string()))
}

fn close_block(stack: &mut Vec<Frame>, issues: &mut Vec<TemplateIssue>, name: &str, offset: usize) {
    let Some(position) = stack.iter().rposition(|f| f.name == name) else {
        issues.push(TemplateIssue::UnmatchedClose {
            name: name.to_string(),
            offset,
        });
        return;
    };
    issues.extend(stack.drain(position + 1..).map(|f| TemplateIssue::UnmatchedOpen {
        name: f.name,
        offset: f.offset,
    }));
    stack.pop();
}

fn check_path(
    stack: &[Frame],
    data: &Value,
    path: &str,
    offset: usize,
    issues: &mut Vec<TemplateIssue>,
) {
    if stack.iter().any(|f| f.kind == BlockKind::Scoped) {
        return;
    }
    let in_each = stack.iter().any(|f| f.kind == BlockKind::Each);
    if in_each && (path == "this" || path == "@index" || path.starts_with("this.")) {
        return;
    }
    if resolve_path(data, path).is_none() {
        issues.push(TemplateIssue::UnknownPath {
            path: path.to_string(),
            offset,
        });
    }
}

/// A `{{` in plain text between two tags can never close.
fn stray_open(template: &str, from: usize, to: usize) -> Option<usize> {
    template
        .get(from..to)
        .and_then(|text| text.find("{{"))
        .map(|i| from + i)
}
