//! Low-level `{{ ... }}` tag scanning shared by the compiler and validator.
//!
//! Every byte offset produced here comes from `find` on the ASCII delimiters
//! `{{` / `}}`, so all slices below land on char boundaries.
#![allow(clippy::string_slice)]

/// A `{{ ... }}` token located in a template string.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Tag<'a> {
    /// Byte offset of the opening `{{`.
    pub start: usize,
    /// Byte offset just past the closing `}}`.
    pub end: usize,
    /// Text between the delimiters, untrimmed.
    pub inner: &'a str,
}

/// Find the next tag at or after `from`.
///
/// The innermost `{{` before the first `}}` wins, so `{{a {{b}}` yields
/// `{{b}}` and `{{{b}}` yields `{{b}}` with a stray leading brace.
pub(crate) fn next_tag(s: &str, from: usize) -> Option<Tag<'_>> {
    let rest = s.get(from..)?;
    let mut open = from + rest.find("{{")?;
    let close = open + 2 + s[open + 2..].find("}}")?;

    if let Some(nested) = s[open + 2..close].rfind("{{") {
        open += 2 + nested;
    }
    while s[open + 2..close].starts_with('{') {
        open += 1;
    }

    Some(Tag {
        start: open,
        end: close + 2,
        inner: &s[open + 2..close],
    })
}

/// Find the first `{{/name}}` at or after `from`.
pub(crate) fn find_close<'a>(s: &'a str, from: usize, name: &str) -> Option<Tag<'a>> {
    let mut from = from;
    while let Some(tag) = next_tag(s, from) {
        if tag.inner.strip_prefix('/') == Some(name) {
            return Some(tag);
        }
        from = tag.end;
    }
    None
}

/// Replace every tag for which `f` returns `Some`; other tags are kept verbatim.
pub(crate) fn replace_tags(s: &str, mut f: impl FnMut(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(s.len());
    let mut cursor = 0;
    let mut from = 0;

    while let Some(tag) = next_tag(s, from) {
        if let Some(replacement) = f(tag.inner) {
            out.push_str(&s[cursor..tag.start]);
            out.push_str(&replacement);
            cursor = tag.end;
        }
        from = tag.end;
    }

    out.push_str(&s[cursor..]);
    out
}

/// Replace block directives in a single left-to-right pass.
///
/// `open` inspects a tag's inner text and, for an opening directive, returns
/// the close name to look for plus the directive argument. The block body runs
/// to the first matching `{{/name}}` (non-greedy), and `render(arg, body)`
/// produces the replacement for the whole block. Openers without a matching
/// close are left untouched. Replacement text is never rescanned.
pub(crate) fn replace_blocks(
    s: &str,
    mut open: impl FnMut(&str) -> Option<(String, String)>,
    mut render: impl FnMut(&str, &str) -> String,
) -> String {
    let mut out = String::with_capacity(s.len());
    let mut cursor = 0;
    let mut from = 0;

    while let Some(tag) = next_tag(s, from) {
        from = tag.end;
        let Some((name, arg)) = open(tag.inner) else {
            continue;
        };
        let Some(close) = find_close(s, tag.end, &name) else {
            continue;
        };

        out.push_str(&s[cursor..tag.start]);
        out.push_str(&render(&arg, &s[tag.end..close.start]));
        cursor = close.end;
        from = close.end;
    }

    out.push_str(&s[cursor..]);
    out
}
