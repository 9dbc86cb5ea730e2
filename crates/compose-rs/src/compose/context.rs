//! The run-scoped accumulator.
//!
//! [`LoadedData`] is the write-once input bag produced by the loader.
//! [`ComposeContext`] pairs it with the outputs computed so far during a
//! run. Transforms receive a shared reference and can read every key already
//! written; only the executor stores new ones.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::{Map, Value, json};

use crate::WHOLE_CONTEXT;
use crate::sections::DataSource;
use crate::template::{resolve_path, truthy};

/// Prefix for derived lookups into the subject record, e.g. `subject.domain`.
pub const SUBJECT_PATH_PREFIX: &str = "subject.";

// ── Loaded data ────────────────────────────────────────────────────

/// Fragments fetched before a run starts, plus the subject record.
#[derive(Debug, Clone, Default)]
pub struct LoadedData {
    subject: Value,
    fragments: Map<String, Value>,
    load_time: Duration,
}

impl LoadedData {
    /// A bag holding only the subject record.
    pub fn new(subject: Value) -> Self {
        Self {
            subject,
            fragments: Map::new(),
            load_time: Duration::ZERO,
        }
    }

    /// Split a flat fragment map into subject (under `subject_key`) and the
    /// remaining fragments.
    pub fn from_fragments(mut fragments: Map<String, Value>, subject_key: &str) -> Self {
        let subject = fragments.remove(subject_key).unwrap_or(Value::Null);
        Self {
            subject,
            fragments,
            load_time: Duration::ZERO,
        }
    }

    pub fn with_fragment(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fragments.insert(name.into(), value);
        self
    }

    pub fn with_load_time(mut self, load_time: Duration) -> Self {
        self.load_time = load_time;
        self
    }

    pub fn subject(&self) -> &Value {
        &self.subject
    }

    pub fn fragments(&self) -> &Map<String, Value> {
        &self.fragments
    }

    pub fn fragment(&self, name: &str) -> Option<&Value> {
        self.fragments.get(name)
    }

    /// Time the loader spent fetching fragments.
    pub fn load_time(&self) -> Duration {
        self.load_time
    }

    /// Number of records in an array fragment (0 when absent or not an array).
    pub fn record_count(&self, name: &str) -> usize {
        self.fragment(name).and_then(Value::as_array).map_or(0, Vec::len)
    }
}

// ── Run state ──────────────────────────────────────────────────────

/// Flags computed once from the loaded data before any section runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunState {
    /// No prior history for the subject.
    pub first_occurrence: bool,
    first_in_scope: HashMap<String, bool>,
}

impl RunState {
    /// Compute flags from the history fragment. `scopes` lists every scope an
    /// `isFirstOccurrenceInScope` condition will ask about.
    pub fn compute<'s>(
        loaded: &LoadedData,
        history_source: &str,
        scopes: impl IntoIterator<Item = &'s str>,
    ) -> Self {
        let history = loaded.fragment(history_source);
        let entries: &[Value] = history
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let first_in_scope = scopes
            .into_iter()
            .map(|scope| {
                let first = grouping_id(loaded.subject(), scope).is_some_and(|id| {
                    let field = format!("{scope}Id");
                    !entries.iter().any(|entry| {
                        entry.get(&field).and_then(id_text).as_deref() == Some(id.as_str())
                    })
                });
                (scope.to_string(), first)
            })
            .collect();

        Self {
            first_occurrence: !truthy(history),
            first_in_scope,
        }
    }

    /// Whether the subject's grouping under `scope` has no prior history.
    /// Unknown scopes and subjects without a grouping are not first.
    pub fn is_first_in_scope(&self, scope: &str) -> bool {
        self.first_in_scope.get(scope).copied().unwrap_or(false)
    }
}

/// Id of the subject's grouping under `scope`: `<scope>Id`, then `<scope>.id`,
/// then `<scope>` itself when it is a plain string.
pub(crate) fn grouping_id(subject: &Value, scope: &str) -> Option<String> {
    subject
        .get(format!("{scope}Id"))
        .and_then(id_text)
        .or_else(|| subject.get(scope).and_then(|g| g.get("id")).and_then(id_text))
        .or_else(|| subject.get(scope).and_then(Value::as_str).map(str::to_string))
}

/// Whether the subject is assigned a grouping under `relation`: a truthy
/// `<relation>` field or a usable `<relation>Id`.
pub(crate) fn has_grouping(subject: &Value, relation: &str) -> bool {
    truthy(subject.get(relation)) || grouping_id(subject, relation).is_some()
}

fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ── Compose context ────────────────────────────────────────────────

/// Read access to everything a run has so far.
#[derive(Debug)]
pub struct ComposeContext<'a> {
    loaded: &'a LoadedData,
    subject_key: &'a str,
    run: RunState,
    outputs: Map<String, Value>,
}

impl<'a> ComposeContext<'a> {
    pub(crate) fn new(loaded: &'a LoadedData, subject_key: &'a str, run: RunState) -> Self {
        Self {
            loaded,
            subject_key,
            run,
            outputs: Map::new(),
        }
    }

    pub fn subject(&self) -> &Value {
        self.loaded.subject()
    }

    pub fn loaded(&self) -> &LoadedData {
        self.loaded
    }

    pub fn run_state(&self) -> &RunState {
        &self.run
    }

    /// A named input: the subject key, a `subject.<path>` lookup, or a
    /// loaded fragment. `null` counts as absent.
    pub fn source(&self, name: &str) -> Option<&Value> {
        let value = if name == self.subject_key {
            Some(self.loaded.subject())
        } else if let Some(path) = name.strip_prefix(SUBJECT_PATH_PREFIX) {
            resolve_path(self.loaded.subject(), path)
        } else {
            self.loaded.fragment(name)
        };
        value.filter(|v| !v.is_null())
    }

    /// An output written by an earlier section.
    pub fn output(&self, key: &str) -> Option<&Value> {
        self.outputs.get(key)
    }

    pub fn outputs(&self) -> &Map<String, Value> {
        &self.outputs
    }

    /// Output if present and non-null, otherwise the named source.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.output(name).filter(|v| !v.is_null()).or_else(|| self.source(name))
    }

    /// The whole context as one object: fragments, then the subject under its
    /// key, then outputs (which shadow fragments of the same name).
    pub fn snapshot(&self) -> Value {
        let mut all = self.loaded.fragments().clone();
        all.insert(self.subject_key.to_string(), self.loaded.subject().clone());
        for (key, value) in &self.outputs {
            all.insert(key.clone(), value.clone());
        }
        Value::Object(all)
    }

    /// Raw input for a section's data source.
    pub(crate) fn resolve_input(&self, source: &DataSource) -> Value {
        if source.is_whole_context() {
            return self.snapshot();
        }
        match source {
            DataSource::Single(name) => self.input_value(name),
            DataSource::Multiple(names) => Value::Object(
                names
                    .iter()
                    .map(|name| (name.clone(), self.input_value(name)))
                    .collect(),
            ),
        }
    }

    fn input_value(&self, name: &str) -> Value {
        self.source(name)
            .cloned()
            .or_else(|| self.derived_grouping(name))
            .unwrap_or(Value::Null)
    }

    /// `subject.<relation>` for a subject that carries only `<relation>Id`.
    fn derived_grouping(&self, name: &str) -> Option<Value> {
        let relation = name.strip_prefix(SUBJECT_PATH_PREFIX)?;
        if relation.contains('.') {
            return None;
        }
        grouping_id(self.subject(), relation).map(|id| json!({"id": id}))
    }

    /// Whether `name` counts as present for `dataExists`.
    pub(crate) fn has_data(&self, name: &str) -> bool {
        if name == WHOLE_CONTEXT {
            return true;
        }
        match self.source(name) {
            None => self.derived_grouping(name).is_some(),
            Some(Value::Array(items)) => !items.is_empty(),
            Some(_) => true,
        }
    }

    /// Store a section's result. Keys are written once per run.
    pub(crate) fn store(&mut self, key: &str, value: Value) {
        self.outputs.insert(key.to_string(), value);
    }

    pub(crate) fn into_outputs(self) -> Map<String, Value> {
        self.outputs
    }
}
