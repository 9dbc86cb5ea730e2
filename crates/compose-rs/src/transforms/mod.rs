//! Named, pure data transforms and the chain executor.
//!
//! A transform turns a section's resolved input into its stored output. It
//! may read anything already in the [`ComposeContext`] (including outputs of
//! earlier sections) but never writes to it; the executor stores the final
//! value of the chain.
//!
//! Dispatch is by stable string name through a [`TransformRegistry`]. The
//! built-in registry holds every transform the reference section list
//! uses; embedders add their own with [`TransformRegistry::register`].
//!
//! ```
//! use compose_rs::transforms::{TransformRegistry, names};
//!
//! let registry = TransformRegistry::builtin();
//! assert!(registry.contains(names::GROUP_MEMORIES));
//! ```

pub mod caller;
pub mod composite;
pub mod curriculum;
pub mod memories;
pub mod names;
pub mod specs;
pub mod targets;

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;
use tracing::{error, trace};

use crate::compose::context::ComposeContext;
use crate::sections::SectionDefinition;

/// Shared transform signature: `(input, context, section) -> output`.
pub type TransformFn = fn(&Value, &ComposeContext<'_>, &SectionDefinition) -> Value;

const BUILTIN: &[(&str, TransformFn)] = &[
    (names::MAP_CALLER_INFO, caller::map_caller_info),
    (names::MAP_PERSONALITY, caller::map_personality),
    (names::SUMMARIZE_CALL_HISTORY, caller::summarize_call_history),
    (names::MAP_GOALS, caller::map_goals),
    (names::DEDUPE_MEMORIES, memories::dedupe_memories),
    (names::GROUP_MEMORIES, memories::group_memories),
    (names::MERGE_TARGETS, targets::merge_targets),
    (names::COMPUTE_VOICE_GUIDANCE, targets::compute_voice_guidance),
    (names::MAP_DOMAIN, curriculum::map_domain),
    (names::COMPUTE_MODULE_PROGRESS, curriculum::compute_module_progress),
    (names::COMPUTE_DOMAIN_WELCOME, curriculum::compute_domain_welcome),
    (names::EXTRACT_SPEC, specs::extract_spec),
    (names::COMPUTE_FIRST_CALL, specs::compute_first_call),
    (names::COMPUTE_SESSION_PLAN, composite::compute_session_plan),
    (names::COMPUTE_INSTRUCTIONS, composite::compute_instructions),
    (names::COMPUTE_QUICK_START, composite::compute_quick_start),
];

/// Name → transform lookup.
#[derive(Clone)]
pub struct TransformRegistry {
    transforms: HashMap<String, TransformFn>,
}

impl fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformRegistry")
            .field("transforms", &self.names())
            .finish()
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Result of running a section's transform chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainOutput {
    pub value: Value,
    /// Names that were not registered; those steps passed the value through.
    pub missing: Vec<String>,
}

impl TransformRegistry {
    /// Registry with every built-in transform.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for (name, f) in BUILTIN {
            registry.register(*name, *f);
        }
        registry
    }

    pub fn empty() -> Self {
        Self {
            transforms: HashMap::new(),
        }
    }

    /// Add or replace a transform.
    pub fn register(&mut self, name: impl Into<String>, transform: TransformFn) {
        self.transforms.insert(name.into(), transform);
    }

    pub fn with(mut self, name: impl Into<String>, transform: TransformFn) -> Self {
        self.register(name, transform);
        self
    }

    pub fn get(&self, name: &str) -> Option<TransformFn> {
        self.transforms.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.transforms.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.transforms.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Run `section`'s transforms over `input`, left to right.
    ///
    /// An unregistered name is logged and skipped: the in-flight value passes
    /// through unchanged and the run continues.
    pub fn apply_chain(
        &self,
        section: &SectionDefinition,
        input: Value,
        ctx: &ComposeContext<'_>,
    ) -> ChainOutput {
        let mut value = input;
        let mut missing = Vec::new();

        for name in section.transform_names() {
            match self.get(name) {
                Some(transform) => {
                    trace!("[transform] {} <- {name}", section.id);
                    value = transform(&value, ctx, section);
                }
                None => {
                    error!(
                        "[transform] section '{}' names unregistered transform '{name}'; passing value through",
                        section.id
                    );
                    missing.push(name.clone());
                }
            }
        }

        ChainOutput { value, missing }
    }
}

// ── Shared helpers ─────────────────────────────────────────────────

/// First string-valued field among `keys`.
pub(crate) fn str_field<'v>(value: &'v Value, keys: &[&str]) -> Option<&'v str> {
    keys.iter()
        .find_map(|k| value.get(*k).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
}

/// First numeric field among `keys`.
pub(crate) fn f64_field(value: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| value.get(*k).and_then(Value::as_f64))
}

/// `speaking_pace` / `speakingPace` → `Speaking pace`.
pub(crate) fn humanize(id: &str) -> String {
    let mut words = String::with_capacity(id.len() + 4);
    for (i, ch) in id.chars().enumerate() {
        if ch == '_' || ch == '-' {
            words.push(' ');
        } else if ch.is_uppercase() && i > 0 {
            words.push(' ');
            words.extend(ch.to_lowercase());
        } else if i == 0 {
            words.extend(ch.to_uppercase());
        } else {
            words.push(ch);
        }
    }
    words
}

/// Items of an array value, or nothing.
pub(crate) fn items(value: &Value) -> &[Value] {
    value.as_array().map(Vec::as_slice).unwrap_or_default()
}

#[cfg(test)]
pub(crate) mod test_support {
    use serde_json::Value;

    use crate::compose::context::{ComposeContext, LoadedData, RunState};

    pub fn context(loaded: &LoadedData) -> ComposeContext<'_> {
        ComposeContext::new(loaded, "caller", RunState::default())
    }

    pub fn context_with<'a>(
        loaded: &'a LoadedData,
        outputs: &[(&str, Value)],
    ) -> ComposeContext<'a> {
        let mut ctx = context(loaded);
        for (key, value) in outputs {
            ctx.store(key, value.clone());
        }
        ctx
    }
}
