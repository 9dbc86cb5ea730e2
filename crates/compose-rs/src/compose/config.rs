//! Configuration for the [`Composer`](super::executor::Composer).
//!
//! Every field has a default, so `ComposerConfig::default()` composes with the
//! built-in reference sections. Override through the builder methods or load
//! a JSON file with [`ComposerConfig::from_file`].
//!
//! ```
//! use compose_rs::prelude::*;
//!
//! let config = ComposerConfig::default()
//!     .with_subject_key("learner")
//!     .with_unknown_condition(UnknownConditionPolicy::FailOpen);
//! assert_eq!(config.subject_key, "learner");
//! ```
//!
//! Section lists load from JSON: either a bare array of section definitions
//! or an object with a `sections` array. Files are checked against the JSON
//! Schema of [`SectionDefinition`] before deserialization so authoring
//! mistakes are reported with their location.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::ComposeError;
use crate::json_schema_for;
use crate::sections::SectionDefinition;
use crate::sections::defaults::{default_sections, sources};
use crate::{DEFAULT_PRIVATE_PREFIX, DEFAULT_SUBJECT_KEY};

/// What to do with an activation condition tag this crate does not know.
///
/// `FailOpen` reproduces the historical behaviour, where unrecognized tags
/// let the section run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnknownConditionPolicy {
    /// Treat the section as inactive, apply its fallback and log a warning.
    #[default]
    FailClosed,
    /// Treat the section as active.
    FailOpen,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComposerConfig {
    /// Fragment holding the subject record.
    pub subject_key: String,
    /// Fragment holding prior interactions, for first-occurrence checks.
    pub history_source: String,
    /// Fragment whose record count is reported as `memory_count`.
    pub memory_source: String,
    /// Top-level fields of object outputs starting with this are stripped from
    /// the document. Empty disables stripping.
    pub private_prefix: String,
    pub unknown_condition: UnknownConditionPolicy,
    /// Run pre-flight validation when the composer is built.
    pub validate_on_load: bool,
    /// `None` uses the built-in reference list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sections: Option<Vec<SectionDefinition>>,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            subject_key: DEFAULT_SUBJECT_KEY.to_string(),
            history_source: sources::RECENT_CALLS.to_string(),
            memory_source: sources::MEMORIES.to_string(),
            private_prefix: DEFAULT_PRIVATE_PREFIX.to_string(),
            unknown_condition: UnknownConditionPolicy::default(),
            validate_on_load: true,
            sections: None,
        }
    }
}

impl ComposerConfig {
    pub fn with_subject_key(mut self, key: impl Into<String>) -> Self {
        self.subject_key = key.into();
        self
    }

    pub fn with_history_source(mut self, source: impl Into<String>) -> Self {
        self.history_source = source.into();
        self
    }

    pub fn with_memory_source(mut self, source: impl Into<String>) -> Self {
        self.memory_source = source.into();
        self
    }

    pub fn with_private_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.private_prefix = prefix.into();
        self
    }

    pub fn with_unknown_condition(mut self, policy: UnknownConditionPolicy) -> Self {
        self.unknown_condition = policy;
        self
    }

    pub fn with_validate_on_load(mut self, validate: bool) -> Self {
        self.validate_on_load = validate;
        self
    }

    pub fn with_sections(mut self, sections: Vec<SectionDefinition>) -> Self {
        self.sections = Some(sections);
        self
    }

    /// The configured sections, or the built-in reference list.
    pub fn resolved_sections(&self) -> Vec<SectionDefinition> {
        self.sections.clone().unwrap_or_else(default_sections)
    }

    /// Load a JSON config file. An embedded `sections` list is schema-checked
    /// like a standalone sections file.
    pub fn from_file(path: &Path) -> Result<Self, ComposeError> {
        let text =
            std::fs::read_to_string(path).map_err(|e| ComposeError::config_load(path, e))?;
        let mut raw: Value =
            serde_json::from_str(&text).map_err(|e| ComposeError::config_load(path, e))?;

        let sections = match raw.as_object_mut().and_then(|o| o.remove("sections")) {
            Some(list) => Some(sections_from_value(list, path)?),
            None => None,
        };
        let mut config: ComposerConfig =
            serde_json::from_value(raw).map_err(|e| ComposeError::config_load(path, e))?;
        config.sections = sections;
        debug!("[config] loaded {}", path.display());
        Ok(config)
    }
}

/// JSON Schema for a list of section definitions.
pub fn section_schema() -> Value {
    json_schema_for::<Vec<SectionDefinition>>()
}

/// Parse a sections document (bare array or `{"sections": [...]}`).
/// `origin` names the source in error messages.
pub fn parse_sections(text: &str, origin: &Path) -> Result<Vec<SectionDefinition>, ComposeError> {
    let raw: Value =
        serde_json::from_str(text).map_err(|e| ComposeError::config_load(origin, e))?;
    let list = match raw {
        Value::Object(mut obj) if obj.contains_key("sections") => {
            obj.remove("sections").unwrap_or(Value::Null)
        }
        other => other,
    };
    sections_from_value(list, origin)
}

/// Read and parse a sections file.
pub fn load_sections(path: &Path) -> Result<Vec<SectionDefinition>, ComposeError> {
    let text = std::fs::read_to_string(path).map_err(|e| ComposeError::config_load(path, e))?;
    let sections = parse_sections(&text, path)?;
    debug!("[config] {} section(s) from {}", sections.len(), path.display());
    Ok(sections)
}

fn sections_from_value(list: Value, origin: &Path) -> Result<Vec<SectionDefinition>, ComposeError> {
    let schema = section_schema();
    if let Ok(validator) = jsonschema::validator_for(&schema) {
        let errors: Vec<String> = validator
            .iter_errors(&list)
            .map(|e| format!("  - {}: {e}", e.instance_path()))
            .collect();
        if !errors.is_empty() {
            return Err(ComposeError::config_load(
                origin,
                format!("section list does not match the schema:\n{}", errors.join("\n")),
            ));
        }
    }
    serde_json::from_value(list).map_err(|e| ComposeError::config_load(origin, e))
}
