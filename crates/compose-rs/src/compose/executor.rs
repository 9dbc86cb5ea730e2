//! The composition run: resolve, activate, transform, assemble.
//!
//! [`Composer`] owns a validated section list and a transform registry. Each
//! call to [`Composer::compose`] is one synchronous, in-memory run over an
//! already-loaded [`LoadedData`] bag:
//!
//! 1. Check the subject record is present.
//! 2. Compute [`RunState`] once from the loaded data.
//! 3. Walk the sections in resolved order. An inactive section stores its
//!    fallback (or nothing); an active one resolves its data source, runs its
//!    transform chain and stores the result under its output key.
//! 4. Assemble the document by walking the same order again, stripping
//!    private top-level fields from object values, then add `version` and
//!    `summary`.
//!
//! ```
//! use compose_rs::prelude::*;
//! use serde_json::json;
//!
//! let composer = Composer::new(ComposerConfig::default()).unwrap();
//! let loaded = LoadedData::new(json!({"id": "c1", "name": "Ada"}));
//! let result = composer.compose(&loaded).unwrap();
//!
//! assert_eq!(result.document["version"], "compose/1");
//! assert!(result.metadata.activated.contains(&"caller_info".to_string()));
//! ```

use std::fmt;
use std::time::Instant;

use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use super::activation::{ActivationReason, evaluate};
use super::config::ComposerConfig;
use super::context::{ComposeContext, LoadedData, RunState};
use super::document;
use super::events::{CompositionEvent, CompositionObserver, LoggingObserver};
use super::fallback::fallback_value;
use super::resolver::resolve_order;
use crate::error::ComposeError;
use crate::sections::defaults::keys;
use crate::sections::validate::validate_sections;
use crate::sections::{ActivationCondition, SectionDefinition};
use crate::transforms::TransformRegistry;
use crate::{FORMAT_VERSION, SUMMARY_KEY, VERSION_KEY};

/// Summary line when neither an identity nor a content spec resolved.
pub const NO_SPEC_SUMMARY: &str = "No identity or content spec configured.";

/// A section that did not activate.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedSection {
    pub id: String,
    pub reason: ActivationReason,
    /// `reason` rendered for humans.
    pub message: String,
}

/// What happened during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetadata {
    /// Ids of activated sections, in execution order.
    pub activated: Vec<String>,
    pub skipped: Vec<SkippedSection>,
    /// Time the loader spent fetching fragments.
    pub load_time_ms: f64,
    /// Time spent in the section loop and assembly.
    pub transform_time_ms: f64,
    /// Records in the memory fragment.
    pub memory_count: usize,
    pub section_count: usize,
    /// RFC 3339 timestamp.
    pub composed_at: String,
}

/// The assembled document plus run metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositionResult {
    /// Output keys in resolved order, then `version` and `summary`.
    pub document: Map<String, Value>,
    pub metadata: RunMetadata,
}

impl CompositionResult {
    /// `{"document": ..., "metadata": ...}`
    pub fn to_json(&self) -> Value {
        json!({
            "document": self.document,
            "metadata": self.metadata,
        })
    }

    /// The document as markdown prompt text.
    pub fn render_prompt(&self) -> String {
        document::render_prompt(&self.document)
    }
}

/// Runs a validated section list against loaded data.
pub struct Composer {
    config: ComposerConfig,
    sections: Vec<SectionDefinition>,
    registry: TransformRegistry,
    observer: Box<dyn CompositionObserver>,
}

impl fmt::Debug for Composer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<&str> = self.sections.iter().map(|s| s.id.as_str()).collect();
        f.debug_struct("Composer")
            .field("subject_key", &self.config.subject_key)
            .field("sections", &ids)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Composer {
    /// Build a composer with the built-in transforms.
    pub fn new(config: ComposerConfig) -> Result<Self, ComposeError> {
        Self::with_registry(config, TransformRegistry::builtin())
    }

    /// Build a composer with a custom registry. Pre-flight validation (when
    /// enabled) checks transform names against this registry.
    pub fn with_registry(
        config: ComposerConfig,
        registry: TransformRegistry,
    ) -> Result<Self, ComposeError> {
        let sections = config.resolved_sections();
        if config.validate_on_load {
            let report = validate_sections(&sections, &registry);
            for issue in report.warnings() {
                warn!("[config] {issue}");
            }
            if !report.is_valid() {
                return Err(ComposeError::InvalidConfiguration(report));
            }
        }
        debug!("[config] composer ready with {} section(s)", sections.len());
        Ok(Self {
            config,
            sections,
            registry,
            observer: Box::new(LoggingObserver),
        })
    }

    /// Replace the default [`LoggingObserver`].
    pub fn with_observer(mut self, observer: impl CompositionObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    pub fn sections(&self) -> &[SectionDefinition] {
        &self.sections
    }

    pub fn registry(&self) -> &TransformRegistry {
        &self.registry
    }

    /// Run every section against `loaded` and assemble the document.
    ///
    /// Fails only when the subject record is missing or not an object.
    pub fn compose(&self, loaded: &LoadedData) -> Result<CompositionResult, ComposeError> {
        if !loaded.subject().is_object() {
            return Err(ComposeError::MissingSubject {
                key: self.config.subject_key.clone(),
            });
        }

        let started = Instant::now();
        let order = resolve_order(&self.sections);
        let run = RunState::compute(loaded, &self.config.history_source, scopes(&order));
        let mut ctx = ComposeContext::new(loaded, &self.config.subject_key, run);

        self.observer
            .on_event(&CompositionEvent::RunStarted { sections: order.len() });

        let mut activated = Vec::new();
        let mut skipped = Vec::new();

        for section in &order {
            let activation = evaluate(section, &ctx, self.config.unknown_condition);

            if !activation.activated {
                let fallback = fallback_value(&section.fallback);
                self.observer.on_event(&CompositionEvent::SectionSkipped {
                    id: &section.id,
                    reason: &activation.reason,
                    stored: fallback.is_some(),
                });
                if let Some(value) = fallback {
                    ctx.store(&section.output_key, value);
                }
                skipped.push(SkippedSection {
                    id: section.id.clone(),
                    message: activation.reason.to_string(),
                    reason: activation.reason,
                });
                continue;
            }

            let input = ctx.resolve_input(&section.data_source);
            let output = self.registry.apply_chain(section, input, &ctx);
            for transform in &output.missing {
                self.observer.on_event(&CompositionEvent::TransformMissing {
                    id: &section.id,
                    transform,
                });
            }
            self.observer.on_event(&CompositionEvent::SectionActivated {
                id: &section.id,
                output_key: &section.output_key,
                reason: &activation.reason,
            });
            ctx.store(&section.output_key, output.value);
            activated.push(section.id.clone());
        }

        let outputs = ctx.into_outputs();
        let document = self.assemble(&order, &outputs);
        let elapsed = started.elapsed();

        self.observer.on_event(&CompositionEvent::RunFinished {
            activated: activated.len(),
            skipped: skipped.len(),
            elapsed,
        });

        Ok(CompositionResult {
            document,
            metadata: RunMetadata {
                activated,
                skipped,
                load_time_ms: loaded.load_time().as_secs_f64() * 1000.0,
                transform_time_ms: elapsed.as_secs_f64() * 1000.0,
                memory_count: loaded.record_count(&self.config.memory_source),
                section_count: order.len(),
                composed_at: chrono::Utc::now().to_rfc3339(),
            },
        })
    }

    fn assemble(
        &self,
        order: &[&SectionDefinition],
        outputs: &Map<String, Value>,
    ) -> Map<String, Value> {
        let mut document = Map::new();
        for section in order {
            let key = section.output_key.as_str();
            if document.contains_key(key) {
                continue;
            }
            if let Some(value) = outputs.get(key) {
                document.insert(key.to_string(), strip_private(value, &self.config.private_prefix));
            }
        }
        document.insert(VERSION_KEY.to_string(), Value::String(FORMAT_VERSION.to_string()));
        document.insert(SUMMARY_KEY.to_string(), Value::String(summary(outputs)));
        document
    }
}

/// Scopes every `isFirstOccurrenceInScope` condition asks about.
fn scopes<'s>(sections: &[&'s SectionDefinition]) -> Vec<&'s str> {
    let mut scopes: Vec<&str> = sections
        .iter()
        .filter_map(|s| match &s.activate_when {
            ActivationCondition::IsFirstOccurrenceInScope { scope } => Some(scope.as_str()),
            _ => None,
        })
        .collect();
    scopes.sort_unstable();
    scopes.dedup();
    scopes
}

/// Drop top-level fields starting with `prefix` from objects. Arrays and
/// scalars pass through; an empty prefix disables stripping.
fn strip_private(value: &Value, prefix: &str) -> Value {
    match value {
        Value::Object(fields) if !prefix.is_empty() => Value::Object(
            fields
                .iter()
                .filter(|(k, _)| !k.starts_with(prefix))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn summary(outputs: &Map<String, Value>) -> String {
    let name_of = |key: &str| {
        outputs
            .get(key)
            .and_then(|v| v.get("name"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    };
    match (name_of(keys::IDENTITY), name_of(keys::CONTENT)) {
        (Some(identity), Some(content)) => format!("Identity: {identity} | Content: {content}"),
        (Some(identity), None) => format!("Identity: {identity}"),
        (None, Some(content)) => format!("Content: {content}"),
        (None, None) => NO_SPEC_SUMMARY.to_string(),
    }
}
