//! Section definitions: the declarative steps of a composition run.
//!
//! A [`SectionDefinition`] names its input ([`DataSource`]), when it runs
//! ([`ActivationCondition`]), what to store when it doesn't ([`Fallback`]),
//! how its input becomes output ([`TransformSpec`]) and which sections must
//! run first (`depends_on`). Section lists are authored as JSON using the
//! camelCase field names below, or built in code with the builder methods.
//!
//! ```json
//! {
//!   "id": "memories",
//!   "outputKey": "memories",
//!   "dataSource": "memories",
//!   "activateWhen": { "condition": "dataExists" },
//!   "fallback": { "action": "emptyObject" },
//!   "transform": ["dedupe_memories", "group_memories"]
//! }
//! ```

pub mod defaults;
pub mod validate;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::WHOLE_CONTEXT;

/// Activation condition tags as they appear in configuration.
pub mod conditions {
    pub const ALWAYS: &str = "always";
    pub const DATA_EXISTS: &str = "dataExists";
    pub const SPEC_RESOLVED: &str = "specResolved";
    pub const ENTITY_HAS_RELATION: &str = "entityHasRelation";
    pub const IS_FIRST_OCCURRENCE: &str = "isFirstOccurrence";
    pub const IS_FIRST_OCCURRENCE_IN_SCOPE: &str = "isFirstOccurrenceInScope";
}

// ── Section definition ─────────────────────────────────────────────

/// One step of the composition pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SectionDefinition {
    /// Unique section id, referenced by `dependsOn`.
    pub id: String,
    /// Key the result is stored and emitted under.
    pub output_key: String,
    /// Loaded fragment name(s), or `"_all"` for the whole context.
    pub data_source: DataSource,
    #[serde(default)]
    #[schemars(with = "ConditionSpec")]
    pub activate_when: ActivationCondition,
    #[serde(default)]
    pub fallback: Fallback,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<TransformSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// Authoring hint only. Execution order comes from list order plus
    /// `depends_on`.
    #[serde(default)]
    pub priority: i32,
}

impl SectionDefinition {
    /// An always-active section with a `null` fallback and no transform.
    pub fn new(
        id: impl Into<String>,
        output_key: impl Into<String>,
        data_source: impl Into<DataSource>,
    ) -> Self {
        Self {
            id: id.into(),
            output_key: output_key.into(),
            data_source: data_source.into(),
            activate_when: ActivationCondition::Always,
            fallback: Fallback::default(),
            transform: None,
            depends_on: Vec::new(),
            priority: 0,
        }
    }

    pub fn when(mut self, condition: ActivationCondition) -> Self {
        self.activate_when = condition;
        self
    }

    pub fn with_fallback(mut self, fallback: Fallback) -> Self {
        self.fallback = fallback;
        self
    }

    /// Run the resolved input through one registered transform.
    pub fn transform(mut self, name: impl Into<String>) -> Self {
        self.transform = Some(TransformSpec::Single(name.into()));
        self
    }

    /// Run the resolved input through several transforms, left to right.
    pub fn chain<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.transform = Some(TransformSpec::Chain(names.into_iter().map(Into::into).collect()));
        self
    }

    pub fn depends_on<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Transform names in execution order (empty when there is no transform).
    pub fn transform_names(&self) -> &[String] {
        match &self.transform {
            Some(spec) => spec.names(),
            None => &[],
        }
    }
}

// ── Data source ────────────────────────────────────────────────────

/// One input name or several.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum DataSource {
    Single(String),
    Multiple(Vec<String>),
}

impl DataSource {
    pub fn names(&self) -> &[String] {
        match self {
            Self::Single(name) => std::slice::from_ref(name),
            Self::Multiple(names) => names,
        }
    }

    /// True when any name is the whole-context sentinel.
    pub fn is_whole_context(&self) -> bool {
        self.names().iter().any(|n| n == WHOLE_CONTEXT)
    }
}

impl From<&str> for DataSource {
    fn from(name: &str) -> Self {
        Self::Single(name.to_string())
    }
}

impl From<String> for DataSource {
    fn from(name: String) -> Self {
        Self::Single(name)
    }
}

impl<const N: usize> From<[&str; N]> for DataSource {
    fn from(names: [&str; N]) -> Self {
        Self::Multiple(names.iter().map(|n| n.to_string()).collect())
    }
}

// ── Fallback ───────────────────────────────────────────────────────

/// What an inactive section leaves in the document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum FallbackAction {
    /// Key present with value `null`.
    #[default]
    Null,
    /// Key present with the configured value, or `{}`.
    EmptyObject,
    /// Key absent.
    Omit,
    /// Same as `Omit`.
    Skip,
}

impl FallbackAction {
    /// Whether an inactive section leaves its key out of the document.
    pub fn omits_key(self) -> bool {
        matches!(self, Self::Omit | Self::Skip)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Fallback {
    #[serde(default)]
    pub action: FallbackAction,
    /// Default stored by `emptyObject` instead of `{}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl Fallback {
    pub fn null() -> Self {
        Self::default()
    }

    pub fn empty_object() -> Self {
        Self {
            action: FallbackAction::EmptyObject,
            value: None,
        }
    }

    /// `emptyObject` with a configured default value.
    pub fn with_value(value: Value) -> Self {
        Self {
            action: FallbackAction::EmptyObject,
            value: Some(value),
        }
    }

    pub fn omit() -> Self {
        Self {
            action: FallbackAction::Omit,
            value: None,
        }
    }
}

// ── Transform spec ─────────────────────────────────────────────────

/// A single transform name or an ordered chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum TransformSpec {
    Single(String),
    Chain(Vec<String>),
}

impl TransformSpec {
    pub fn names(&self) -> &[String] {
        match self {
            Self::Single(name) => std::slice::from_ref(name),
            Self::Chain(names) => names,
        }
    }
}

// ── Activation condition ───────────────────────────────────────────

/// When a section runs.
///
/// Serialized as a [`ConditionSpec`] object: a `condition` tag plus the
/// parameters that tag uses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ConditionSpec", into = "ConditionSpec")]
pub enum ActivationCondition {
    #[default]
    Always,
    /// At least one source is present (and non-empty if an array).
    /// `None` checks the section's own data source.
    DataExists { sources: Option<Vec<String>> },
    /// The named spec fragment is present.
    SpecResolved { spec: String },
    /// The subject record carries the named relation.
    EntityHasRelation { relation: String },
    /// The subject has no prior history.
    IsFirstOccurrence,
    /// The subject's grouping under `scope` has no prior history.
    IsFirstOccurrenceInScope { scope: String },
    /// A tag this crate does not know.
    Custom { tag: String },
}

impl ActivationCondition {
    pub fn data_exists() -> Self {
        Self::DataExists { sources: None }
    }

    pub fn data_exists_in<I, S>(sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::DataExists {
            sources: Some(sources.into_iter().map(Into::into).collect()),
        }
    }

    pub fn spec_resolved(spec: impl Into<String>) -> Self {
        Self::SpecResolved { spec: spec.into() }
    }

    pub fn has_relation(relation: impl Into<String>) -> Self {
        Self::EntityHasRelation {
            relation: relation.into(),
        }
    }

    pub fn first_in_scope(scope: impl Into<String>) -> Self {
        Self::IsFirstOccurrenceInScope { scope: scope.into() }
    }

    pub fn tag(&self) -> &str {
        match self {
            Self::Always => conditions::ALWAYS,
            Self::DataExists { .. } => conditions::DATA_EXISTS,
            Self::SpecResolved { .. } => conditions::SPEC_RESOLVED,
            Self::EntityHasRelation { .. } => conditions::ENTITY_HAS_RELATION,
            Self::IsFirstOccurrence => conditions::IS_FIRST_OCCURRENCE,
            Self::IsFirstOccurrenceInScope { .. } => conditions::IS_FIRST_OCCURRENCE_IN_SCOPE,
            Self::Custom { tag } => tag,
        }
    }

    /// Name of a required parameter that is empty, if any.
    pub fn missing_parameter(&self) -> Option<&'static str> {
        match self {
            Self::SpecResolved { spec } if spec.is_empty() => Some("spec"),
            Self::EntityHasRelation { relation } if relation.is_empty() => Some("relation"),
            Self::IsFirstOccurrenceInScope { scope } if scope.is_empty() => Some("scope"),
            Self::DataExists { sources: Some(s) } if s.is_empty() => Some("sources"),
            _ => None,
        }
    }
}

/// Wire form of an [`ActivationCondition`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ConditionSpec {
    /// Condition tag, e.g. `"dataExists"`.
    pub condition: String,
    /// `dataExists`: sources to check instead of the section's data source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
    /// `specResolved`: fragment holding the resolved spec.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<String>,
    /// `entityHasRelation`: relation field on the subject record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,
    /// `isFirstOccurrenceInScope`: grouping to scope the check to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl From<ConditionSpec> for ActivationCondition {
    fn from(spec: ConditionSpec) -> Self {
        match spec.condition.as_str() {
            conditions::ALWAYS => Self::Always,
            conditions::DATA_EXISTS => Self::DataExists { sources: spec.sources },
            conditions::SPEC_RESOLVED => Self::SpecResolved {
                spec: spec.spec.unwrap_or_default(),
            },
            conditions::ENTITY_HAS_RELATION => Self::EntityHasRelation {
                relation: spec.relation.unwrap_or_default(),
            },
            conditions::IS_FIRST_OCCURRENCE => Self::IsFirstOccurrence,
            conditions::IS_FIRST_OCCURRENCE_IN_SCOPE => Self::IsFirstOccurrenceInScope {
                scope: spec.scope.unwrap_or_default(),
            },
            _ => Self::Custom { tag: spec.condition },
        }
    }
}

impl From<ActivationCondition> for ConditionSpec {
    fn from(condition: ActivationCondition) -> Self {
        let mut spec = ConditionSpec {
            condition: condition.tag().to_string(),
            ..Default::default()
        };
        match condition {
            ActivationCondition::DataExists { sources } => spec.sources = sources,
            ActivationCondition::SpecResolved { spec: name } => spec.spec = Some(name),
            ActivationCondition::EntityHasRelation { relation } => spec.relation = Some(relation),
            ActivationCondition::IsFirstOccurrenceInScope { scope } => spec.scope = Some(scope),
            ActivationCondition::Always
            | ActivationCondition::IsFirstOccurrence
            | ActivationCondition::Custom { .. } => {}
        }
        spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_camel_case_definition() {
        let def: SectionDefinition = serde_json::from_value(json!({
            "id": "memories",
            "outputKey": "memories",
            "dataSource": "memories",
            "activateWhen": {"condition": "dataExists"},
            "fallback": {"action": "emptyObject"},
            "transform": ["dedupe_memories", "group_memories"],
            "dependsOn": ["caller_info"],
            "priority": 3
        }))
        .unwrap();

        assert_eq!(def.activate_when, ActivationCondition::data_exists());
        assert_eq!(def.fallback.action, FallbackAction::EmptyObject);
        assert_eq!(def.transform_names(), ["dedupe_memories", "group_memories"]);
        assert_eq!(def.depends_on, vec!["caller_info"]);
    }

    #[test]
    fn defaults_fill_optional_fields() {
        let def: SectionDefinition = serde_json::from_value(json!({
            "id": "a",
            "outputKey": "a",
            "dataSource": ["x", "y"],
        }))
        .unwrap();
        assert_eq!(def.activate_when, ActivationCondition::Always);
        assert_eq!(def.fallback, Fallback::null());
        assert!(def.transform_names().is_empty());
        assert_eq!(def.data_source.names(), ["x", "y"]);
    }

    #[test]
    fn skip_is_accepted_and_omits() {
        let fallback: Fallback = serde_json::from_value(json!({"action": "skip"})).unwrap();
        assert_eq!(fallback.action, FallbackAction::Skip);
        assert!(fallback.action.omits_key());
    }

    #[test]
    fn unknown_condition_becomes_custom() {
        let condition: ActivationCondition =
            serde_json::from_value(json!({"condition": "dataExsits"})).unwrap();
        assert_eq!(
            condition,
            ActivationCondition::Custom {
                tag: "dataExsits".into()
            }
        );
        assert_eq!(condition.tag(), "dataExsits");
    }

    #[test]
    fn condition_parameters_serialize_with_tag() {
        let value = serde_json::to_value(ActivationCondition::first_in_scope("domain")).unwrap();
        assert_eq!(value, json!({"condition": "isFirstOccurrenceInScope", "scope": "domain"}));
    }

    #[test]
    fn missing_parameter_is_detected() {
        let condition: ActivationCondition =
            serde_json::from_value(json!({"condition": "specResolved"})).unwrap();
        assert_eq!(condition.missing_parameter(), Some("spec"));
        assert_eq!(ActivationCondition::spec_resolved("identitySpec").missing_parameter(), None);
    }

    #[test]
    fn whole_context_sentinel() {
        assert!(DataSource::from(WHOLE_CONTEXT).is_whole_context());
        assert!(!DataSource::from(["a", "b"]).is_whole_context());
    }
}
