//! Activation evaluation: does a section run, and why.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::config::UnknownConditionPolicy;
use super::context::{ComposeContext, grouping_id, has_grouping};
use crate::sections::{ActivationCondition, SectionDefinition};

/// Why a section did or did not activate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "camelCase")]
pub enum ActivationReason {
    Always,
    /// Sources that were present.
    DataFound(Vec<String>),
    /// Sources that were checked and missing.
    DataMissing(Vec<String>),
    /// Name of the resolved spec.
    SpecResolved(String),
    /// Fragment the spec was expected under.
    NoSpec(String),
    RelationPresent { relation: String, name: String },
    RelationAbsent(String),
    FirstOccurrence,
    NotFirstOccurrence,
    FirstInScope(String),
    NotFirstInScope(String),
    /// A condition tag this crate does not know, and what the policy did.
    Unrecognized { tag: String, activated: bool },
}

impl fmt::Display for ActivationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => write!(f, "always active"),
            Self::DataFound(sources) => write!(f, "data found: {}", sources.join(", ")),
            Self::DataMissing(sources) => write!(f, "no data in: {}", sources.join(", ")),
            Self::SpecResolved(name) => write!(f, "spec resolved: {name}"),
            Self::NoSpec(key) => write!(f, "no spec resolved for {key}: none"),
            Self::RelationPresent { relation, name } => write!(f, "{relation} assigned: {name}"),
            Self::RelationAbsent(relation) => write!(f, "no {relation} assigned"),
            Self::FirstOccurrence => write!(f, "first occurrence"),
            Self::NotFirstOccurrence => write!(f, "not the first occurrence"),
            Self::FirstInScope(scope) => write!(f, "first occurrence in this {scope}"),
            Self::NotFirstInScope(scope) => write!(f, "not the first occurrence in this {scope}"),
            Self::Unrecognized { tag, activated: true } => {
                write!(f, "unrecognized condition '{tag}', activated (fail-open)")
            }
            Self::Unrecognized { tag, activated: false } => {
                write!(f, "unrecognized condition '{tag}', skipped (fail-closed)")
            }
        }
    }
}

/// Outcome of evaluating one section's condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Activation {
    pub activated: bool,
    pub reason: ActivationReason,
}

impl Activation {
    fn new(activated: bool, reason: ActivationReason) -> Self {
        Self { activated, reason }
    }
}

/// Evaluate `section.activate_when` against the run so far.
pub fn evaluate(
    section: &SectionDefinition,
    ctx: &ComposeContext<'_>,
    policy: UnknownConditionPolicy,
) -> Activation {
    match &section.activate_when {
        ActivationCondition::Always => Activation::new(true, ActivationReason::Always),

        ActivationCondition::DataExists { sources } => {
            let names = sources.as_deref().unwrap_or(section.data_source.names());
            let (found, missing): (Vec<String>, Vec<String>) =
                names.iter().cloned().partition(|name| ctx.has_data(name));
            if found.is_empty() {
                Activation::new(false, ActivationReason::DataMissing(missing))
            } else {
                Activation::new(true, ActivationReason::DataFound(found))
            }
        }

        ActivationCondition::SpecResolved { spec } => match ctx.source(spec) {
            Some(resolved) => {
                let name = resolved
                    .get("name")
                    .or_else(|| resolved.get("slug"))
                    .and_then(|v| v.as_str())
                    .unwrap_or(spec)
                    .to_string();
                Activation::new(true, ActivationReason::SpecResolved(name))
            }
            None => Activation::new(false, ActivationReason::NoSpec(spec.clone())),
        },

        ActivationCondition::EntityHasRelation { relation } => {
            let subject = ctx.subject();
            if !has_grouping(subject, relation) {
                return Activation::new(false, ActivationReason::RelationAbsent(relation.clone()));
            }
            let related = subject.get(relation);
            let name = related
                .and_then(|v| v.get("name"))
                .and_then(|n| n.as_str())
                .or_else(|| related.and_then(|v| v.as_str()))
                .map(str::to_string)
                .or_else(|| grouping_id(subject, relation))
                .unwrap_or_else(|| relation.clone());
            Activation::new(
                true,
                ActivationReason::RelationPresent {
                    relation: relation.clone(),
                    name,
                },
            )
        }

        ActivationCondition::IsFirstOccurrence => {
            if ctx.run_state().first_occurrence {
                Activation::new(true, ActivationReason::FirstOccurrence)
            } else {
                Activation::new(false, ActivationReason::NotFirstOccurrence)
            }
        }

        ActivationCondition::IsFirstOccurrenceInScope { scope } => {
            if ctx.run_state().is_first_in_scope(scope) {
                Activation::new(true, ActivationReason::FirstInScope(scope.clone()))
            } else {
                Activation::new(false, ActivationReason::NotFirstInScope(scope.clone()))
            }
        }

        ActivationCondition::Custom { tag } => {
            let activated = policy == UnknownConditionPolicy::FailOpen;
            if !activated {
                warn!(
                    "[activation] section '{}' has unrecognized condition '{tag}', applying fallback",
                    section.id
                );
            }
            Activation::new(
                activated,
                ActivationReason::Unrecognized {
                    tag: tag.clone(),
                    activated,
                },
            )
        }
    }
}
