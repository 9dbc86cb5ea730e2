//! The built-in reference section list.
//!
//! Used whenever no section configuration is supplied, and doubles as the
//! canonical fixture for composition tests. Every section that can activate
//! against an empty fragment bag has a `null` or `emptyObject` fallback, so
//! composing an empty bag yields every such key and none of the `omit` ones.

use super::{ActivationCondition, Fallback, SectionDefinition};
use crate::WHOLE_CONTEXT;
use crate::transforms::names;

/// Names of loaded fragments the reference sections read.
pub mod sources {
    pub const CALLER: &str = "caller";
    pub const PERSONALITY: &str = "personality";
    pub const MEMORIES: &str = "memories";
    pub const BEHAVIOR_TARGETS: &str = "behaviorTargets";
    pub const CALLER_TARGETS: &str = "callerTargets";
    pub const RECENT_CALLS: &str = "recentCalls";
    pub const SUBJECT_DOMAIN: &str = "subject.domain";
    pub const CURRICULUM: &str = "curriculum";
    pub const GOALS: &str = "goals";
    pub const IDENTITY_SPEC: &str = "identitySpec";
    pub const CONTENT_SPEC: &str = "contentSpec";
    pub const ONBOARDING_SPEC: &str = "onboardingSpec";
    /// Optional override for the voice guidance fragment catalogue.
    pub const VOICE_TEMPLATES: &str = "voiceTemplates";
}

/// Output keys of the reference sections.
pub mod keys {
    pub const CALLER: &str = "caller";
    pub const PERSONALITY: &str = "personality";
    pub const MEMORIES: &str = "memories";
    pub const BEHAVIOR_TARGETS: &str = "behaviorTargets";
    pub const CALL_HISTORY: &str = "callHistory";
    pub const DOMAIN: &str = "domain";
    pub const CURRICULUM: &str = "curriculum";
    pub const LEARNER_GOALS: &str = "learnerGoals";
    pub const IDENTITY: &str = "identity";
    pub const CONTENT: &str = "content";
    pub const FIRST_CALL: &str = "firstCall";
    pub const DOMAIN_WELCOME: &str = "domainWelcome";
    pub const SESSION_PLAN: &str = "sessionPlan";
    pub const VOICE_GUIDANCE: &str = "voiceGuidance";
    pub const INSTRUCTIONS: &str = "instructions";
    pub const QUICK_START: &str = "quickStart";
}

/// Scope used by the first-call-in-domain section.
pub const DOMAIN_SCOPE: &str = "domain";

pub fn default_sections() -> Vec<SectionDefinition> {
    vec![
        SectionDefinition::new("caller_info", keys::CALLER, sources::CALLER)
            .transform(names::MAP_CALLER_INFO)
            .with_priority(1),
        SectionDefinition::new("personality", keys::PERSONALITY, sources::PERSONALITY)
            .when(ActivationCondition::data_exists())
            .transform(names::MAP_PERSONALITY)
            .with_priority(2),
        SectionDefinition::new("memories", keys::MEMORIES, sources::MEMORIES)
            .when(ActivationCondition::data_exists())
            .with_fallback(Fallback::empty_object())
            .chain([names::DEDUPE_MEMORIES, names::GROUP_MEMORIES])
            .with_priority(3),
        SectionDefinition::new(
            "behavior_targets",
            keys::BEHAVIOR_TARGETS,
            [sources::BEHAVIOR_TARGETS, sources::CALLER_TARGETS],
        )
        .when(ActivationCondition::data_exists())
        .with_fallback(Fallback::empty_object())
        .transform(names::MERGE_TARGETS)
        .with_priority(4),
        SectionDefinition::new("call_history", keys::CALL_HISTORY, sources::RECENT_CALLS)
            .when(ActivationCondition::data_exists())
            .with_fallback(Fallback::omit())
            .transform(names::SUMMARIZE_CALL_HISTORY)
            .with_priority(5),
        SectionDefinition::new("domain", keys::DOMAIN, sources::SUBJECT_DOMAIN)
            .when(ActivationCondition::has_relation(DOMAIN_SCOPE))
            .transform(names::MAP_DOMAIN)
            .with_priority(6),
        SectionDefinition::new("curriculum", keys::CURRICULUM, sources::CURRICULUM)
            .when(ActivationCondition::data_exists())
            .with_fallback(Fallback::omit())
            .transform(names::COMPUTE_MODULE_PROGRESS)
            .depends_on(["domain"])
            .with_priority(7),
        SectionDefinition::new("learner_goals", keys::LEARNER_GOALS, sources::GOALS)
            .when(ActivationCondition::data_exists())
            .with_fallback(Fallback::omit())
            .transform(names::MAP_GOALS)
            .with_priority(8),
        SectionDefinition::new("identity", keys::IDENTITY, sources::IDENTITY_SPEC)
            .when(ActivationCondition::spec_resolved(sources::IDENTITY_SPEC))
            .transform(names::EXTRACT_SPEC)
            .with_priority(9),
        SectionDefinition::new("content", keys::CONTENT, sources::CONTENT_SPEC)
            .when(ActivationCondition::spec_resolved(sources::CONTENT_SPEC))
            .transform(names::EXTRACT_SPEC)
            .with_priority(10),
        SectionDefinition::new("first_call", keys::FIRST_CALL, sources::ONBOARDING_SPEC)
            .when(ActivationCondition::IsFirstOccurrence)
            .transform(names::COMPUTE_FIRST_CALL)
            .depends_on(["caller_info", "domain"])
            .with_priority(11),
        SectionDefinition::new("domain_welcome", keys::DOMAIN_WELCOME, sources::SUBJECT_DOMAIN)
            .when(ActivationCondition::first_in_scope(DOMAIN_SCOPE))
            .with_fallback(Fallback::omit())
            .transform(names::COMPUTE_DOMAIN_WELCOME)
            .depends_on(["caller_info", "domain", "curriculum"])
            .with_priority(12),
        SectionDefinition::new("session_plan", keys::SESSION_PLAN, WHOLE_CONTEXT)
            .transform(names::COMPUTE_SESSION_PLAN)
            .depends_on(["curriculum", "call_history", "memories", "learner_goals", "first_call"])
            .with_priority(13),
        SectionDefinition::new(
            "voice_guidance",
            keys::VOICE_GUIDANCE,
            [sources::BEHAVIOR_TARGETS, sources::CALLER_TARGETS, sources::PERSONALITY],
        )
        .when(ActivationCondition::data_exists())
        .with_fallback(Fallback::omit())
        .transform(names::COMPUTE_VOICE_GUIDANCE)
        .depends_on(["behavior_targets", "personality"])
        .with_priority(14),
        SectionDefinition::new("instructions", keys::INSTRUCTIONS, WHOLE_CONTEXT)
            .with_fallback(Fallback::empty_object())
            .transform(names::COMPUTE_INSTRUCTIONS)
            .depends_on([
                "caller_info",
                "identity",
                "personality",
                "memories",
                "voice_guidance",
                "first_call",
            ])
            .with_priority(15),
        SectionDefinition::new("quick_start", keys::QUICK_START, WHOLE_CONTEXT)
            .transform(names::COMPUTE_QUICK_START)
            .depends_on([
                "caller_info",
                "domain",
                "identity",
                "content",
                "session_plan",
                "memories",
                "first_call",
            ])
            .with_priority(16),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sections::validate::validate_sections;
    use crate::transforms::TransformRegistry;

    #[test]
    fn reference_list_is_valid() {
        let report = validate_sections(&default_sections(), &TransformRegistry::builtin());
        assert!(report.issues.is_empty(), "{report}");
    }

    #[test]
    fn reference_list_has_sixteen_sections() {
        assert_eq!(default_sections().len(), 16);
    }

    #[test]
    fn reference_list_round_trips_through_json() {
        let sections = default_sections();
        let json = serde_json::to_value(&sections).unwrap();
        let back: Vec<SectionDefinition> = serde_json::from_value(json).unwrap();
        assert_eq!(back, sections);
    }
}
