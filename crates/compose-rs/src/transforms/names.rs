//! Canonical transform name constants.
//!
//! Section definitions and the built-in registry both reference these, so a
//! rename only touches this file (and any external configuration files).

pub const MAP_CALLER_INFO: &str = "map_caller_info";
pub const MAP_PERSONALITY: &str = "map_personality";
pub const DEDUPE_MEMORIES: &str = "dedupe_memories";
pub const GROUP_MEMORIES: &str = "group_memories";
pub const MERGE_TARGETS: &str = "merge_targets";
pub const SUMMARIZE_CALL_HISTORY: &str = "summarize_call_history";
pub const MAP_DOMAIN: &str = "map_domain";
pub const COMPUTE_MODULE_PROGRESS: &str = "compute_module_progress";
pub const MAP_GOALS: &str = "map_goals";
pub const EXTRACT_SPEC: &str = "extract_spec";
pub const COMPUTE_FIRST_CALL: &str = "compute_first_call";
pub const COMPUTE_DOMAIN_WELCOME: &str = "compute_domain_welcome";
pub const COMPUTE_SESSION_PLAN: &str = "compute_session_plan";
pub const COMPUTE_VOICE_GUIDANCE: &str = "compute_voice_guidance";
pub const COMPUTE_INSTRUCTIONS: &str = "compute_instructions";
pub const COMPUTE_QUICK_START: &str = "compute_quick_start";
