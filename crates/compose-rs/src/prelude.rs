//! Convenience re-exports for common `compose-rs` types.
//!
//! ```
//! use compose_rs::prelude::*;
//! ```
//!
//! Covers building a [`Composer`], loading data, defining sections and
//! rendering templates. Validation issue types and individual transforms
//! live in their modules.

// ── Composition ─────────────────────────────────────────────────────
pub use crate::compose::{
    ActivationReason, Composer, ComposerConfig, CompositeObserver, CompositionEvent,
    CompositionObserver, CompositionResult, FragmentLoader, LoadedData, LoggingObserver,
    NoopObserver, PromptBuilder, RunMetadata, UnknownConditionPolicy,
};
pub use crate::error::ComposeError;

// ── Sections ────────────────────────────────────────────────────────
pub use crate::sections::defaults::default_sections;
pub use crate::sections::validate::{ValidationReport, validate_sections};
pub use crate::sections::{
    ActivationCondition, DataSource, Fallback, FallbackAction, SectionDefinition,
};

// ── Transforms & templates ──────────────────────────────────────────
pub use crate::template::{CompiledFragment, FragmentTemplate, compile};
pub use crate::transforms::{TransformFn, TransformRegistry};
