//! The composition runtime.
//!
//! - [`executor::Composer`]: one run over loaded data. Start here.
//! - [`config::ComposerConfig`]: subject key, private prefix, unknown
//!   condition policy and the section list; JSON loading and schema.
//! - [`loader::FragmentLoader`]: concurrent fragment fetches, finishing
//!   before any section runs.
//! - [`resolver`], [`activation`], [`fallback`]: the per-section steps.
//! - [`events`]: [`CompositionObserver`] for watching a run.
//! - [`document`]: markdown rendering of a composed document.

pub mod activation;
pub mod config;
pub mod context;
pub mod document;
pub mod events;
pub mod executor;
pub mod fallback;
pub mod loader;
pub mod resolver;

pub use activation::{Activation, ActivationReason, evaluate};
pub use config::{
    ComposerConfig, UnknownConditionPolicy, load_sections, parse_sections, section_schema,
};
pub use context::{ComposeContext, LoadedData, RunState};
pub use document::{PromptBuilder, render_prompt};
pub use events::{
    CompositeObserver, CompositionEvent, CompositionObserver, LoggingObserver, NoopObserver,
};
pub use executor::{Composer, CompositionResult, RunMetadata, SkippedSection};
pub use fallback::fallback_value;
pub use loader::FragmentLoader;
pub use resolver::resolve_order;
