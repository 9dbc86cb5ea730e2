//! Declarative, dependency-ordered composition of prompt payloads.
//!
//! `compose-rs` turns a bag of independently loaded data fragments (a
//! subject record, memories, targets, curriculum, history, resolved specs)
//! into one flat JSON document, the runtime payload of a conversational
//! agent. The pipeline is a list of named *sections*. Each section declares
//! where its input comes from, when it activates, what it stores when it
//! does not, which pure transforms shape its output and which sections must
//! run before it. A small embedded template language renders free-text
//! fragments.
//!
//! # Getting started
//!
//! ```
//! use compose_rs::prelude::*;
//! use serde_json::json;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let loaded = FragmentLoader::new("caller")
//!     .value("caller", json!({"id": "c1", "name": "Ada"}))
//!     .value("memories", json!([{"key": "pet", "value": "a cat", "category": "personal"}]))
//!     .load()
//!     .await;
//!
//! let composer = Composer::new(ComposerConfig::default()).unwrap();
//! let result = composer.compose(&loaded).unwrap();
//!
//! assert_eq!(result.document["caller"]["name"], "Ada");
//! assert_eq!(result.metadata.memory_count, 1);
//! println!("{}", result.render_prompt());
//! # });
//! ```
//!
//! # Where to find things
//!
//! - **Run a composition:** [`Composer`](compose::executor::Composer) and
//!   [`ComposerConfig`](compose::config::ComposerConfig). Observe runs with a
//!   [`CompositionObserver`](compose::events::CompositionObserver).
//! - **Load fragments:** [`FragmentLoader`](compose::loader::FragmentLoader)
//!   fetches concurrently and returns a
//!   [`LoadedData`](compose::context::LoadedData) bag.
//! - **Define sections:** [`SectionDefinition`](sections::SectionDefinition)
//!   and its builders; [`default_sections`](sections::defaults::default_sections)
//!   is the built-in reference list; check a list up front with
//!   [`validate_sections`](sections::validate::validate_sections).
//! - **Add transforms:** [`TransformRegistry::register`](transforms::TransformRegistry::register).
//! - **Render templates:** [`template::compile`], the fragment catalogue in
//!   [`template::catalogue`], and the strict checker [`template::validate`].
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`compose`] | Executor, config, loader, resolver, activation, fallback, events, prompt rendering |
//! | [`sections`] | Section definitions, the reference list, pre-flight validation |
//! | [`transforms`] | Transform registry, chain executor, built-in transforms |
//! | [`template`] | Template compiler, fragment catalogue, strict validation |
//! | [`error`] | [`ComposeError`](error::ComposeError) |

pub mod compose;
pub mod error;
pub mod prelude;
pub mod sections;
pub mod template;
pub mod transforms;

use schemars::JsonSchema;

/// Data source sentinel for "everything computed so far".
pub const WHOLE_CONTEXT: &str = "_all";

/// Fixed document field carrying [`FORMAT_VERSION`].
pub const VERSION_KEY: &str = "version";

/// Fixed document field carrying the one-line summary.
pub const SUMMARY_KEY: &str = "summary";

/// Format tag written to every composed document.
pub const FORMAT_VERSION: &str = "compose/1";

pub const DEFAULT_PRIVATE_PREFIX: &str = "_";

pub const DEFAULT_SUBJECT_KEY: &str = "caller";

/// Generate a JSON Schema `serde_json::Value` from a type that derives
/// [`JsonSchema`].
///
/// ```
/// use compose_rs::json_schema_for;
/// use compose_rs::sections::SectionDefinition;
///
/// let schema = json_schema_for::<SectionDefinition>();
/// assert_eq!(schema["type"], "object");
/// assert!(schema["required"].as_array().unwrap().contains(&"outputKey".into()));
/// ```
pub fn json_schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}
