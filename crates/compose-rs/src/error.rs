//! Error type for composition runs and configuration loading.
//!
//! Only conditions that make a run meaningless are errors. Unknown transforms,
//! unrecognized activation tags and failed fragment loads degrade a single
//! section and are reported through logging and run metadata instead.

use std::path::PathBuf;

use crate::sections::validate::ValidationReport;

#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    /// The loaded data has no subject record under the configured key.
    #[error("no subject record found under '{key}'; cannot compose a document without one")]
    MissingSubject { key: String },

    /// Pre-flight validation of the section list found errors.
    #[error("invalid section configuration:\n{0}")]
    InvalidConfiguration(ValidationReport),

    /// A configuration or section file could not be read or parsed.
    #[error("failed to load {}: {message}", path.display())]
    ConfigLoad { path: PathBuf, message: String },
}

impl ComposeError {
    pub(crate) fn config_load(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            message: message.to_string(),
        }
    }
}
