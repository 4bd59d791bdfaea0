//! Error types

use thiserror::Error;

/// Conversion errors
///
/// Content problems never surface here; readers and writers degrade and
/// record a [`crate::Diagnostic`] instead.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Strict storage parse failure
    #[error("failed to parse storage markup: {0}")]
    Parse(#[from] storage_parser::ParseError),

    /// A document model that breaks the node contract
    #[error("invalid document model: {0}")]
    InvalidModel(String),

    #[error("invalid frontmatter: {0}")]
    Frontmatter(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for conversion operations
pub type Result<T> = std::result::Result<T, Error>;
