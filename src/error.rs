use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures that abort a single operation.
///
/// Outcomes that are expected during normal use (an all-unknown query, a
/// category without usable documents, no match at all) are not errors; they
/// are reported through [`Diagnostic`] or through `None` fields on results.
#[derive(Debug, Error)]
pub enum CategorizerError {
    /// A vector was compared or combined with one of a different length.
    /// Usually means the reference map was built with another embedding model.
    #[error("dimension mismatch for '{category}': expected {expected}, found {found}")]
    DimensionMismatch {
        category: String,
        expected: usize,
        found: usize,
    },
    /// A reference store, catalog or embedding file is missing or malformed.
    #[error("source unavailable: {}: {reason}", source_path.display())]
    SourceUnavailable { source_path: PathBuf, reason: String },
    #[error("at least two vectors are required, got {found}")]
    InsufficientVectors { found: usize },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl CategorizerError {
    pub fn source_unavailable(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        CategorizerError::SourceUnavailable {
            source_path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CategorizerError>;

/// Non-fatal findings collected while vectorizing or building references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// Every token of the document was unknown to the embedding provider.
    NoEmbeddingsResolved { category: String, document: String },
    /// The category had no usable documents and was left out of the map.
    EmptyCategory { category: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::NoEmbeddingsResolved { category, document } => write!(
                f,
                "{}: no words of document '{}' are known to the model",
                category, document
            ),
            Diagnostic::EmptyCategory { category } => {
                write!(f, "{}: no usable documents, category omitted", category)
            }
        }
    }
}
