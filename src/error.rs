//! Error types for the similarity graph pipeline
//!
//! Every phase (embed, index, graph) reports failures through [`PipelineError`].
//! Lower layers keep their own error enums and are converted here with the
//! offending document id or file path attached.

use crate::vector::IndexError;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for pipeline operations
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Malformed records, duplicate or missing ids, misaligned inputs
    #[error("Invalid input in '{origin}': {reason}")]
    InputValidation { origin: String, reason: String },

    /// The embedding capability failed or returned the wrong shape
    #[error("Embedding failed for document '{id}': {reason}")]
    Embedding { id: String, reason: String },

    /// The embedding model could not be loaded or downloaded
    #[error("Failed to load embedding model '{model}': {reason}")]
    ModelInit { model: String, reason: String },

    #[error("Failed to build similarity index: {reason}")]
    IndexBuild { reason: String },

    #[error("Similarity index query failed: {reason}")]
    IndexQuery { reason: String },

    /// Reading or writing an artifact (records, matrix, index, graph, note)
    #[error("Failed to {operation} '{path}': {reason}")]
    ArtifactIo {
        operation: &'static str,
        path: PathBuf,
        reason: String,
    },

    /// A vault document whose front matter cannot be parsed
    #[error("Malformed document '{path}': {reason}")]
    DocumentFormat { path: PathBuf, reason: String },

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },
}

impl PipelineError {
    pub fn input(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InputValidation {
            origin: origin.into(),
            reason: reason.into(),
        }
    }

    pub fn embedding(id: impl Into<String>, reason: impl ToString) -> Self {
        Self::Embedding {
            id: id.into(),
            reason: reason.to_string(),
        }
    }

    pub fn read(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::ArtifactIo {
            operation: "read",
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn write(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::ArtifactIo {
            operation: "write",
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Get a stable status code for this error type.
    pub fn status_code(&self) -> &'static str {
        match self {
            Self::InputValidation { .. } => "INPUT_VALIDATION_ERROR",
            Self::Embedding { .. } => "EMBEDDING_FAILURE",
            Self::ModelInit { .. } => "MODEL_INIT_FAILURE",
            Self::IndexBuild { .. } => "INDEX_BUILD_FAILURE",
            Self::IndexQuery { .. } => "INDEX_QUERY_FAILURE",
            Self::ArtifactIo { .. } => "ARTIFACT_IO_FAILURE",
            Self::DocumentFormat { .. } => "DOCUMENT_FORMAT_ERROR",
            Self::Config { .. } => "CONFIG_ERROR",
        }
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::InputValidation { .. } => vec![
                "Re-run 'vaultgraph extract' to regenerate the record file",
                "Every record needs a unique, non-empty 'id'",
            ],
            Self::Embedding { .. } => vec![
                "Check that the embedding model downloaded completely",
                "All fields must be embedded with the same model",
            ],
            Self::ModelInit { .. } => vec![
                "The first run downloads the model and needs network access",
                "Set 'embedding.cache_dir' to a writable directory",
            ],
            Self::IndexBuild { .. } => vec![
                "Re-run 'vaultgraph embed' to regenerate the vector matrix",
            ],
            Self::IndexQuery { .. } => vec![
                "The index does not match the vector matrix, re-run 'vaultgraph embed'",
                "Use 'vaultgraph run' to rebuild every artifact in one pass",
            ],
            Self::ArtifactIo { .. } => vec![
                "Check that the path exists and you have read/write permissions",
                "Check available disk space",
            ],
            Self::DocumentFormat { .. } => vec![
                "Fix the YAML front matter between the leading '---' lines",
            ],
            Self::Config { .. } => vec![
                "Run 'vaultgraph config' to inspect the effective settings",
                "Run 'vaultgraph init --force' to regenerate the settings file",
            ],
        }
    }
}

impl From<IndexError> for PipelineError {
    fn from(error: IndexError) -> Self {
        if error.is_build_error() {
            Self::IndexBuild {
                reason: error.to_string(),
            }
        } else {
            Self::IndexQuery {
                reason: error.to_string(),
            }
        }
    }
}

/// Result type alias for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;
