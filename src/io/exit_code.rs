//! Exit codes for CLI operations following Unix conventions.
//!
//! # Exit Code Semantics
//!
//! - `0`: Success
//! - `1`: General error - unspecified failure
//! - `2`: Blocking error - critical failure that should halt automation
//! - `3-125`: Specific recoverable errors
//! - `126-255`: Reserved by shell

use crate::error::PipelineError;

/// Standard exit codes for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Operation succeeded (code 0)
    Success = 0,

    /// Unspecified error occurred (code 1)
    GeneralError = 1,

    /// Critical error that should halt automation (code 2)
    BlockingError = 2,

    /// Records or graph contents are invalid (code 3)
    InvalidInput = 3,

    /// A vault note could not be parsed (code 4)
    ParseError = 4,

    /// File I/O error (code 5)
    IoError = 5,

    /// Configuration error (code 6)
    ConfigError = 6,

    /// Index is stale or does not match the vector matrix (code 7)
    IndexCorrupted = 7,

    /// The embedding model failed (code 8)
    EmbeddingFailed = 8,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl ExitCode {
    /// Convert a `PipelineError` to the appropriate exit code.
    ///
    /// Maps specific error types to semantic exit codes that scripts
    /// can use to determine appropriate recovery actions.
    pub fn from_error(error: &PipelineError) -> Self {
        match error {
            PipelineError::InputValidation { .. } => ExitCode::InvalidInput,
            PipelineError::DocumentFormat { .. } => ExitCode::ParseError,
            PipelineError::ArtifactIo { .. } => ExitCode::IoError,
            PipelineError::Config { .. } => ExitCode::ConfigError,
            PipelineError::IndexQuery { .. } => ExitCode::IndexCorrupted,
            PipelineError::Embedding { .. } | PipelineError::ModelInit { .. } => {
                ExitCode::EmbeddingFailed
            }

            // Non-finite vectors mean the matrix itself is unusable
            PipelineError::IndexBuild { .. } => ExitCode::BlockingError,
        }
    }

    /// Check if this exit code indicates a blocking error.
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        matches!(self, ExitCode::BlockingError)
    }

    /// Get a human-readable description of the exit code.
    pub fn description(&self) -> &str {
        match self {
            ExitCode::Success => "Success",
            ExitCode::GeneralError => "General error",
            ExitCode::BlockingError => "Blocking error - automation should halt",
            ExitCode::InvalidInput => "Invalid input",
            ExitCode::ParseError => "Parse error",
            ExitCode::IoError => "I/O error",
            ExitCode::ConfigError => "Configuration error",
            ExitCode::IndexCorrupted => "Index corrupted",
            ExitCode::EmbeddingFailed => "Embedding failed",
        }
    }
}
