//! Error types for Reelsmith.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Library-level error type for Reelsmith operations.
#[derive(Error, Debug)]
pub enum ReelError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Trend collection failed: {0}")]
    Collector(String),

    #[error("Video download failed: {0}")]
    DownloadFailed(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Analysis response did not match schema: {0}")]
    AnalysisSchemaInvalid(String),

    #[error("Analysis failed: {0}")]
    AnalysisFailed(String),

    #[error("Generation timed out after {seconds}s (operation {handle})")]
    GenerationTimedOut { handle: String, seconds: u64 },

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Merge failed: {0}")]
    MergeFailed(String),

    #[error("Prompt index {index} already stored for series_id {series_id}.")]
    DuplicateIndex { series_id: String, index: u32 },

    #[error("Mismatched series_id. Expected {expected} but got {got}.")]
    SeriesMismatch { expected: String, got: String },

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Reference store error: {0}")]
    Store(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Machine-readable error tag reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    DownloadFailed,
    UploadFailed,
    AnalysisSchemaInvalid,
    AnalysisFailed,
    GenerationTimedOut,
    GenerationFailed,
    MergeFailed,
    DuplicateIndex,
    SeriesMismatch,
    Cancelled,
    InvalidInput,
    Config,
    External,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            ErrorKind::DownloadFailed => "download_failed",
            ErrorKind::UploadFailed => "upload_failed",
            ErrorKind::AnalysisSchemaInvalid => "analysis_schema_invalid",
            ErrorKind::AnalysisFailed => "analysis_failed",
            ErrorKind::GenerationTimedOut => "generation_timed_out",
            ErrorKind::GenerationFailed => "generation_failed",
            ErrorKind::MergeFailed => "merge_failed",
            ErrorKind::DuplicateIndex => "duplicate_index",
            ErrorKind::SeriesMismatch => "series_mismatch",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Config => "config",
            ErrorKind::External => "external",
            ErrorKind::Internal => "internal",
        };
        f.write_str(tag)
    }
}

impl ReelError {
    /// The taxonomy tag for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReelError::DownloadFailed(_) => ErrorKind::DownloadFailed,
            ReelError::UploadFailed(_) => ErrorKind::UploadFailed,
            ReelError::AnalysisSchemaInvalid(_) => ErrorKind::AnalysisSchemaInvalid,
            ReelError::AnalysisFailed(_) => ErrorKind::AnalysisFailed,
            ReelError::GenerationTimedOut { .. } => ErrorKind::GenerationTimedOut,
            ReelError::GenerationFailed(_) => ErrorKind::GenerationFailed,
            ReelError::MergeFailed(_) => ErrorKind::MergeFailed,
            ReelError::DuplicateIndex { .. } => ErrorKind::DuplicateIndex,
            ReelError::SeriesMismatch { .. } => ErrorKind::SeriesMismatch,
            ReelError::Cancelled(_) => ErrorKind::Cancelled,
            ReelError::InvalidInput(_) => ErrorKind::InvalidInput,
            ReelError::Config(_) | ReelError::TomlParse(_) | ReelError::ToolNotFound(_) => {
                ErrorKind::Config
            }
            ReelError::Collector(_) | ReelError::Http(_) | ReelError::Llm(_) => ErrorKind::External,
            ReelError::Store(_)
            | ReelError::Io(_)
            | ReelError::Json(_)
            | ReelError::Database(_) => ErrorKind::Internal,
        }
    }

    /// Convert into the structured object surfaced to callers.
    pub fn to_report(&self) -> ErrorReport {
        ErrorReport::new(self.kind(), self.to_string())
    }
}

/// Structured error object: `{status: "error", error_type, message}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub status: String,
    pub error_type: ErrorKind,
    pub message: String,
}

impl ErrorReport {
    pub fn new(error_type: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            error_type,
            message: message.into(),
        }
    }
}

impl From<&ReelError> for ErrorReport {
    fn from(err: &ReelError) -> Self {
        err.to_report()
    }
}

/// Result type alias for Reelsmith operations.
pub type Result<T> = std::result::Result<T, ReelError>;
