//! Custom error types for rustslr.
//!
//! Every layer converts its failures into an [`SlrError`] value before returning,
//! so an HTTP handler always has something it can render as `{"error": ...}`.

use thiserror::Error;

/// Main error type for rustslr operations.
#[derive(Debug, Error)]
pub enum SlrError {
    /// Network/HTTP transport error (connect, timeout, body read)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Upstream response did not have the expected shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// External API returned a non-success status
    #[error("API error: {code} - {message}")]
    Api {
        /// HTTP status code from the provider
        code: u16,
        /// Response body text, verbatim
        message: String,
    },

    /// A provider credential is not configured
    #[error("Missing credential: {0} is not set")]
    MissingCredential(&'static str),

    /// Model id does not belong to any known provider family
    #[error("Unsupported model: {0}")]
    UnsupportedModel(String),

    /// Heuristic extraction from model output failed
    #[error("{message}. Response: {raw}")]
    Extraction {
        message: String,
        /// The offending model output, kept for diagnosis
        raw: String,
    },

    /// Caller input is missing or invalid
    #[error("{0}")]
    Validation(String),

    /// Document template could not be loaded
    #[error("Template error: {0}")]
    Template(String),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV export error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl SlrError {
    /// HTTP status this error maps to: caller mistakes are 400, the rest 500.
    pub fn status_code(&self) -> u16 {
        match self {
            SlrError::Validation(_) | SlrError::UnsupportedModel(_) => 400,
            _ => 500,
        }
    }

    /// Shorthand for a validation error naming a missing field.
    pub fn missing_field(field: &str) -> Self {
        SlrError::Validation(format!("Missing required field: {}", field))
    }
}

/// Result type alias using `SlrError`
pub type Result<T> = std::result::Result<T, SlrError>;

/// Extension trait for adding context to Option types
pub trait OptionExt<T> {
    /// Convert Option to Result with a parse error message
    fn ok_or_parse(self, msg: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_parse(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| SlrError::Parse(msg.to_string()))
    }
}
