//! Error types for pawtrip.
//!
//! A single error enum covers every category the workspace deals with:
//! configuration, I/O, LLM calls, the evidence store, external data sources,
//! prompts and serialization.

use thiserror::Error;

/// Unified error type for pawtrip.
///
/// All fallible functions return `Result<T, AppError>`. The retrieval
/// pipeline recovers most of these locally; only the CLI surfaces them.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// LLM provider errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Evidence store (vector index) errors
    #[error("Store error: {0}")]
    Store(String),

    /// External data source errors (tour API, weather API)
    #[error("External source error: {0}")]
    External(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A boundary call exceeded its time budget
    #[error("Timed out after {secs}s: {operation}")]
    Timeout { operation: String, secs: u64 },

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Build a timeout error for the named operation.
    pub fn timeout(operation: impl Into<String>, secs: u64) -> Self {
        AppError::Timeout {
            operation: operation.into(),
            secs,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::Store(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::External(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Other(format!("{:#}", err))
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display() {
        let err = AppError::timeout("index search", 10);
        assert_eq!(err.to_string(), "Timed out after 10s: index search");
    }

    #[test]
    fn test_json_error_maps_to_serialization() {
        let err: AppError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, AppError::Serialization(_)));
    }

    #[test]
    fn test_anyhow_context_is_kept() {
        let err: AppError = anyhow::anyhow!("inner").context("outer").into();
        assert_eq!(err.to_string(), "outer: inner");
    }
}
