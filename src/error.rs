//! Error types for the financial advisor agent

use thiserror::Error;

/// Result type alias for advisor operations
pub type Result<T> = std::result::Result<T, AdvisorError>;

#[derive(Error, Debug)]
pub enum AdvisorError {

    // =============================
    // Core Pipeline Errors
    // =============================

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Fabric error: {0}")]
    FabricError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Output parse error: {0}")]
    ParseError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("SQL error: {0}")]
    SqlError(#[from] sqlx::Error),
}
