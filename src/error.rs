//! Error types for Inkforge
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for Inkforge operations
///
/// Capability failures (generation, refinement, analysis) surface as
/// `Provider`; persistence failures as `Storage` or `Artifact`.
#[derive(Error, Debug)]
pub enum InkforgeError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Missing credentials for a required capability
    #[error("Missing credentials for provider: {0}")]
    MissingCredentials(String),

    /// Provider-related errors (API calls, authentication, content policy, etc.)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Session store errors (database operations, unrecognized stored values)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Image artifact errors (writing or reading generated bytes)
    #[error("Artifact error: {0}")]
    Artifact(String),

    /// A generation request was submitted with no text
    #[error("Request text cannot be empty")]
    EmptyRequest,

    /// A generation is already outstanding for the session
    #[error("A generation request is already in progress for session {0}")]
    GenerationInFlight(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for Inkforge operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
