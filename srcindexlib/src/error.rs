//! Error types for srcindexlib

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort an indexing run.
///
/// Only configuration and resource problems are fatal. Per-file problems
/// (unresolvable patterns, vanished files, extraction failures) are recorded
/// as diagnostics in the [`RunContext`](crate::context::RunContext) instead.
#[derive(Error, Debug)]
pub enum IndexError {
    /// Malformed or contradictory settings, reported before any extraction
    #[error("configuration error: {0}")]
    Config(String),

    /// A required path (include root, cache root, CSV) cannot be accessed
    #[error("{message}: {source}")]
    Resource {
        message: String,
        source: std::io::Error,
    },

    /// Invalid glob pattern
    #[error("invalid glob pattern '{pattern}': {message}")]
    InvalidGlob { pattern: String, message: String },

    /// Path does not exist
    #[error("path does not exist: {0}")]
    PathNotFound(PathBuf),

    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A project descriptor could not be parsed
    #[error("invalid project descriptor '{path}': {message}")]
    Descriptor { path: PathBuf, message: String },

    /// The compiler backing project sessions is missing or broken
    #[error("project host unavailable: {0}")]
    HostUnavailable(String),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl IndexError {
    /// Build a resource error from an IO failure.
    pub fn resource(message: impl Into<String>, source: std::io::Error) -> Self {
        IndexError::Resource {
            message: message.into(),
            source,
        }
    }

    /// Whether this error belongs to the configuration class.
    pub fn is_config(&self) -> bool {
        matches!(self, IndexError::Config(_) | IndexError::InvalidGlob { .. })
    }
}
