//! Error type definitions for the channel pipeline
//!
//! This module defines all error types used throughout the application,
//! providing a hierarchical error system that makes debugging and error
//! handling more straightforward.

use thiserror::Error;

/// Top-level application error type
///
/// This enum represents all possible errors that can occur in the application.
/// It uses `thiserror` to provide automatic error trait implementations and
/// proper error chaining.
#[derive(Error, Debug)]
pub enum AppError {
    /// Source loading errors
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Export errors
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// No source yielded any channels; there is nothing to publish
    #[error("No channels loaded from any source")]
    NoChannelsLoaded,

    /// Final channel count fell below the configured minimum
    #[error("Channel count {count} below minimum threshold {minimum}")]
    ThresholdNotMet { count: usize, minimum: usize },

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Source loading specific errors
///
/// Every variant carries the source name so the orchestrator can match the
/// failing source against the configured hard-fail set.
#[derive(Error, Debug)]
pub enum SourceError {
    /// Fetch failures (network, HTTP status, timeouts)
    #[error("Fetch failed for source '{source_name}': {message}")]
    FetchFailed {
        source_name: String,
        message: String,
    },

    /// Parse errors for source payloads
    #[error("Parse error for source '{source_name}': {message}")]
    ParseError {
        source_name: String,
        message: String,
    },

    /// Invalid source configuration
    #[error("Invalid configuration for source '{source_name}': {message}")]
    InvalidConfig {
        source_name: String,
        message: String,
    },
}

impl SourceError {
    /// Name of the source that failed
    pub fn source_name(&self) -> &str {
        match self {
            Self::FetchFailed { source_name, .. }
            | Self::ParseError { source_name, .. }
            | Self::InvalidConfig { source_name, .. } => source_name,
        }
    }

    /// Create a fetch failure error
    pub fn fetch_failed<S: Into<String>, M: Into<String>>(source: S, message: M) -> Self {
        Self::FetchFailed {
            source_name: source.into(),
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse_error<S: Into<String>, M: Into<String>>(source: S, message: M) -> Self {
        Self::ParseError {
            source_name: source.into(),
            message: message.into(),
        }
    }
}

/// Export specific errors
#[derive(Error, Debug)]
pub enum ExportError {
    /// Output file write failures
    #[error("Write failed: {path}: {message}")]
    WriteFailed { path: String, message: String },

    /// Serialization failures
    #[error("Serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

impl AppError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
