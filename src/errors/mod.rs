//! Error handling for the channel pipeline
//!
//! Re-exports the error types and provides the `AppResult` alias used
//! throughout the crate.

pub mod types;

pub use types::{AppError, ExportError, SourceError};

/// Convenience result type used across the application
pub type AppResult<T> = Result<T, AppError>;
