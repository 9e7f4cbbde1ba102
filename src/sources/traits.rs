//! Source loader trait definitions
//!
//! The loader abstraction is a small capability interface: the pipeline
//! only needs to ask a source for its records, its identity, and whether it
//! participates in this run. Concrete loaders own all fetch/parse details.

use async_trait::async_trait;

use crate::errors::AppResult;
use crate::models::{RawChannel, SourceType};

/// A source of raw channel records
///
/// Loaders signal a load failure as a `SourceError` carrying the source
/// name; they never fail the batch for individual malformed records (those
/// are skipped internally).
#[async_trait]
pub trait ChannelLoader: Send + Sync {
    /// Source tag stamped on every record this loader produces
    fn source_type(&self) -> SourceType;

    /// Human-readable source name, also matched against the hard-fail set
    fn source_name(&self) -> &str;

    /// Whether this loader participates in the current run
    fn is_enabled(&self) -> bool;

    /// Loader priority; lower values load first
    fn priority(&self) -> u32;

    /// Load all channels from this source
    async fn load(&self) -> AppResult<Vec<RawChannel>>;
}
