//! Shared data model for the channel pipeline
//!
//! Channels move through the pipeline in three shapes: `RawChannel` as
//! reported by a source, `NormalizedChannel` after identity assignment, and
//! `ProcessedChannel` once duplicates have been merged. `PipelineMetadata`
//! summarizes a whole run for the exporters.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Origin of a channel record
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SourceType {
    M3u,
    IptvOrg,
    Custom,
}

/// Outcome of a stream liveness probe
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ValidationStatus {
    Valid,
    Invalid,
    Timeout,
    Skipped,
    Unknown,
}

/// HTTP headers some streams require to play
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelHeaders {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
}

impl ChannelHeaders {
    pub fn is_empty(&self) -> bool {
        self.user_agent.is_none() && self.referrer.is_none()
    }
}

/// One channel record as reported by a source, before normalization
///
/// Immutable once constructed; the loader that built it hands it by value
/// to the normalizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawChannel {
    pub name: String,
    pub stream_url: String,
    pub source: SourceType,
    pub tvg_id: Option<String>,
    pub tvg_name: Option<String>,
    pub tvg_logo: Option<String>,
    pub group_title: Option<String>,
    pub country: Option<String>,
    pub language: Option<String>,
    pub headers: Option<ChannelHeaders>,
    /// Source-specific attributes, keyed in snake_case
    #[serde(default)]
    pub extra_attrs: HashMap<String, serde_json::Value>,
}

impl RawChannel {
    /// Minimal record with only the required fields set
    pub fn new<N: Into<String>, U: Into<String>>(name: N, stream_url: U, source: SourceType) -> Self {
        Self {
            name: name.into(),
            stream_url: stream_url.into(),
            source,
            tvg_id: None,
            tvg_name: None,
            tvg_logo: None,
            group_title: None,
            country: None,
            language: None,
            headers: None,
            extra_attrs: HashMap::new(),
        }
    }
}

/// Canonical per-channel record after identity assignment
///
/// The validator writes `validation_status` and the deduplicator fills
/// logo/alt-name/quality fields during merge; nothing mutates the record
/// after that.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedChannel {
    pub id: String,
    pub name: String,
    /// Lowercased, symbol- and suffix-stripped name used only for matching
    pub normalized_name: String,
    pub stream_url: String,
    pub source: SourceType,
    pub logo_url: Option<String>,
    pub category: String,
    /// 2-letter upper-case country code
    pub country: String,
    /// 2-letter lower-case language code
    pub language: String,
    pub flavor: String,
    pub group: String,
    /// Alternate stream URLs keyed by quality label
    #[serde(default)]
    pub quality_urls: HashMap<String, String>,
    #[serde(default)]
    pub alt_names: Vec<String>,
    pub headers: Option<ChannelHeaders>,
    pub validation_status: ValidationStatus,
    #[serde(default)]
    pub extra_attrs: HashMap<String, serde_json::Value>,
}

impl NormalizedChannel {
    /// Duplicate-detection identity: two records are the same channel iff
    /// their composite keys are equal, regardless of display name or source.
    pub fn composite_key(&self) -> String {
        format!(
            "{}:{}:{}",
            self.normalized_name, self.country, self.language
        )
        .to_lowercase()
    }
}

/// Final export-ready channel record
///
/// Created once per identity group by the deduplicator. The enricher may
/// rewrite `flavor`, `category` and `language` in place; everything else is
/// immutable after the merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedChannel {
    pub id: String,
    pub name: String,
    pub stream_url: String,
    pub logo_url: Option<String>,
    pub category: String,
    pub country: String,
    /// Primary language code
    pub language: String,
    pub flavor: String,
    pub group: String,
    pub quality_urls: HashMap<String, String>,
    pub alt_names: Vec<String>,
    pub headers: Option<ChannelHeaders>,
    /// Source tags that contributed to this channel after deduplication
    pub sources: Vec<SourceType>,
}

/// Run-level summary built by the orchestrator after all stages complete
///
/// Written by the exporters, never read back by the pipeline. Breakdown
/// maps use `BTreeMap` so serialized output is stable across runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineMetadata {
    pub version: String,
    pub generated_at: DateTime<Utc>,
    /// Content checksum over the serialized channel list; filled in by the
    /// JSON exporter
    pub checksum: String,
    pub total_channels: usize,
    pub channels_by_country: std::collections::BTreeMap<String, usize>,
    pub channels_by_category: std::collections::BTreeMap<String, usize>,
    pub channels_by_flavor: std::collections::BTreeMap<String, usize>,
    pub sources_used: Vec<SourceType>,
    pub dead_streams_removed: usize,
    pub duplicates_merged: usize,
    pub processing_time_seconds: f64,
}
