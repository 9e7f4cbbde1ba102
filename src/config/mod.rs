//! Application configuration
//!
//! Nested, partially-defaulted TOML configuration. Every processor receives
//! its config section by reference at construction time; nothing reads
//! configuration from global state.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

use crate::models::SourceType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub failure_handling: FailureHandlingConfig,
}

/// Per-source loader configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub m3u: Option<M3uSourceConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iptv_org: Option<IptvOrgSourceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct M3uSourceConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_m3u_priority")]
    pub priority: u32,
    /// Playlist URLs fetched in order
    #[serde(default)]
    pub urls: Vec<M3uUrlEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct M3uUrlEntry {
    pub name: String,
    pub url: String,
    #[serde(default = "default_m3u_timeout_seconds")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IptvOrgSourceConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_iptv_org_priority")]
    pub priority: u32,
    #[serde(default = "default_iptv_org_base_url")]
    pub base_url: String,
    #[serde(default = "default_iptv_org_timeout_seconds")]
    pub timeout_seconds: u64,
}

/// Processing stage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Countries to keep when a source carries a worldwide catalog
    #[serde(default = "default_target_countries")]
    pub target_countries: Vec<String>,
    /// Country assigned when a record carries no locale information
    #[serde(default = "default_country")]
    pub default_country: String,
    #[serde(default)]
    pub normalization: NormalizationConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub deduplication: DeduplicationConfig,
}

/// Name normalization configuration
///
/// Each step of the name pipeline can be toggled independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizationConfig {
    #[serde(default = "default_enabled")]
    pub lowercase: bool,
    #[serde(default = "default_enabled")]
    pub strip_symbols: bool,
    #[serde(default = "default_enabled")]
    pub collapse_whitespace: bool,
    /// Trailing suffixes stripped from names, applied in list order.
    /// A suffix only matches at end-of-string when preceded by a space,
    /// underscore, hyphen, or string start.
    #[serde(default = "default_remove_suffixes")]
    pub remove_suffixes: Vec<String>,
}

/// Stream validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Per-probe timeout
    #[serde(default = "default_probe_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Maximum in-flight probes
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Retry a timed-out probe exactly once
    #[serde(default = "default_enabled")]
    pub retry_once: bool,
    /// Response statuses treated as alive
    #[serde(default = "default_accept_status_codes")]
    pub accept_status_codes: Vec<u16>,
    /// Statuses accepted even though the probe was rejected; some origins
    /// refuse HEAD but serve real players
    #[serde(default = "default_conditional_accept")]
    pub conditional_accept: Vec<u16>,
    /// Glob patterns for URLs that are trusted without a network call
    #[serde(default)]
    pub skip_patterns: Vec<String>,
}

/// Deduplication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeduplicationConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Sources in descending priority; the first listed source wins merges.
    /// Unlisted sources rank last.
    #[serde(default = "default_priority_order")]
    pub priority_order: Vec<SourceType>,
}

/// Enrichment rule table locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    #[serde(default = "default_flavor_rules_file")]
    pub flavor_rules_file: PathBuf,
    #[serde(default = "default_category_rules_file")]
    pub category_rules_file: PathBuf,
    #[serde(default = "default_language_rules_file")]
    pub language_rules_file: PathBuf,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_json_filename")]
    pub json_filename: String,
    #[serde(default = "default_m3u_filename")]
    pub m3u_filename: String,
    /// Formats written in addition to the primary JSON output
    #[serde(default = "default_secondary_formats")]
    pub secondary_formats: Vec<String>,
    /// Sort channels deterministically before export
    #[serde(default = "default_enabled")]
    pub sorted_output: bool,
    /// Field tuple used for sorting
    #[serde(default = "default_sort_by")]
    pub sort_by: Vec<String>,
    /// Write compact JSON instead of pretty-printed
    #[serde(default)]
    pub minify_json: bool,
    /// Minimum channel count required before output is published
    #[serde(default = "default_min_channels")]
    pub min_channels: usize,
}

/// Failure escalation configuration
///
/// `hard_fail` names the conditions that abort a run: source names (a load
/// failure of that source is fatal) and the `threshold_not_met` sentinel
/// (the minimum-channel gate is fatal).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureHandlingConfig {
    #[serde(default = "default_hard_fail")]
    pub hard_fail: Vec<String>,
}

impl FailureHandlingConfig {
    /// Marker used to make the minimum-channel threshold fatal
    pub const THRESHOLD_NOT_MET: &'static str = "threshold_not_met";

    pub fn is_hard_fail(&self, condition: &str) -> bool {
        self.hard_fail.iter().any(|entry| entry == condition)
    }
}

fn default_environment() -> String {
    "production".to_string()
}

fn default_enabled() -> bool {
    true
}

fn default_m3u_priority() -> u32 {
    1
}

fn default_m3u_timeout_seconds() -> u64 {
    30
}

fn default_iptv_org_priority() -> u32 {
    2
}

fn default_iptv_org_base_url() -> String {
    "https://iptv-org.github.io/api".to_string()
}

fn default_iptv_org_timeout_seconds() -> u64 {
    60
}

fn default_target_countries() -> Vec<String> {
    vec!["IN".to_string(), "US".to_string(), "GB".to_string()]
}

fn default_country() -> String {
    "IN".to_string()
}

fn default_remove_suffixes() -> Vec<String> {
    [
        // quality
        "hd", "fhd", "uhd", "4k", "8k", "1080p", "720p", "sd",
        // region
        "india", "us", "uk",
        // feed
        "live", "stream", "tv", "channel",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_probe_timeout_seconds() -> u64 {
    5
}

fn default_max_concurrent() -> usize {
    50
}

fn default_accept_status_codes() -> Vec<u16> {
    vec![200, 302, 303, 307, 308]
}

fn default_conditional_accept() -> Vec<u16> {
    vec![403]
}

fn default_priority_order() -> Vec<SourceType> {
    vec![SourceType::M3u, SourceType::IptvOrg, SourceType::Custom]
}

fn default_flavor_rules_file() -> PathBuf {
    PathBuf::from("rules/flavor_rules.json")
}

fn default_category_rules_file() -> PathBuf {
    PathBuf::from("rules/category_rules.json")
}

fn default_language_rules_file() -> PathBuf {
    PathBuf::from("rules/language_rules.json")
}

fn default_output_directory() -> PathBuf {
    PathBuf::from("output")
}

fn default_json_filename() -> String {
    "iptv_channels.json".to_string()
}

fn default_m3u_filename() -> String {
    "iptv_channels.m3u".to_string()
}

fn default_secondary_formats() -> Vec<String> {
    vec!["m3u".to_string()]
}

fn default_sort_by() -> Vec<String> {
    vec![
        "country".to_string(),
        "category".to_string(),
        "name".to_string(),
    ]
}

fn default_min_channels() -> usize {
    100
}

fn default_hard_fail() -> Vec<String> {
    vec![
        "m3u".to_string(),
        FailureHandlingConfig::THRESHOLD_NOT_MET.to_string(),
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            sources: SourcesConfig::default(),
            processing: ProcessingConfig::default(),
            enrichment: EnrichmentConfig::default(),
            output: OutputConfig::default(),
            failure_handling: FailureHandlingConfig::default(),
        }
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            target_countries: default_target_countries(),
            default_country: default_country(),
            normalization: NormalizationConfig::default(),
            validation: ValidationConfig::default(),
            deduplication: DeduplicationConfig::default(),
        }
    }
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            lowercase: true,
            strip_symbols: true,
            collapse_whitespace: true,
            remove_suffixes: default_remove_suffixes(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_seconds: default_probe_timeout_seconds(),
            max_concurrent: default_max_concurrent(),
            retry_once: true,
            accept_status_codes: default_accept_status_codes(),
            conditional_accept: default_conditional_accept(),
            skip_patterns: Vec::new(),
        }
    }
}

impl Default for DeduplicationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            priority_order: default_priority_order(),
        }
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            flavor_rules_file: default_flavor_rules_file(),
            category_rules_file: default_category_rules_file(),
            language_rules_file: default_language_rules_file(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
            json_filename: default_json_filename(),
            m3u_filename: default_m3u_filename(),
            secondary_formats: default_secondary_formats(),
            sorted_output: true,
            sort_by: default_sort_by(),
            minify_json: false,
            min_channels: default_min_channels(),
        }
    }
}

impl Default for FailureHandlingConfig {
    fn default() -> Self {
        Self {
            hard_fail: default_hard_fail(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from_file(&config_file)
    }

    pub fn load_from_file(config_file: &str) -> Result<Self> {
        if std::path::Path::new(&config_file).exists() {
            let contents = std::fs::read_to_string(config_file)?;
            Ok(toml::from_str(&contents)?)
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::write(config_file, contents)?;
            info!("Created default config file: {}", config_file);
            Ok(default_config)
        }
    }
}
