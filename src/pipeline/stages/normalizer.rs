//! Channel name normalization and identity assignment
//!
//! Turns raw per-source records into the canonical shape: a matching name
//! stripped of noise, a stable id, and derived locale/category fields with
//! documented fallback chains.

use regex::Regex;
use tracing::warn;

use crate::config::NormalizationConfig;
use crate::errors::{AppError, AppResult};
use crate::models::{NormalizedChannel, RawChannel, ValidationStatus};
use crate::utils::short_content_hash;

/// Normalizes channel names and generates stable IDs
pub struct Normalizer {
    config: NormalizationConfig,
    default_country: String,
    symbol_pattern: Regex,
    whitespace_pattern: Regex,
    suffix_patterns: Vec<Regex>,
}

impl Normalizer {
    pub fn new(config: &NormalizationConfig, default_country: &str) -> Self {
        // A suffix only matches at end-of-string when preceded by a
        // space/underscore/hyphen or string start, so names like "Hdfc"
        // never lose an embedded "hd".
        let suffix_patterns = config
            .remove_suffixes
            .iter()
            .filter_map(|suffix| {
                Regex::new(&format!(r"(?i)(?:^|[\s_-]){}$", regex::escape(suffix))).ok()
            })
            .collect();

        Self {
            config: config.clone(),
            default_country: default_country.to_string(),
            symbol_pattern: Regex::new(r"[^\w\s]").unwrap(),
            whitespace_pattern: Regex::new(r"\s+").unwrap(),
            suffix_patterns,
        }
    }

    /// Normalize a batch of raw channels
    ///
    /// Best-effort: a record that fails normalization is logged and
    /// dropped, never aborting the batch.
    pub fn normalize(&self, channels: Vec<RawChannel>) -> Vec<NormalizedChannel> {
        let mut normalized = Vec::with_capacity(channels.len());
        for channel in channels {
            let name = channel.name.clone();
            match self.normalize_channel(channel) {
                Ok(result) => normalized.push(result),
                Err(e) => warn!("Failed to normalize channel '{}': {}", name, e),
            }
        }
        normalized
    }

    fn normalize_channel(&self, channel: RawChannel) -> AppResult<NormalizedChannel> {
        if channel.stream_url.trim().is_empty() {
            return Err(AppError::internal("record has no stream URL"));
        }

        let matching_name = channel.tvg_name.as_deref().unwrap_or(&channel.name);
        let normalized_name = self.normalize_name(matching_name);
        if normalized_name.is_empty() && channel.name.trim().is_empty() {
            return Err(AppError::internal("record has no usable name"));
        }

        let id = self.assign_id(&normalized_name, &channel);
        let country = self.extract_country(&channel);
        let language = extract_language(&channel);
        let category = extract_category(&channel);
        let quality_urls = extract_quality_urls(&channel);

        Ok(NormalizedChannel {
            id,
            name: channel.name,
            normalized_name,
            stream_url: channel.stream_url,
            source: channel.source,
            logo_url: channel.tvg_logo,
            category,
            country,
            language,
            flavor: "general".to_string(),
            group: channel
                .group_title
                .unwrap_or_else(|| "Uncategorized".to_string()),
            quality_urls,
            alt_names: Vec::new(),
            headers: channel.headers,
            validation_status: ValidationStatus::Unknown,
            extra_attrs: channel.extra_attrs,
        })
    }

    /// Run the configured name pipeline: lowercase, strip symbols, collapse
    /// whitespace, strip trailing suffixes
    pub fn normalize_name(&self, name: &str) -> String {
        let mut result = name.to_string();

        if self.config.lowercase {
            result = result.to_lowercase();
        }

        if self.config.strip_symbols {
            result = self.symbol_pattern.replace_all(&result, "").into_owned();
        }

        if self.config.collapse_whitespace {
            result = self
                .whitespace_pattern
                .replace_all(result.trim(), " ")
                .into_owned();
        }

        for pattern in &self.suffix_patterns {
            result = pattern.replace(&result, "").into_owned();
        }

        result.trim().to_string()
    }

    /// Reuse the source-supplied stable id when present for cross-run
    /// stability; otherwise derive a 12-hex content hash.
    fn assign_id(&self, normalized_name: &str, channel: &RawChannel) -> String {
        if let Some(tvg_id) = &channel.tvg_id {
            if !tvg_id.is_empty() {
                return tvg_id.clone();
            }
        }
        short_content_hash(&format!("{}:{}", normalized_name, channel.source))
    }

    fn extract_country(&self, channel: &RawChannel) -> String {
        if let Some(country) = &channel.country {
            if !country.is_empty() {
                return truncate(country, 2).to_uppercase();
            }
        }

        if let Some(value) = channel.extra_attrs.get("tvg_country") {
            if let Some(country) = value.as_str() {
                if !country.is_empty() {
                    return truncate(country, 2).to_uppercase();
                }
            }
        }

        self.default_country.clone()
    }
}

fn extract_language(channel: &RawChannel) -> String {
    if let Some(language) = &channel.language {
        // Take the first language when the source lists several
        let first = language.split(',').next().unwrap_or("").trim();
        if !first.is_empty() {
            return truncate(first, 2).to_lowercase();
        }
    }

    if let Some(languages) = channel
        .extra_attrs
        .get("languages")
        .and_then(|v| v.as_array())
    {
        if let Some(first) = languages.first().and_then(|v| v.as_str()) {
            if !first.is_empty() {
                return truncate(first, 2).to_lowercase();
            }
        }
    }

    "en".to_string()
}

fn extract_category(channel: &RawChannel) -> String {
    if let Some(categories) = channel
        .extra_attrs
        .get("categories")
        .and_then(|v| v.as_array())
    {
        if let Some(first) = categories.first().and_then(|v| v.as_str()) {
            if !first.is_empty() {
                return first.to_lowercase();
            }
        }
    }

    if let Some(group) = &channel.group_title {
        if !group.is_empty() {
            return group.to_lowercase();
        }
    }

    "general".to_string()
}

/// Lift loader-provided quality variants out of the extra attributes
fn extract_quality_urls(channel: &RawChannel) -> std::collections::HashMap<String, String> {
    channel
        .extra_attrs
        .get("quality_urls")
        .and_then(|v| v.as_object())
        .map(|map| {
            map.iter()
                .filter_map(|(quality, url)| {
                    url.as_str().map(|u| (quality.clone(), u.to_string()))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn truncate(value: &str, max_chars: usize) -> &str {
    match value.char_indices().nth(max_chars) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}
