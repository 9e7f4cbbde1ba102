//! Channel deduplication
//!
//! Groups validated channels by composite key and merges each group into a
//! single export-ready record according to the configured source priority.

use std::collections::HashMap;

use tracing::info;

use crate::config::DeduplicationConfig;
use crate::models::{NormalizedChannel, ProcessedChannel, SourceType};

/// Merges duplicate channels detected by composite key matching
pub struct Deduplicator {
    config: DeduplicationConfig,
    priority_ranks: HashMap<SourceType, usize>,
}

/// Rank assigned to sources missing from the configured priority order
const UNRANKED: usize = usize::MAX;

impl Deduplicator {
    pub fn new(config: &DeduplicationConfig) -> Self {
        let priority_ranks = config
            .priority_order
            .iter()
            .enumerate()
            .map(|(rank, source)| (*source, rank))
            .collect();

        Self {
            config: config.clone(),
            priority_ranks,
        }
    }

    /// Deduplicate channels, returning the merged list and the number of
    /// records absorbed into merges
    ///
    /// Passthrough (1:1 conversion, no merge) when disabled. Output keeps
    /// first-seen group order so repeated runs are deterministic.
    pub fn deduplicate(
        &self,
        channels: Vec<NormalizedChannel>,
    ) -> (Vec<ProcessedChannel>, usize) {
        if !self.config.enabled {
            info!("Deduplication is disabled");
            return (channels.into_iter().map(to_processed).collect(), 0);
        }

        // Group by composite key, preserving first-seen order
        let mut groups: HashMap<String, Vec<NormalizedChannel>> = HashMap::new();
        let mut key_order: Vec<String> = Vec::new();
        for channel in channels {
            let key = channel.composite_key();
            let group = groups.entry(key.clone()).or_default();
            if group.is_empty() {
                key_order.push(key);
            }
            group.push(channel);
        }

        let mut result = Vec::with_capacity(key_order.len());
        let mut duplicates_merged = 0usize;

        for key in &key_order {
            let group = groups.remove(key).unwrap_or_default();
            if group.len() == 1 {
                result.extend(group.into_iter().map(to_processed));
            } else {
                duplicates_merged += group.len() - 1;
                result.push(self.merge_group(group));
            }
        }

        info!(
            "Deduplication complete: {} unique channels, {} duplicates merged",
            result.len(),
            duplicates_merged
        );
        (result, duplicates_merged)
    }

    /// Merge a group of duplicates into one record
    ///
    /// The highest-priority record is the base for all scalar fields; the
    /// rest of the group contributes sources, alternate names, a logo when
    /// the base has none, and quality variants (first writer wins per label
    /// in priority order).
    fn merge_group(&self, mut group: Vec<NormalizedChannel>) -> ProcessedChannel {
        group.sort_by_key(|channel| self.source_rank(channel.source));

        let mut alt_names: Vec<String> = Vec::new();
        let mut sources: Vec<SourceType> = Vec::new();
        let mut logo_url = group[0].logo_url.clone();
        let mut quality_urls = HashMap::new();

        for channel in &group {
            if !sources.contains(&channel.source) {
                sources.push(channel.source);
            }

            if channel.name != group[0].name && !alt_names.contains(&channel.name) {
                alt_names.push(channel.name.clone());
            }

            if logo_url.is_none() && channel.logo_url.is_some() {
                logo_url = channel.logo_url.clone();
            }

            for (quality, url) in &channel.quality_urls {
                quality_urls
                    .entry(quality.clone())
                    .or_insert_with(|| url.clone());
            }
        }

        let base = group.swap_remove(0);
        let extra_alt_names: Vec<_> = base
            .alt_names
            .iter()
            .filter(|name| !alt_names.contains(name))
            .cloned()
            .collect();
        alt_names.extend(extra_alt_names);

        ProcessedChannel {
            id: base.id,
            name: base.name,
            stream_url: base.stream_url,
            logo_url,
            category: base.category,
            country: base.country,
            language: base.language,
            flavor: base.flavor,
            group: base.group,
            quality_urls,
            alt_names,
            headers: base.headers,
            sources,
        }
    }

    fn source_rank(&self, source: SourceType) -> usize {
        self.priority_ranks.get(&source).copied().unwrap_or(UNRANKED)
    }
}

fn to_processed(channel: NormalizedChannel) -> ProcessedChannel {
    ProcessedChannel {
        id: channel.id,
        name: channel.name,
        stream_url: channel.stream_url,
        logo_url: channel.logo_url,
        category: channel.category,
        country: channel.country,
        language: channel.language,
        flavor: channel.flavor,
        group: channel.group,
        quality_urls: channel.quality_urls,
        alt_names: channel.alt_names,
        headers: channel.headers,
        sources: vec![channel.source],
    }
}
