//! Pipeline orchestration
//!
//! Sequences the processing stages, applies the per-source and threshold
//! failure policy, and builds the run metadata handed to the exporters.
//! Publication itself happens outside the orchestrator, only after every
//! gate has passed.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::config::{Config, FailureHandlingConfig};
use crate::errors::{AppError, AppResult};
use crate::models::{PipelineMetadata, ProcessedChannel, RawChannel, SourceType};
use crate::pipeline::stages::{Deduplicator, Enricher, Normalizer, StreamValidator};
use crate::sources::ChannelLoader;

/// Result of a successful pipeline run, ready for the exporters
pub struct PipelineOutcome {
    pub channels: Vec<ProcessedChannel>,
    pub metadata: PipelineMetadata,
}

/// Sequences the processors and enforces the publication gates
pub struct PipelineOrchestrator {
    config: Config,
}

impl PipelineOrchestrator {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run the full pipeline over the given sources
    ///
    /// Fails when a hard-fail source cannot load, when no source yields any
    /// channels, or when the final count misses a hard threshold. Soft
    /// failures are logged and the run continues with what remains.
    pub async fn run(&self, loaders: &[Box<dyn ChannelLoader>]) -> AppResult<PipelineOutcome> {
        let started = Instant::now();
        let processing = &self.config.processing;

        info!("Step 1: Loading channels from sources...");
        let raw_channels = self.load_sources(loaders).await?;
        info!("Loaded {} channels from all sources", raw_channels.len());

        if raw_channels.is_empty() {
            error!("No channels loaded from any source");
            return Err(AppError::NoChannelsLoaded);
        }

        info!("Step 2: Normalizing channels...");
        let normalizer = Normalizer::new(&processing.normalization, &processing.default_country);
        let normalized = normalizer.normalize(raw_channels);
        info!("Normalized {} channels", normalized.len());

        info!("Step 3: Validating streams...");
        let validator = StreamValidator::new(&processing.validation);
        let (validated, dead_streams_removed) = validator.validate(normalized).await;

        info!("Step 4: Deduplicating channels...");
        let deduplicator = Deduplicator::new(&processing.deduplication);
        let (deduplicated, duplicates_merged) = deduplicator.deduplicate(validated);

        info!("Step 5: Enriching channels...");
        let enricher = Enricher::load(
            &self.config.enrichment.flavor_rules_file,
            &self.config.enrichment.category_rules_file,
            &self.config.enrichment.language_rules_file,
        )?;
        let channels = enricher.enrich(deduplicated);

        self.check_threshold(channels.len())?;

        let metadata = build_metadata(
            &channels,
            dead_streams_removed,
            duplicates_merged,
            started.elapsed(),
        );

        info!(
            "Pipeline completed: {} channels, {} merged, {} dead removed, duration={}",
            channels.len(),
            duplicates_merged,
            dead_streams_removed,
            humantime::format_duration(std::time::Duration::from_secs(started.elapsed().as_secs()))
        );

        Ok(PipelineOutcome { channels, metadata })
    }

    /// Load every enabled source, applying the hard/soft failure policy
    async fn load_sources(
        &self,
        loaders: &[Box<dyn ChannelLoader>],
    ) -> AppResult<Vec<RawChannel>> {
        let mut all_channels = Vec::new();

        for loader in loaders {
            if !loader.is_enabled() {
                info!("Source '{}' is disabled, skipping", loader.source_name());
                continue;
            }

            match loader.load().await {
                Ok(channels) => {
                    info!(
                        "Source '{}' contributed {} channels",
                        loader.source_name(),
                        channels.len()
                    );
                    all_channels.extend(channels);
                }
                Err(e) => {
                    if self
                        .config
                        .failure_handling
                        .is_hard_fail(loader.source_name())
                    {
                        error!("Hard-fail source '{}' failed: {}", loader.source_name(), e);
                        return Err(e);
                    }
                    warn!(
                        "Source '{}' failed, continuing without it: {}",
                        loader.source_name(),
                        e
                    );
                }
            }
        }

        Ok(all_channels)
    }

    fn check_threshold(&self, count: usize) -> AppResult<()> {
        let minimum = self.config.output.min_channels;
        if count >= minimum {
            return Ok(());
        }

        if self
            .config
            .failure_handling
            .is_hard_fail(FailureHandlingConfig::THRESHOLD_NOT_MET)
        {
            error!("Channel count {} below threshold {}", count, minimum);
            return Err(AppError::ThresholdNotMet { count, minimum });
        }

        warn!(
            "Channel count {} below threshold {}, publishing anyway",
            count, minimum
        );
        Ok(())
    }
}

/// Build the run summary from the final channel set
fn build_metadata(
    channels: &[ProcessedChannel],
    dead_streams_removed: usize,
    duplicates_merged: usize,
    elapsed: std::time::Duration,
) -> PipelineMetadata {
    let mut by_country = BTreeMap::new();
    let mut by_category = BTreeMap::new();
    let mut by_flavor = BTreeMap::new();
    let mut sources_used: Vec<SourceType> = Vec::new();

    for channel in channels {
        *by_country.entry(channel.country.clone()).or_insert(0) += 1;
        *by_category.entry(channel.category.clone()).or_insert(0) += 1;
        *by_flavor.entry(channel.flavor.clone()).or_insert(0) += 1;
        for source in &channel.sources {
            if !sources_used.contains(source) {
                sources_used.push(*source);
            }
        }
    }

    let now = Utc::now();
    PipelineMetadata {
        version: now.format("%Y.%m.%d").to_string(),
        generated_at: now,
        checksum: String::new(),
        total_channels: channels.len(),
        channels_by_country: by_country,
        channels_by_category: by_category,
        channels_by_flavor: by_flavor,
        sources_used,
        dead_streams_removed,
        duplicates_merged,
        processing_time_seconds: (elapsed.as_secs_f64() * 100.0).round() / 100.0,
    }
}
