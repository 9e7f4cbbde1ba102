//! End-to-end pipeline tests with in-memory sources
//!
//! Exercises the orchestrator's stage sequencing, failure policy, and
//! metadata reporting without touching the network: stream validation is
//! disabled and sources are static fixtures.

use async_trait::async_trait;
use tempfile::TempDir;

use iptv_sanity::config::Config;
use iptv_sanity::errors::{AppError, AppResult, SourceError};
use iptv_sanity::exporters::JsonExporter;
use iptv_sanity::models::{RawChannel, SourceType};
use iptv_sanity::pipeline::PipelineOrchestrator;
use iptv_sanity::sources::ChannelLoader;

/// Fixed-content source used in place of the network loaders
struct StaticSource {
    name: &'static str,
    source: SourceType,
    priority: u32,
    channels: Vec<RawChannel>,
    fail: bool,
}

impl StaticSource {
    fn new(name: &'static str, source: SourceType, priority: u32, channels: Vec<RawChannel>) -> Self {
        Self {
            name,
            source,
            priority,
            channels,
            fail: false,
        }
    }

    fn failing(name: &'static str, source: SourceType, priority: u32) -> Self {
        Self {
            name,
            source,
            priority,
            channels: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl ChannelLoader for StaticSource {
    fn source_type(&self) -> SourceType {
        self.source
    }

    fn source_name(&self) -> &str {
        self.name
    }

    fn is_enabled(&self) -> bool {
        true
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    async fn load(&self) -> AppResult<Vec<RawChannel>> {
        if self.fail {
            return Err(SourceError::fetch_failed(self.name, "connection refused").into());
        }
        Ok(self.channels.clone())
    }
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.processing.validation.enabled = false;
    config.output.min_channels = 1;
    config
}

fn m3u_channel(name: &str, url: &str, country: &str, language: &str) -> RawChannel {
    let mut channel = RawChannel::new(name, url, SourceType::M3u);
    channel.country = Some(country.to_string());
    channel.language = Some(language.to_string());
    channel
}

fn catalog_channel(
    name: &str,
    url: &str,
    country: &str,
    language: &str,
    logo: Option<&str>,
) -> RawChannel {
    let mut channel = RawChannel::new(name, url, SourceType::IptvOrg);
    channel.country = Some(country.to_string());
    channel.language = Some(language.to_string());
    channel.tvg_logo = logo.map(|s| s.to_string());
    channel
}

fn loaders(sources: Vec<StaticSource>) -> Vec<Box<dyn ChannelLoader>> {
    sources
        .into_iter()
        .map(|s| Box::new(s) as Box<dyn ChannelLoader>)
        .collect()
}

#[tokio::test]
async fn duplicates_across_sources_merge_with_priority() {
    let m3u = StaticSource::new(
        "m3u",
        SourceType::M3u,
        1,
        vec![m3u_channel(
            "Star Plus HD",
            "http://streams.test/star-m3u.m3u8",
            "IN",
            "hi",
        )],
    );
    let catalog = StaticSource::new(
        "iptv_org",
        SourceType::IptvOrg,
        2,
        vec![catalog_channel(
            "Star Plus India",
            "http://streams.test/star-catalog.m3u8",
            "IN",
            "hin",
            Some("https://logos.test/star.png"),
        )],
    );

    let orchestrator = PipelineOrchestrator::new(test_config());
    let outcome = orchestrator
        .run(&loaders(vec![m3u, catalog]))
        .await
        .unwrap();

    assert_eq!(outcome.channels.len(), 1);
    let merged = &outcome.channels[0];
    // m3u is the configured priority source: its name and URL win
    assert_eq!(merged.name, "Star Plus HD");
    assert_eq!(merged.stream_url, "http://streams.test/star-m3u.m3u8");
    // the missing logo is backfilled from the catalog record
    assert_eq!(merged.logo_url.as_deref(), Some("https://logos.test/star.png"));
    assert_eq!(merged.alt_names, vec!["Star Plus India".to_string()]);
    assert!(merged.sources.contains(&SourceType::M3u));
    assert!(merged.sources.contains(&SourceType::IptvOrg));

    assert_eq!(outcome.metadata.total_channels, 1);
    assert_eq!(outcome.metadata.duplicates_merged, 1);
    assert_eq!(outcome.metadata.dead_streams_removed, 0);
}

#[tokio::test]
async fn same_name_different_locale_never_merges() {
    let m3u = StaticSource::new(
        "m3u",
        SourceType::M3u,
        1,
        vec![
            m3u_channel("MTV", "http://streams.test/mtv-in.m3u8", "IN", "hi"),
            m3u_channel("MTV", "http://streams.test/mtv-us.m3u8", "US", "en"),
        ],
    );

    let orchestrator = PipelineOrchestrator::new(test_config());
    let outcome = orchestrator.run(&loaders(vec![m3u])).await.unwrap();

    assert_eq!(outcome.channels.len(), 2);
    assert_eq!(outcome.metadata.duplicates_merged, 0);
}

#[tokio::test]
async fn enrichment_assigns_tags_from_shipped_rules() {
    let m3u = StaticSource::new(
        "m3u",
        SourceType::M3u,
        1,
        vec![
            m3u_channel("9XM", "http://streams.test/9xm.m3u8", "IN", "hi"),
            m3u_channel("Star Sports 1", "http://streams.test/ss1.m3u8", "IN", "en"),
        ],
    );

    let orchestrator = PipelineOrchestrator::new(test_config());
    let outcome = orchestrator.run(&loaders(vec![m3u])).await.unwrap();

    let by_name = |name: &str| {
        outcome
            .channels
            .iter()
            .find(|c| c.name == name)
            .unwrap_or_else(|| panic!("missing channel {name}"))
    };
    assert_eq!(by_name("9XM").flavor, "hindiMusic");
    assert_eq!(by_name("Star Sports 1").flavor, "sports");
    assert_eq!(by_name("Star Sports 1").category, "sports");
}

#[tokio::test]
async fn threshold_hard_fail_aborts_before_export() {
    let mut config = test_config();
    config.output.min_channels = 100;
    // "threshold_not_met" is in the default hard-fail set

    let m3u = StaticSource::new(
        "m3u",
        SourceType::M3u,
        1,
        (0..80)
            .map(|i| {
                m3u_channel(
                    &format!("Channel {i}"),
                    &format!("http://streams.test/{i}.m3u8"),
                    "IN",
                    "en",
                )
            })
            .collect(),
    );

    let orchestrator = PipelineOrchestrator::new(config);
    let result = orchestrator.run(&loaders(vec![m3u])).await;

    match result {
        Err(AppError::ThresholdNotMet { count, minimum }) => {
            assert_eq!(count, 80);
            assert_eq!(minimum, 100);
        }
        other => panic!("expected threshold failure, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn threshold_soft_fail_publishes_with_warning() {
    let mut config = test_config();
    config.output.min_channels = 100;
    config.failure_handling.hard_fail = vec!["m3u".to_string()];

    let m3u = StaticSource::new(
        "m3u",
        SourceType::M3u,
        1,
        vec![m3u_channel("Solo", "http://streams.test/solo.m3u8", "IN", "en")],
    );

    let orchestrator = PipelineOrchestrator::new(config);
    let outcome = orchestrator.run(&loaders(vec![m3u])).await.unwrap();

    assert_eq!(outcome.channels.len(), 1);
}

#[tokio::test]
async fn hard_fail_source_aborts_the_run() {
    let m3u = StaticSource::failing("m3u", SourceType::M3u, 1);
    let catalog = StaticSource::new(
        "iptv_org",
        SourceType::IptvOrg,
        2,
        vec![catalog_channel(
            "NDTV",
            "http://streams.test/ndtv.m3u8",
            "IN",
            "en",
            None,
        )],
    );

    let orchestrator = PipelineOrchestrator::new(test_config());
    let result = orchestrator.run(&loaders(vec![m3u, catalog])).await;

    assert!(matches!(result, Err(AppError::Source(_))));
}

#[tokio::test]
async fn soft_fail_source_degrades_to_remaining_sources() {
    let catalog = StaticSource::failing("iptv_org", SourceType::IptvOrg, 2);
    let m3u = StaticSource::new(
        "m3u",
        SourceType::M3u,
        1,
        vec![m3u_channel("Solo", "http://streams.test/solo.m3u8", "IN", "en")],
    );

    let orchestrator = PipelineOrchestrator::new(test_config());
    let outcome = orchestrator.run(&loaders(vec![m3u, catalog])).await.unwrap();

    assert_eq!(outcome.channels.len(), 1);
    assert_eq!(outcome.metadata.sources_used, vec![SourceType::M3u]);
}

#[tokio::test]
async fn zero_loaded_channels_is_always_fatal() {
    let m3u = StaticSource::new("m3u", SourceType::M3u, 1, Vec::new());

    let orchestrator = PipelineOrchestrator::new(test_config());
    let result = orchestrator.run(&loaders(vec![m3u])).await;

    assert!(matches!(result, Err(AppError::NoChannelsLoaded)));
}

#[tokio::test]
async fn identical_inputs_yield_identical_output_and_checksum() {
    let dir = TempDir::new().unwrap();
    let config = test_config();

    let make_sources = || {
        loaders(vec![
            StaticSource::new(
                "m3u",
                SourceType::M3u,
                1,
                vec![
                    m3u_channel("Star Plus HD", "http://streams.test/star.m3u8", "IN", "hi"),
                    m3u_channel("9XM", "http://streams.test/9xm.m3u8", "IN", "hi"),
                ],
            ),
            StaticSource::new(
                "iptv_org",
                SourceType::IptvOrg,
                2,
                vec![catalog_channel(
                    "Star Plus",
                    "http://streams.test/star-alt.m3u8",
                    "IN",
                    "hin",
                    None,
                )],
            ),
        ])
    };

    let orchestrator = PipelineOrchestrator::new(config.clone());
    let exporter = JsonExporter::new(&config.output, dir.path());

    let first = orchestrator.run(&make_sources()).await.unwrap();
    let mut first_metadata = first.metadata;
    exporter.export(&first.channels, &mut first_metadata).unwrap();

    let second = orchestrator.run(&make_sources()).await.unwrap();
    let mut second_metadata = second.metadata;
    exporter
        .export(&second.channels, &mut second_metadata)
        .unwrap();

    assert_eq!(first_metadata.total_channels, second_metadata.total_channels);
    assert_eq!(
        first_metadata.duplicates_merged,
        second_metadata.duplicates_merged
    );
    assert_eq!(first_metadata.checksum, second_metadata.checksum);
}
