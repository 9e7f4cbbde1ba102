//! IPTV-org catalog API source loader
//!
//! Pulls the public channel/stream/blocklist datasets, joins streams onto
//! channels, and filters the worldwide catalog down to the configured
//! target countries.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use super::{ChannelLoader, DEFAULT_USER_AGENT};
use crate::config::IptvOrgSourceConfig;
use crate::errors::{AppResult, SourceError};
use crate::models::{RawChannel, SourceType};

const CHANNELS_ENDPOINT: &str = "/channels.json";
const STREAMS_ENDPOINT: &str = "/streams.json";
const BLOCKLIST_ENDPOINT: &str = "/blocklist.json";

/// Loader for the IPTV-org catalog API
pub struct IptvOrgSource {
    config: IptvOrgSourceConfig,
    target_countries: Vec<String>,
    client: Client,
}

/// Channel record as served by the catalog API
#[derive(Debug, Deserialize)]
struct ApiChannel {
    id: String,
    name: String,
    #[serde(default)]
    logo: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default)]
    languages: Vec<String>,
    #[serde(default)]
    is_nsfw: bool,
}

/// Stream record as served by the catalog API
#[derive(Debug, Deserialize)]
struct ApiStream {
    #[serde(default)]
    channel: Option<String>,
    url: String,
    #[serde(default)]
    quality: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiBlocklistEntry {
    #[serde(default)]
    channel: Option<String>,
}

impl IptvOrgSource {
    pub fn new(config: IptvOrgSourceConfig, target_countries: Vec<String>) -> Self {
        let client = Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            config,
            target_countries,
            client,
        }
    }

    async fn fetch_json<T: serde::de::DeserializeOwned>(&self, endpoint: &str) -> AppResult<T> {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint);
        debug!("Fetching catalog dataset url={}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::fetch_failed("iptv_org", e.to_string()))?
            .error_for_status()
            .map_err(|e| SourceError::fetch_failed("iptv_org", e.to_string()))?;

        response
            .json::<T>()
            .await
            .map_err(|e| SourceError::parse_error("iptv_org", e.to_string()))
            .map_err(Into::into)
    }

    /// Join streams onto channels and apply blocklist/country filtering
    fn process_channels(
        &self,
        channels: Vec<ApiChannel>,
        streams: Vec<ApiStream>,
        blocklist: &[ApiBlocklistEntry],
    ) -> Vec<RawChannel> {
        let blocked: std::collections::HashSet<&str> = blocklist
            .iter()
            .filter_map(|entry| entry.channel.as_deref())
            .collect();

        let mut stream_lookup: HashMap<&str, Vec<&ApiStream>> = HashMap::new();
        for stream in &streams {
            if let Some(channel_id) = stream.channel.as_deref() {
                stream_lookup.entry(channel_id).or_default().push(stream);
            }
        }

        let mut result = Vec::new();
        for channel in channels {
            if blocked.contains(channel.id.as_str()) {
                continue;
            }

            if let Some(country) = &channel.country {
                if !self
                    .target_countries
                    .iter()
                    .any(|target| target.eq_ignore_ascii_case(country))
                {
                    continue;
                }
            }

            let Some(channel_streams) = stream_lookup.get(channel.id.as_str()) else {
                continue;
            };

            // First stream is the primary URL; quality-labeled alternates
            // are carried as extra attributes for the normalizer to lift.
            let primary = channel_streams[0];
            let mut quality_urls = serde_json::Map::new();
            for stream in channel_streams {
                if let Some(quality) = &stream.quality {
                    quality_urls
                        .entry(quality.to_lowercase())
                        .or_insert_with(|| serde_json::Value::String(stream.url.clone()));
                }
            }

            let mut extra_attrs: HashMap<String, serde_json::Value> = HashMap::new();
            extra_attrs.insert(
                "iptv_org_id".to_string(),
                serde_json::Value::String(channel.id.clone()),
            );
            extra_attrs.insert(
                "categories".to_string(),
                serde_json::json!(channel.categories),
            );
            extra_attrs.insert("languages".to_string(), serde_json::json!(channel.languages));
            extra_attrs.insert("is_nsfw".to_string(), serde_json::json!(channel.is_nsfw));
            if !quality_urls.is_empty() {
                extra_attrs.insert(
                    "quality_urls".to_string(),
                    serde_json::Value::Object(quality_urls),
                );
            }

            result.push(RawChannel {
                name: channel.name.clone(),
                stream_url: primary.url.clone(),
                source: SourceType::IptvOrg,
                tvg_id: Some(channel.id),
                tvg_name: Some(channel.name),
                tvg_logo: channel.logo,
                group_title: (!channel.categories.is_empty())
                    .then(|| channel.categories.join(", ")),
                country: channel.country,
                language: (!channel.languages.is_empty()).then(|| channel.languages.join(", ")),
                headers: None,
                extra_attrs,
            });
        }

        result
    }
}

#[async_trait]
impl ChannelLoader for IptvOrgSource {
    fn source_type(&self) -> SourceType {
        SourceType::IptvOrg
    }

    fn source_name(&self) -> &str {
        "iptv_org"
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn priority(&self) -> u32 {
        self.config.priority
    }

    async fn load(&self) -> AppResult<Vec<RawChannel>> {
        let channels: Vec<ApiChannel> = self.fetch_json(CHANNELS_ENDPOINT).await?;
        info!("Fetched {} channels from catalog", channels.len());

        let streams: Vec<ApiStream> = self.fetch_json(STREAMS_ENDPOINT).await?;
        info!("Fetched {} streams from catalog", streams.len());

        let blocklist: Vec<ApiBlocklistEntry> = self.fetch_json(BLOCKLIST_ENDPOINT).await?;
        debug!("Fetched {} blocklist entries from catalog", blocklist.len());

        let result = self.process_channels(channels, streams, &blocklist);
        info!("Loaded {} channels from catalog after filtering", result.len());
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> IptvOrgSource {
        IptvOrgSource::new(
            IptvOrgSourceConfig {
                enabled: true,
                priority: 2,
                base_url: "https://catalog.test/api".to_string(),
                timeout_seconds: 60,
            },
            vec!["IN".to_string(), "US".to_string()],
        )
    }

    fn api_channel(id: &str, name: &str, country: &str) -> ApiChannel {
        ApiChannel {
            id: id.to_string(),
            name: name.to_string(),
            logo: None,
            country: Some(country.to_string()),
            categories: vec!["news".to_string()],
            languages: vec!["hin".to_string(), "eng".to_string()],
            is_nsfw: false,
        }
    }

    fn api_stream(channel: &str, url: &str, quality: Option<&str>) -> ApiStream {
        ApiStream {
            channel: Some(channel.to_string()),
            url: url.to_string(),
            quality: quality.map(|q| q.to_string()),
        }
    }

    #[test]
    fn joins_streams_and_filters_countries() {
        let channels = vec![
            api_channel("NDTV.in", "NDTV 24x7", "IN"),
            api_channel("BBCOne.uk", "BBC One", "GB"),
        ];
        let streams = vec![
            api_stream("NDTV.in", "http://streams.test/ndtv.m3u8", None),
            api_stream("BBCOne.uk", "http://streams.test/bbc.m3u8", None),
        ];

        let result = source().process_channels(channels, streams, &[]);

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].name, "NDTV 24x7");
        assert_eq!(result[0].tvg_id.as_deref(), Some("NDTV.in"));
        assert_eq!(result[0].language.as_deref(), Some("hin, eng"));
        assert_eq!(result[0].source, SourceType::IptvOrg);
    }

    #[test]
    fn blocklisted_channels_are_dropped() {
        let channels = vec![api_channel("Pirate.in", "Pirate TV", "IN")];
        let streams = vec![api_stream("Pirate.in", "http://streams.test/p.m3u8", None)];
        let blocklist = vec![ApiBlocklistEntry {
            channel: Some("Pirate.in".to_string()),
        }];

        let result = source().process_channels(channels, streams, &blocklist);

        assert!(result.is_empty());
    }

    #[test]
    fn channels_without_streams_are_dropped() {
        let channels = vec![api_channel("Ghost.in", "Ghost TV", "IN")];

        let result = source().process_channels(channels, Vec::new(), &[]);

        assert!(result.is_empty());
    }

    #[test]
    fn quality_labeled_streams_become_quality_url_attrs() {
        let channels = vec![api_channel("Star.in", "Star Plus", "IN")];
        let streams = vec![
            api_stream("Star.in", "http://streams.test/star-main.m3u8", None),
            api_stream("Star.in", "http://streams.test/star-720.m3u8", Some("720p")),
            api_stream("Star.in", "http://streams.test/star-1080.m3u8", Some("1080p")),
        ];

        let result = source().process_channels(channels, streams, &[]);

        assert_eq!(result[0].stream_url, "http://streams.test/star-main.m3u8");
        let quality_urls = result[0].extra_attrs.get("quality_urls").unwrap();
        assert_eq!(
            quality_urls["720p"],
            serde_json::Value::String("http://streams.test/star-720.m3u8".to_string())
        );
        assert_eq!(
            quality_urls["1080p"],
            serde_json::Value::String("http://streams.test/star-1080.m3u8".to_string())
        );
    }

    #[test]
    fn channels_without_country_pass_the_filter() {
        let mut channel = api_channel("Mystery.xx", "Mystery TV", "IN");
        channel.country = None;
        let streams = vec![api_stream("Mystery.xx", "http://streams.test/m.m3u8", None)];

        let result = source().process_channels(vec![channel], streams, &[]);

        assert_eq!(result.len(), 1);
        assert!(result[0].country.is_none());
    }
}
