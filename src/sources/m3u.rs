//! M3U playlist source loader
//!
//! Fetches configured playlist URLs and parses standard/extended M3U
//! content with EXTINF metadata into raw channel records.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, warn};

use super::{ChannelLoader, DEFAULT_USER_AGENT};
use crate::config::M3uSourceConfig;
use crate::errors::{AppResult, SourceError};
use crate::models::{ChannelHeaders, RawChannel, SourceType};

/// Loader for M3U playlists
pub struct M3uPlaylistSource {
    config: M3uSourceConfig,
    client: Client,
}

impl M3uPlaylistSource {
    pub fn new(config: M3uSourceConfig) -> Self {
        let client = Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { config, client }
    }

    async fn fetch_playlist(&self, url: &str, timeout: Duration) -> AppResult<String> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| SourceError::fetch_failed("m3u", e.to_string()))?;

        let response = response
            .error_for_status()
            .map_err(|e| SourceError::fetch_failed("m3u", e.to_string()))?;

        response
            .text()
            .await
            .map_err(|e| SourceError::fetch_failed("m3u", e.to_string()))
            .map_err(Into::into)
    }

    /// Parse M3U content into raw channels
    ///
    /// Malformed entries are skipped; a playlist never fails as a whole
    /// because of individual records.
    fn parse_playlist(&self, content: &str) -> Vec<RawChannel> {
        let mut channels = Vec::new();
        let mut pending: Option<(HashMap<String, String>, String)> = None;
        let mut skipped = 0usize;

        for (line_num, line) in content.lines().enumerate() {
            let line = line.trim();

            if line.starts_with("#EXTINF:") {
                pending = Some(parse_extinf_line(line));
            } else if !line.is_empty() && !line.starts_with('#') {
                // Stream URL line terminates the pending EXTINF entry
                match pending.take() {
                    Some((attrs, name)) if !name.is_empty() => {
                        channels.push(build_channel(name, line.to_string(), attrs));
                    }
                    _ => {
                        skipped += 1;
                        debug!(
                            "Skipping stream URL without usable EXTINF metadata at line {}",
                            line_num + 1
                        );
                    }
                }
            }
        }

        if skipped > 0 {
            warn!("Skipped {} malformed playlist entries", skipped);
        }

        channels
    }
}

/// Parse an EXTINF line into its attribute map and display name
///
/// Format: `#EXTINF:duration key="value" ...,Display Name`. Attribute keys
/// are normalized to snake_case so downstream lookups like `tvg_country`
/// work regardless of the playlist's hyphenation.
fn parse_extinf_line(line: &str) -> (HashMap<String, String>, String) {
    let content = line.strip_prefix("#EXTINF:").unwrap_or(line);

    // The display name follows the last comma outside of quotes; attribute
    // values may themselves contain commas.
    let name_start = find_name_separator(content);
    let (attrs_part, name) = match name_start {
        Some(idx) => (&content[..idx], content[idx + 1..].trim()),
        None => (content, ""),
    };

    (parse_attributes(attrs_part), name.to_string())
}

fn find_name_separator(content: &str) -> Option<usize> {
    let mut in_quotes = false;
    let mut last_comma = None;
    for (idx, ch) in content.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => last_comma = Some(idx),
            _ => {}
        }
    }
    last_comma
}

/// Scan `key="value"` pairs out of the EXTINF attribute section
fn parse_attributes(attrs_part: &str) -> HashMap<String, String> {
    let mut attributes = HashMap::new();
    let mut chars = attrs_part.chars().peekable();
    let mut current_key = String::new();
    let mut current_value = String::new();
    let mut in_quotes = false;
    let mut in_value = false;

    while let Some(ch) = chars.next() {
        match ch {
            ' ' | '\t' if !in_quotes => {
                current_key.clear();
            }
            '=' if !in_quotes && !in_value => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    in_quotes = true;
                    in_value = true;
                    current_value.clear();
                }
            }
            '"' if in_quotes => {
                in_quotes = false;
                in_value = false;
                if !current_key.is_empty() {
                    attributes.insert(normalize_attr_key(&current_key), current_value.clone());
                }
                current_key.clear();
                current_value.clear();
            }
            _ => {
                if in_value {
                    current_value.push(ch);
                } else {
                    current_key.push(ch);
                }
            }
        }
    }

    attributes
}

fn normalize_attr_key(key: &str) -> String {
    key.to_lowercase().replace('-', "_")
}

fn build_channel(name: String, url: String, attrs: HashMap<String, String>) -> RawChannel {
    let headers = match (attrs.get("http_user_agent"), attrs.get("http_referrer")) {
        (None, None) => None,
        (user_agent, referrer) => Some(ChannelHeaders {
            user_agent: user_agent.cloned(),
            referrer: referrer.cloned(),
        }),
    };

    let extra_attrs = attrs
        .iter()
        .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
        .collect();

    RawChannel {
        name,
        stream_url: url,
        source: SourceType::M3u,
        tvg_id: attrs.get("tvg_id").cloned(),
        tvg_name: attrs.get("tvg_name").cloned(),
        tvg_logo: attrs.get("tvg_logo").cloned(),
        group_title: attrs.get("group_title").cloned(),
        country: attrs.get("tvg_country").cloned(),
        language: attrs.get("tvg_language").cloned(),
        headers,
        extra_attrs,
    }
}

#[async_trait]
impl ChannelLoader for M3uPlaylistSource {
    fn source_type(&self) -> SourceType {
        SourceType::M3u
    }

    fn source_name(&self) -> &str {
        "m3u"
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn priority(&self) -> u32 {
        self.config.priority
    }

    async fn load(&self) -> AppResult<Vec<RawChannel>> {
        let mut all_channels = Vec::new();

        for entry in &self.config.urls {
            let timeout = Duration::from_secs(entry.timeout_seconds);
            let content = self.fetch_playlist(&entry.url, timeout).await?;
            let channels = self.parse_playlist(&content);
            info!(
                "Loaded {} channels from playlist '{}'",
                channels.len(),
                entry.name
            );
            all_channels.extend(channels);
        }

        Ok(all_channels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> M3uPlaylistSource {
        M3uPlaylistSource::new(M3uSourceConfig {
            enabled: true,
            priority: 1,
            urls: Vec::new(),
        })
    }

    const SAMPLE: &str = r#"#EXTM3U
#EXTINF:-1 tvg-id="star.plus" tvg-name="Star Plus" tvg-logo="https://logos.test/star.png" group-title="Entertainment" tvg-country="IN" tvg-language="hi",Star Plus HD
http://streams.test/star-plus.m3u8
#EXTINF:-1 tvg-id="zee.tv",Zee TV
http://streams.test/zee-tv.m3u8
"#;

    #[test]
    fn parses_extinf_entries_with_attributes() {
        let channels = source().parse_playlist(SAMPLE);

        assert_eq!(channels.len(), 2);
        let star = &channels[0];
        assert_eq!(star.name, "Star Plus HD");
        assert_eq!(star.stream_url, "http://streams.test/star-plus.m3u8");
        assert_eq!(star.tvg_id.as_deref(), Some("star.plus"));
        assert_eq!(star.tvg_name.as_deref(), Some("Star Plus"));
        assert_eq!(star.group_title.as_deref(), Some("Entertainment"));
        assert_eq!(star.country.as_deref(), Some("IN"));
        assert_eq!(star.language.as_deref(), Some("hi"));
        assert_eq!(star.source, SourceType::M3u);
    }

    #[test]
    fn attribute_keys_are_snake_cased_in_extra_attrs() {
        let channels = source().parse_playlist(SAMPLE);

        assert_eq!(
            channels[0].extra_attrs.get("tvg_country"),
            Some(&serde_json::Value::String("IN".to_string()))
        );
        assert!(!channels[0].extra_attrs.contains_key("tvg-country"));
    }

    #[test]
    fn vlc_header_attributes_become_channel_headers() {
        let playlist = r#"#EXTM3U
#EXTINF:-1 http-user-agent="CustomUA/1.0" http-referrer="https://player.test/",Protected
http://streams.test/protected.m3u8
"#;
        let channels = source().parse_playlist(playlist);

        let headers = channels[0].headers.as_ref().unwrap();
        assert_eq!(headers.user_agent.as_deref(), Some("CustomUA/1.0"));
        assert_eq!(headers.referrer.as_deref(), Some("https://player.test/"));
    }

    #[test]
    fn url_without_extinf_is_skipped() {
        let playlist = "#EXTM3U\nhttp://streams.test/orphan.m3u8\n";
        let channels = source().parse_playlist(playlist);

        assert!(channels.is_empty());
    }

    #[test]
    fn display_name_may_contain_commas_in_attribute_values() {
        let playlist = r#"#EXTM3U
#EXTINF:-1 group-title="News, Politics",NDTV 24x7
http://streams.test/ndtv.m3u8
"#;
        let channels = source().parse_playlist(playlist);

        assert_eq!(channels[0].name, "NDTV 24x7");
        assert_eq!(channels[0].group_title.as_deref(), Some("News, Politics"));
    }

    #[test]
    fn comment_lines_are_ignored() {
        let playlist = "#EXTM3U\n# just a comment\n#EXTINF:-1,Solo\nhttp://streams.test/solo.ts\n";
        let channels = source().parse_playlist(playlist);

        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].name, "Solo");
        assert!(channels[0].tvg_id.is_none());
    }
}
