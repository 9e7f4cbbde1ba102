//! JSON output exporter
//!
//! Writes the canonical channel list plus run metadata as a single JSON
//! document with an embedded content checksum, and a manifest summarizing
//! the run for consumers that only need the headline numbers.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::config::OutputConfig;
use crate::errors::AppResult;
use crate::models::{ChannelHeaders, PipelineMetadata, ProcessedChannel, SourceType};
use crate::utils::content_checksum;

/// Exports processed channels to JSON
pub struct JsonExporter {
    config: OutputConfig,
    output_dir: PathBuf,
    previous_dir: PathBuf,
}

/// Export-facing channel record (camelCase wire format)
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportedChannel<'a> {
    id: &'a str,
    name: &'a str,
    stream_url: &'a str,
    logo_url: &'a Option<String>,
    category: &'a str,
    country: &'a str,
    /// Consumers expect a language array even though the pipeline tracks a
    /// single primary language
    languages: Vec<&'a str>,
    flavor: &'a str,
    group: &'a str,
    quality_urls: BTreeMap<&'a str, &'a str>,
    alt_names: &'a [String],
    sources: &'a [SourceType],
    #[serde(skip_serializing_if = "Option::is_none")]
    headers: Option<ExportedHeaders<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportedHeaders<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    user_agent: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    referrer: Option<&'a str>,
}

impl<'a> ExportedChannel<'a> {
    fn from_channel(channel: &'a ProcessedChannel) -> Self {
        Self {
            id: &channel.id,
            name: &channel.name,
            stream_url: &channel.stream_url,
            logo_url: &channel.logo_url,
            category: &channel.category,
            country: &channel.country,
            languages: vec![if channel.language.is_empty() {
                "en"
            } else {
                &channel.language
            }],
            flavor: &channel.flavor,
            group: &channel.group,
            // BTreeMap keeps the serialized map order stable across runs
            quality_urls: channel
                .quality_urls
                .iter()
                .map(|(quality, url)| (quality.as_str(), url.as_str()))
                .collect(),
            alt_names: &channel.alt_names,
            sources: &channel.sources,
            headers: channel.headers.as_ref().filter(|h| !h.is_empty()).map(
                |headers: &ChannelHeaders| ExportedHeaders {
                    user_agent: headers.user_agent.as_deref(),
                    referrer: headers.referrer.as_deref(),
                },
            ),
        }
    }
}

impl JsonExporter {
    pub fn new(config: &OutputConfig, base_dir: &Path) -> Self {
        let root = base_dir.join(&config.directory);
        Self {
            config: config.clone(),
            output_dir: root.join("current"),
            previous_dir: root.join("previous"),
        }
    }

    /// Copy the current output aside before publishing a new one
    pub fn backup_previous(&self) -> AppResult<()> {
        if !self.output_dir.exists() {
            return Ok(());
        }

        std::fs::create_dir_all(&self.previous_dir)?;
        for entry in std::fs::read_dir(&self.output_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                std::fs::copy(entry.path(), self.previous_dir.join(entry.file_name()))?;
            }
        }

        info!("Backed up current output to {}", self.previous_dir.display());
        Ok(())
    }

    /// Write the channel list and manifest; fills in `metadata.checksum`
    pub fn export(
        &self,
        channels: &[ProcessedChannel],
        metadata: &mut PipelineMetadata,
    ) -> AppResult<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;

        let sorted;
        let channels: &[ProcessedChannel] = if self.config.sorted_output {
            sorted = self.sort_channels(channels);
            &sorted
        } else {
            channels
        };

        let exported: Vec<ExportedChannel> =
            channels.iter().map(ExportedChannel::from_channel).collect();

        // Checksum covers the serialized channel list only, so two runs
        // over identical inputs produce identical checksums regardless of
        // timestamps.
        let channels_json =
            serde_json::to_string(&exported).map_err(crate::errors::ExportError::from)?;
        metadata.checksum = content_checksum(channels_json.as_bytes());

        let output = serde_json::json!({
            "version": metadata.version,
            "generatedAt": metadata.generated_at,
            "checksum": metadata.checksum,
            "metadata": metadata,
            "channels": exported,
        });

        let contents = if self.config.minify_json {
            serde_json::to_string(&output).map_err(crate::errors::ExportError::from)?
        } else {
            serde_json::to_string_pretty(&output).map_err(crate::errors::ExportError::from)?
        };

        let output_path = self.output_dir.join(&self.config.json_filename);
        std::fs::write(&output_path, contents).map_err(|e| {
            crate::errors::ExportError::WriteFailed {
                path: output_path.display().to_string(),
                message: e.to_string(),
            }
        })?;
        info!(
            "Exported {} channels to {}",
            channels.len(),
            output_path.display()
        );

        self.write_manifest(metadata)?;
        Ok(output_path)
    }

    /// Deterministic sort by the configured field tuple
    fn sort_channels(&self, channels: &[ProcessedChannel]) -> Vec<ProcessedChannel> {
        let mut sorted = channels.to_vec();
        sorted.sort_by_key(|channel| {
            self.config
                .sort_by
                .iter()
                .map(|field| sort_field(channel, field).to_string())
                .collect::<Vec<_>>()
        });
        sorted
    }

    fn write_manifest(&self, metadata: &PipelineMetadata) -> AppResult<()> {
        let manifest = serde_json::json!({
            "version": metadata.version,
            "generatedAt": metadata.generated_at,
            "checksum": metadata.checksum,
            "totalChannels": metadata.total_channels,
            "files": {
                "channels": self.config.json_filename,
                "m3u": self.config.m3u_filename,
            },
        });

        let manifest_path = self.output_dir.join("manifest.json");
        let contents =
            serde_json::to_string_pretty(&manifest).map_err(crate::errors::ExportError::from)?;
        std::fs::write(&manifest_path, contents)?;
        info!("Wrote manifest to {}", manifest_path.display());
        Ok(())
    }
}

fn sort_field<'a>(channel: &'a ProcessedChannel, field: &str) -> &'a str {
    match field {
        "id" => &channel.id,
        "name" => &channel.name,
        "category" => &channel.category,
        "country" => &channel.country,
        "language" => &channel.language,
        "flavor" => &channel.flavor,
        "group" => &channel.group,
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn make_channel(name: &str, country: &str, category: &str) -> ProcessedChannel {
        ProcessedChannel {
            id: name.to_lowercase().replace(' ', "."),
            name: name.to_string(),
            stream_url: format!(
                "http://streams.test/{}.m3u8",
                name.to_lowercase().replace(' ', "-")
            ),
            logo_url: None,
            category: category.to_string(),
            country: country.to_string(),
            language: "en".to_string(),
            flavor: "general".to_string(),
            group: "Uncategorized".to_string(),
            quality_urls: HashMap::new(),
            alt_names: Vec::new(),
            headers: None,
            sources: vec![SourceType::M3u],
        }
    }

    fn make_metadata() -> PipelineMetadata {
        PipelineMetadata {
            version: "2024.06.01".to_string(),
            generated_at: chrono::Utc::now(),
            checksum: String::new(),
            total_channels: 0,
            channels_by_country: Default::default(),
            channels_by_category: Default::default(),
            channels_by_flavor: Default::default(),
            sources_used: vec![SourceType::M3u],
            dead_streams_removed: 0,
            duplicates_merged: 0,
            processing_time_seconds: 0.5,
        }
    }

    #[test]
    fn export_writes_channels_manifest_and_checksum() {
        let dir = TempDir::new().unwrap();
        let exporter = JsonExporter::new(&OutputConfig::default(), dir.path());
        let channels = vec![make_channel("Star Plus", "IN", "entertainment")];
        let mut metadata = make_metadata();

        let path = exporter.export(&channels, &mut metadata).unwrap();

        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed["checksum"], serde_json::json!(metadata.checksum));
        assert_eq!(metadata.checksum.len(), 64);
        assert_eq!(parsed["channels"][0]["name"], "Star Plus");
        assert_eq!(
            parsed["channels"][0]["streamUrl"],
            "http://streams.test/star-plus.m3u8"
        );
        assert_eq!(parsed["channels"][0]["languages"], serde_json::json!(["en"]));
        assert_eq!(parsed["channels"][0]["sources"], serde_json::json!(["m3u"]));

        assert!(dir
            .path()
            .join("output/current/manifest.json")
            .exists());
    }

    #[test]
    fn export_sorts_by_configured_tuple() {
        let dir = TempDir::new().unwrap();
        let exporter = JsonExporter::new(&OutputConfig::default(), dir.path());
        let channels = vec![
            make_channel("Zee", "US", "news"),
            make_channel("Aaj Tak", "IN", "news"),
            make_channel("Colors", "IN", "entertainment"),
        ];
        let mut metadata = make_metadata();

        let path = exporter.export(&channels, &mut metadata).unwrap();

        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let names: Vec<_> = parsed["channels"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["name"].as_str().unwrap())
            .collect();
        // country first, then category, then name
        assert_eq!(names, vec!["Colors", "Aaj Tak", "Zee"]);
    }

    #[test]
    fn identical_inputs_produce_identical_checksums() {
        let dir = TempDir::new().unwrap();
        let exporter = JsonExporter::new(&OutputConfig::default(), dir.path());
        let channels = vec![
            make_channel("Star Plus", "IN", "entertainment"),
            make_channel("9XM", "IN", "music"),
        ];

        let mut first = make_metadata();
        exporter.export(&channels, &mut first).unwrap();
        let mut second = make_metadata();
        exporter.export(&channels, &mut second).unwrap();

        assert_eq!(first.checksum, second.checksum);
    }

    #[test]
    fn minified_output_is_single_line() {
        let dir = TempDir::new().unwrap();
        let config = OutputConfig {
            minify_json: true,
            ..OutputConfig::default()
        };
        let exporter = JsonExporter::new(&config, dir.path());
        let mut metadata = make_metadata();

        let path = exporter
            .export(&[make_channel("Solo", "IN", "general")], &mut metadata)
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }

    #[test]
    fn headers_are_exported_camel_case() {
        let dir = TempDir::new().unwrap();
        let exporter = JsonExporter::new(&OutputConfig::default(), dir.path());
        let mut channel = make_channel("Protected", "IN", "general");
        channel.headers = Some(ChannelHeaders {
            user_agent: Some("CustomUA/1.0".to_string()),
            referrer: None,
        });
        let mut metadata = make_metadata();

        let path = exporter.export(&[channel], &mut metadata).unwrap();

        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed["channels"][0]["headers"]["userAgent"], "CustomUA/1.0");
        assert!(parsed["channels"][0]["headers"].get("referrer").is_none());
    }

    #[test]
    fn backup_copies_current_output() {
        let dir = TempDir::new().unwrap();
        let exporter = JsonExporter::new(&OutputConfig::default(), dir.path());
        let mut metadata = make_metadata();
        exporter
            .export(&[make_channel("Solo", "IN", "general")], &mut metadata)
            .unwrap();

        exporter.backup_previous().unwrap();

        assert!(dir
            .path()
            .join("output/previous/iptv_channels.json")
            .exists());
    }
}
