//! M3U playlist exporter
//!
//! Writes the final channel set as an extended M3U playlist that IPTV
//! players can consume directly, including VLC-style header options for
//! streams that need them.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::OutputConfig;
use crate::errors::AppResult;
use crate::models::ProcessedChannel;

/// Exports processed channels to M3U
pub struct M3uExporter {
    config: OutputConfig,
    output_dir: PathBuf,
}

impl M3uExporter {
    pub fn new(config: &OutputConfig, base_dir: &Path) -> Self {
        let output_dir = base_dir.join(&config.directory).join("current");
        Self {
            config: config.clone(),
            output_dir,
        }
    }

    pub fn export(&self, channels: &[ProcessedChannel]) -> AppResult<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;

        let mut lines = vec!["#EXTM3U".to_string()];

        for channel in channels {
            lines.push(format!(
                "#EXTINF:-1 {},{}",
                build_attributes(channel),
                channel.name
            ));

            if let Some(headers) = &channel.headers {
                if let Some(user_agent) = &headers.user_agent {
                    lines.push(format!("#EXTVLCOPT:http-user-agent={user_agent}"));
                }
                if let Some(referrer) = &headers.referrer {
                    lines.push(format!("#EXTVLCOPT:http-referrer={referrer}"));
                }
            }

            lines.push(channel.stream_url.clone());
        }

        let output_path = self.output_dir.join(&self.config.m3u_filename);
        let mut contents = lines.join("\n");
        contents.push('\n');
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
        Ok(output_path)
    }
}

fn build_attributes(channel: &ProcessedChannel) -> String {
    let mut attrs = vec![
        format!("tvg-id=\"{}\"", channel.id),
        format!("tvg-name=\"{}\"", channel.name),
    ];

    if let Some(logo_url) = &channel.logo_url {
        attrs.push(format!("tvg-logo=\"{logo_url}\""));
    }
    if !channel.group.is_empty() {
        attrs.push(format!("group-title=\"{}\"", channel.group));
    }
    if !channel.country.is_empty() {
        attrs.push(format!("tvg-country=\"{}\"", channel.country));
    }
    if !channel.language.is_empty() {
        attrs.push(format!("tvg-language=\"{}\"", channel.language));
    }

    attrs.join(" ")
}
