//! Stream liveness validation
//!
//! Probes every channel's stream URL concurrently under a bounded
//! concurrency budget and filters out dead entries. Each probe owns its
//! channel, so no shared state is touched concurrently; output preserves
//! input order.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{REFERER, USER_AGENT};
use reqwest::redirect::Policy;
use reqwest::{Client, StatusCode};
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::config::ValidationConfig;
use crate::models::{NormalizedChannel, ValidationStatus};
use crate::sources::DEFAULT_USER_AGENT;
use crate::utils::matches_any_pattern;

/// Validates stream URLs with lightweight HEAD probes
pub struct StreamValidator {
    config: ValidationConfig,
    client: Client,
}

impl StreamValidator {
    pub fn new(config: &ValidationConfig) -> Self {
        let client = Client::builder()
            .redirect(Policy::limited(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            config: config.clone(),
            client,
        }
    }

    /// Probe all channels and return the live ones plus the dead count
    ///
    /// No-op passthrough when validation is disabled. Surviving channels
    /// keep their input order.
    pub async fn validate(
        &self,
        channels: Vec<NormalizedChannel>,
    ) -> (Vec<NormalizedChannel>, usize) {
        if !self.config.enabled {
            info!("Stream validation is disabled");
            return (channels, 0);
        }

        info!("Validating {} streams...", channels.len());
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));

        let probes = channels.into_iter().map(|mut channel| {
            let semaphore = Arc::clone(&semaphore);
            async move {
                channel.validation_status = self.probe_channel(&channel, &semaphore).await;
                channel
            }
        });

        let probed = futures::future::join_all(probes).await;

        let mut valid = Vec::with_capacity(probed.len());
        let mut dead_count = 0usize;
        for channel in probed {
            match channel.validation_status {
                ValidationStatus::Valid | ValidationStatus::Skipped => valid.push(channel),
                _ => dead_count += 1,
            }
        }

        info!(
            "Validation complete: {} valid, {} dead",
            valid.len(),
            dead_count
        );
        (valid, dead_count)
    }

    async fn probe_channel(
        &self,
        channel: &NormalizedChannel,
        semaphore: &Semaphore,
    ) -> ValidationStatus {
        // Known-good URLs are trusted without a network call
        if matches_any_pattern(&channel.stream_url, &self.config.skip_patterns) {
            return ValidationStatus::Skipped;
        }

        let Ok(_permit) = semaphore.acquire().await else {
            // The semaphore lives as long as the batch; acquire only fails
            // if it was closed, in which case the probe cannot run.
            return ValidationStatus::Invalid;
        };

        match self.head_request(channel, true).await {
            Ok(status) => self.resolve_status(status),
            Err(e) if e.is_timeout() => {
                debug!("Timeout validating '{}'", channel.name);
                if self.config.retry_once {
                    self.retry_probe(channel).await
                } else {
                    ValidationStatus::Timeout
                }
            }
            Err(e) => {
                debug!("Error validating '{}': {}", channel.name, e);
                ValidationStatus::Invalid
            }
        }
    }

    /// One retry after a timeout, issued with the default user agent
    async fn retry_probe(&self, channel: &NormalizedChannel) -> ValidationStatus {
        match self.head_request(channel, false).await {
            Ok(status) if self.config.accept_status_codes.contains(&status.as_u16()) => {
                ValidationStatus::Valid
            }
            Ok(_) => ValidationStatus::Invalid,
            Err(_) => ValidationStatus::Timeout,
        }
    }

    async fn head_request(
        &self,
        channel: &NormalizedChannel,
        use_channel_headers: bool,
    ) -> Result<StatusCode, reqwest::Error> {
        let mut request = self
            .client
            .head(&channel.stream_url)
            .timeout(Duration::from_secs(self.config.timeout_seconds));

        let mut has_user_agent = false;
        if use_channel_headers {
            if let Some(headers) = &channel.headers {
                if let Some(user_agent) = &headers.user_agent {
                    request = request.header(USER_AGENT, user_agent);
                    has_user_agent = true;
                }
                if let Some(referrer) = &headers.referrer {
                    request = request.header(REFERER, referrer);
                }
            }
        }
        if !has_user_agent {
            request = request.header(USER_AGENT, DEFAULT_USER_AGENT);
        }

        let response = request.send().await?;
        Ok(response.status())
    }

    fn resolve_status(&self, status: StatusCode) -> ValidationStatus {
        let code = status.as_u16();
        if self.config.accept_status_codes.contains(&code) {
            return ValidationStatus::Valid;
        }
        // Some origins reject probe methods but serve real players
        if self.config.conditional_accept.contains(&code) {
            return ValidationStatus::Valid;
        }
        ValidationStatus::Invalid
    }
}
