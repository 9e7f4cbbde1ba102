use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use iptv_sanity::{
    config::Config,
    exporters::{JsonExporter, M3uExporter},
    pipeline::PipelineOrchestrator,
    sources::{ChannelLoader, IptvOrgSource, M3uPlaylistSource},
};

#[derive(Parser)]
#[command(name = "iptv-sanity")]
#[command(version)]
#[command(about = "Reconciles live-TV channel listings into a canonical published channel set")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Skip stream validation for faster runs
    #[arg(long)]
    skip_validation: bool,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = format!("iptv_sanity={}", cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting iptv-sanity v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load_from_file(&cli.config)?;
    info!(
        "Configuration loaded from: {} (env: {})",
        cli.config, config.environment
    );

    if cli.skip_validation {
        config.processing.validation.enabled = false;
    }

    // Output paths are resolved relative to the config file's directory so
    // the tool behaves the same regardless of the invocation cwd.
    let base_dir = std::path::Path::new(&cli.config)
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_default();

    let loaders = build_loaders(&config);
    if loaders.is_empty() {
        anyhow::bail!("No sources configured; nothing to load");
    }

    let orchestrator = PipelineOrchestrator::new(config.clone());
    let outcome = orchestrator.run(&loaders).await?;
    let mut metadata = outcome.metadata;

    info!("Step 6: Exporting results...");
    let json_exporter = JsonExporter::new(&config.output, &base_dir);
    json_exporter.backup_previous()?;
    json_exporter.export(&outcome.channels, &mut metadata)?;

    if config.output.secondary_formats.iter().any(|f| f == "m3u") {
        let m3u_exporter = M3uExporter::new(&config.output, &base_dir);
        m3u_exporter.export(&outcome.channels)?;
    }

    info!(
        "Pipeline run finished: {} channels published, {} duplicates merged, {} dead streams removed",
        metadata.total_channels, metadata.duplicates_merged, metadata.dead_streams_removed
    );
    Ok(())
}

/// Construct the configured loaders in priority order
fn build_loaders(config: &Config) -> Vec<Box<dyn ChannelLoader>> {
    let mut loaders: Vec<Box<dyn ChannelLoader>> = Vec::new();

    if let Some(m3u_config) = &config.sources.m3u {
        loaders.push(Box::new(M3uPlaylistSource::new(m3u_config.clone())));
    }

    if let Some(iptv_org_config) = &config.sources.iptv_org {
        loaders.push(Box::new(IptvOrgSource::new(
            iptv_org_config.clone(),
            config.processing.target_countries.clone(),
        )));
    }

    loaders.sort_by_key(|loader| loader.priority());
    loaders
}
