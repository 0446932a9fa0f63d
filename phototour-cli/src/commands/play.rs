//! Headless tour playback command.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use tracing::info;

use phototour::config::TourConfig;
use phototour::context::TourContext;
use phototour::resolve::{
    DirectorySource, ImageFetcher, ReqwestImageFetcher, SignedUrlSource, UrlSource,
};
use phototour::route::Route;
use phototour::tour::renderer::TourRenderer;

use crate::error::CliError;
use crate::render::LogRenderer;

/// Arguments for `phototour play`.
#[derive(Debug, Args)]
pub struct PlayArgs {
    /// Path to the route file (image_data.json)
    #[arg(long)]
    pub route: PathBuf,

    /// Optional INI config file overriding tour timing and buckets
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Local export directory containing images/ and thumbnails/
    #[arg(long)]
    pub export_dir: Option<PathBuf>,

    /// Private storage base URL (requires --service-key)
    #[arg(long)]
    pub storage_url: Option<String>,

    /// Service role key for the signed-URL exchange
    #[arg(long)]
    pub service_key: Option<String>,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long)]
    pub duration_secs: Option<u64>,
}

/// Run the tour until interrupted, then report playback counters.
pub async fn run(args: PlayArgs) -> Result<(), CliError> {
    let config = match &args.config {
        Some(path) => TourConfig::from_file(path)?,
        None => TourConfig::default(),
    };

    let route = Route::from_file(&args.route)?;
    if route.is_empty() {
        return Err(CliError::EmptyRoute);
    }

    let source = build_source(&args, &config)?;
    let fetcher: Arc<dyn ImageFetcher> = Arc::new(ReqwestImageFetcher::new());
    let ctx = TourContext::new(config, route, source, fetcher);

    let renderer: Arc<dyn TourRenderer> = Arc::new(LogRenderer);
    let player = ctx.build_player(renderer);

    player.play();
    info!("Tour playing - Ctrl-C to stop");

    match args.duration_secs {
        Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
        None => {
            let _ = tokio::signal::ctrl_c().await;
        }
    }
    player.pause();

    let metrics = ctx.metrics().snapshot();
    let resolver = ctx.resolver().stats();
    println!("Playback: {}", metrics);
    println!(
        "Resolver: {} backing calls, {} cache hits, {} coalesced",
        resolver.backing_calls, resolver.cache_hits, resolver.coalesced
    );
    Ok(())
}

fn build_source(args: &PlayArgs, config: &TourConfig) -> Result<Arc<dyn UrlSource>, CliError> {
    if let (Some(url), Some(key)) = (&args.storage_url, &args.service_key) {
        return Ok(Arc::new(SignedUrlSource::new(
            url.clone(),
            key.clone(),
            config.signed_url_expiry_secs,
        )));
    }
    if let Some(dir) = &args.export_dir {
        return Ok(Arc::new(DirectorySource::new(dir.clone())));
    }
    Err(CliError::MissingSource)
}
