// Main entry point for the terminal demo
// Queues the given items on one of the two player variants and opens the TUI

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use unified_player::logging::{self, LoggingConfig};
use unified_player::player::audio::RodioBackend;
use unified_player::ui::app::{Deck, PlayerApp};
use unified_player::youtube::ytdlp::YtDlpEmbed;
use unified_player::{MediaItem, PlaybackControl, Player, PlayerConfig, YoutubePlayer};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "unified-player")]
#[command(about = "Terminal player for audio files, streams and YouTube videos")]
#[command(version)]
struct Args {
    /// Files or URLs to queue. Local files are read and decoded up front.
    items: Vec<String>,

    /// Play YouTube watch URLs through the embedded-video player
    #[arg(short, long)]
    youtube: bool,

    /// Config file (defaults to the user config directory)
    #[arg(short, long, env = "UNIFIED_PLAYER_CONFIG")]
    config: Option<PathBuf>,

    /// Log file (defaults to player.log next to the config)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Suppress ALSA error messages that pollute TUI
    std::env::set_var("ALSA_PCM_NO_MMAP", "1");

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => PlayerConfig::load_from(path),
        None => PlayerConfig::load(),
    }
    .context("Failed to load config")?
    .with_env_overrides();

    let log_file = args
        .log_file
        .clone()
        .or_else(|| PlayerConfig::config_dir().map(|dir| dir.join("player.log")));
    logging::init(&LoggingConfig {
        filter: config.log_filter.clone(),
        file: log_file,
    })
    .context("Failed to initialize logging")?;

    info!("Starting unified-player with {} item(s)", args.items.len());

    let deck = if args.youtube {
        let api = Arc::new(YtDlpEmbed::with_default_output(&config.ytdlp_path));
        let player = Arc::new(YoutubePlayer::new(api, &config));
        if let Some(url) = args.items.first() {
            // Binding waits for yt-dlp to be found; do it off the UI path
            let player = player.clone();
            let item = MediaItem::Url(url.clone());
            tokio::spawn(async move {
                if let Err(e) = player.enqueue(item).await {
                    tracing::warn!("Failed to enqueue: {}", e);
                }
            });
        }
        Deck::Embedded(player)
    } else {
        let backend = RodioBackend::new();
        if !backend.has_output() {
            tracing::warn!("No audio device; playback will fail");
        }
        let player = Arc::new(Player::new(Arc::new(backend), &config));
        let mut items = Vec::with_capacity(args.items.len());
        for arg in &args.items {
            items.push(load_item(arg).await?);
        }
        player.enqueue_all(items).await.context("Failed to enqueue items")?;
        Deck::Buffer(player)
    };

    let mut app = PlayerApp::new(deck);
    app.run().await?;

    info!("Shutdown complete");
    Ok(())
}

// URLs stay URLs; anything that exists on disk is read as encoded bytes
async fn load_item(arg: &str) -> Result<MediaItem> {
    let path = Path::new(arg);
    if !arg.contains("://") && path.exists() {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(MediaItem::RawBytes(bytes))
    } else {
        Ok(MediaItem::Url(arg.to_string()))
    }
}
