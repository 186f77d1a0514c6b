use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info};

mod audio;
mod bot;
mod config;
mod error;
mod music;
mod sources;
mod ui;

use crate::audio::{voice::SongbirdSink, AudioPlayer};
use crate::bot::MusicBot;
use crate::config::Config;
use crate::music::MusicController;
use crate::sources::{SourceManager, YouTubeClient};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tunequeue=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Starting tunequeue v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;

    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check(&config).await;
    }

    info!("{}", config.summary());

    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    // One HTTP client for Spotify and the songbird inputs
    let http = reqwest::Client::new();

    // Lives for the whole process; songbird wants a 'static program name
    let ytdlp: &'static str = Box::leak(config.ytdlp_path.clone().into_boxed_str());

    let songbird = Songbird::serenity();
    let sink = Arc::new(SongbirdSink::new(songbird.clone(), http.clone(), ytdlp));
    let player = AudioPlayer::new(sink);
    let resolver = Arc::new(SourceManager::new(&config, http));
    let controller = Arc::new(MusicController::new(resolver, player));

    let config = Arc::new(config);
    let handler = MusicBot::new(config.clone(), controller);

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Could not listen for Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Shutdown signal received, exiting...");
        std::process::exit(0);
    });

    info!("🚀 Bot started");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    Ok(())
}

async fn health_check(config: &Config) -> Result<()> {
    let version = YouTubeClient::new(config.ytdlp_path.clone()).verify().await?;
    info!("yt-dlp {}", version);

    println!("OK");
    Ok(())
}
