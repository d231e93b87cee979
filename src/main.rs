use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::SerenityInit;
use std::sync::Arc;
use tracing::{error, info};

mod api;
mod audio;
mod bot;
mod config;
mod library;
mod playlists;
mod sources;
mod storage;
mod ui;

use crate::audio::Player;
use crate::bot::JukeboxBot;
use crate::config::Config;
use crate::library::MusicLibrary;
use crate::playlists::PlaylistStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("jukebox=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Starting Jukebox v{}", env!("CARGO_PKG_VERSION"));

    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check().await;
    }

    let config = Arc::new(Config::load()?);

    // Library: remote catalog with local JSON fallback.
    let mut library = MusicLibrary::new(
        config.music_server_url.clone(),
        config.library_cache_file(),
    );
    library.load().await;
    info!("📚 Library ready with {} tracks", library.len());
    let library = Arc::new(tokio::sync::RwLock::new(library));

    let playlists = Arc::new(tokio::sync::Mutex::new(
        PlaylistStore::open(config.playlists_file()).await,
    ));

    let player = Arc::new(Player::new(&config));

    // Companion web API runs alongside the gateway connection.
    let api_state = api::ApiState {
        library: library.clone(),
        playlists: playlists.clone(),
        player: player.clone(),
    };
    let api_port = config.api_port;
    tokio::spawn(async move {
        if let Err(e) = api::serve(api_state, api_port).await {
            error!("❌ Web API failed: {e:#}");
        }
    });

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let handler = JukeboxBot::new(config.clone(), library, playlists, player);

    let mut client = Client::builder(&config.discord_token, intents)
        .application_id(config.application_id.into())
        .event_handler(handler)
        .register_songbird()
        .await?;

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("⚠️ Shutdown signal received, exiting");
            std::process::exit(0);
        }
    });

    info!("🚀 Connecting to Discord");
    if let Err(why) = client.start().await {
        error!("Client error: {why:?}");
    }

    Ok(())
}

/// Container healthcheck: verifies yt-dlp is on the PATH.
async fn health_check() -> Result<()> {
    let yt_dlp = async_process::Command::new("yt-dlp")
        .arg("--version")
        .output()
        .await?;

    if yt_dlp.status.success() {
        println!("OK");
        Ok(())
    } else {
        anyhow::bail!("yt-dlp not available");
    }
}
