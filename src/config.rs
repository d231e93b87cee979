use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    /// Register slash commands in a single guild (fast propagation, used in
    /// development) instead of globally.
    pub guild_id: Option<u64>,

    // Music server
    pub music_server_url: String,

    // Playback
    pub default_volume: f32,
    pub max_queue_size: usize,

    // Web API
    pub api_port: u16,

    // Paths
    pub data_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            discord_token: std::env::var("DISCORD_TOKEN")?,
            application_id: std::env::var("APPLICATION_ID")?.parse()?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            music_server_url: std::env::var("MUSIC_SERVER_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string())
                .trim_end_matches('/')
                .to_string(),

            default_volume: std::env::var("DEFAULT_VOLUME")
                .unwrap_or_else(|_| "1.0".to_string())
                .parse()?,
            max_queue_size: std::env::var("MAX_QUEUE_SIZE")
                .unwrap_or_else(|_| "500".to_string())
                .parse()?,

            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()?,

            data_dir: std::env::var("DATA_DIR")
                .unwrap_or_else(|_| "data".to_string())
                .into(),
        };

        std::fs::create_dir_all(&config.data_dir)?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.default_volume) {
            anyhow::bail!(
                "Default volume must be between 0.0 and 2.0, got: {}",
                self.default_volume
            );
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if !self.music_server_url.starts_with("http://")
            && !self.music_server_url.starts_with("https://")
        {
            anyhow::bail!(
                "Music server URL must be http(s), got: {}",
                self.music_server_url
            );
        }

        Ok(())
    }

    pub fn library_cache_file(&self) -> PathBuf {
        self.data_dir.join("library.json")
    }

    pub fn playlists_file(&self) -> PathBuf {
        self.data_dir.join("playlists.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            discord_token: "token".to_string(),
            application_id: 1,
            guild_id: None,
            music_server_url: "http://localhost:3000".to_string(),
            default_volume: 1.0,
            max_queue_size: 500,
            api_port: 5000,
            data_dir: "data".into(),
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn volume_outside_gain_range_is_rejected() {
        let mut config = base_config();
        config.default_volume = 2.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn server_url_must_be_http() {
        let mut config = base_config();
        config.music_server_url = "ftp://music".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn data_files_live_under_data_dir() {
        let config = base_config();
        assert_eq!(config.library_cache_file(), PathBuf::from("data/library.json"));
        assert_eq!(config.playlists_file(), PathBuf::from("data/playlists.json"));
    }
}
