//! Source locator resolution.
//!
//! A catalog track carries either a direct URL or a server-relative file
//! path; ad-hoc tracks may point at a YouTube page that has to go through
//! yt-dlp before it yields a playable stream. This module turns a
//! [`Track`] into the songbird [`Input`] the driver streams from.

use anyhow::Result;
use parking_lot::RwLock;
use songbird::input::{HttpRequest, Input, YoutubeDl};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::library::Track;

/// Where a track's audio actually comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// A URL songbird can stream directly.
    Direct(String),
    /// A video page URL that yt-dlp resolves to an audio stream.
    YouTube(String),
}

pub struct SourceResolver {
    client: reqwest::Client,
    /// Base URL for server-relative file paths. Swappable at runtime via
    /// the `setserver` command.
    server_url: RwLock<String>,
}

impl SourceResolver {
    pub fn new(server_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            server_url: RwLock::new(server_url.into().trim_end_matches('/').to_string()),
        }
    }

    pub fn server_url(&self) -> String {
        self.server_url.read().clone()
    }

    pub fn set_server_url(&self, url: &str) {
        *self.server_url.write() = url.trim_end_matches('/').to_string();
    }

    /// Derives the locator for a track: its own URL if present (routed
    /// through yt-dlp for video pages), otherwise its file path joined
    /// against the server base. Tracks with neither are unplayable.
    pub fn locate(&self, track: &Track) -> Result<Locator> {
        if let Some(url) = &track.url {
            if is_youtube_url(url) {
                return Ok(Locator::YouTube(url.clone()));
            }
            return Ok(Locator::Direct(url.clone()));
        }

        if let Some(path) = &track.file_path {
            let base = self.server_url.read();
            return Ok(Locator::Direct(format!(
                "{}/{}",
                base,
                path.trim_start_matches('/')
            )));
        }

        anyhow::bail!("track '{}' has no playable source", track.title)
    }

    /// Builds the songbird input for a track. yt-dlp extraction errors and
    /// dead URLs surface through the driver's track events, where the player
    /// treats them as a failed track and skips forward.
    pub fn input_for(&self, track: &Track) -> Result<Input> {
        match self.locate(track)? {
            Locator::Direct(url) => {
                debug!("🔗 Streaming direct URL for '{}'", track.title);
                Ok(HttpRequest::new(self.client.clone(), url).into())
            }
            Locator::YouTube(url) => {
                debug!("🎬 Extracting audio stream for '{}'", track.title);
                Ok(YoutubeDl::new(self.client.clone(), url).into())
            }
        }
    }
}

/// Recognizes the video-page hosts that need yt-dlp extraction.
pub fn is_youtube_url(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    matches!(
        parsed.host_str(),
        Some("www.youtube.com" | "youtube.com" | "m.youtube.com" | "music.youtube.com" | "youtu.be")
    )
}

/// Validates that a user-supplied URL is plain http(s).
pub fn is_http_url(url: &str) -> bool {
    Url::parse(url)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn server_track(path: &str) -> Track {
        Track {
            id: "1".to_string(),
            title: "Server Track".to_string(),
            artist: "Artist".to_string(),
            album: "Album".to_string(),
            url: None,
            file_path: Some(path.to_string()),
            duration: "100".to_string(),
            thumbnail: None,
        }
    }

    fn url_track(url: &str) -> Track {
        Track {
            url: Some(url.to_string()),
            file_path: None,
            ..server_track("unused")
        }
    }

    #[test]
    fn direct_url_wins_over_file_path() {
        let resolver = SourceResolver::new("http://localhost:3000/");
        let mut track = server_track("music/a.mp3");
        track.url = Some("http://cdn.example.com/a.mp3".to_string());

        assert_eq!(
            resolver.locate(&track).unwrap(),
            Locator::Direct("http://cdn.example.com/a.mp3".to_string())
        );
    }

    #[test]
    fn file_path_joins_against_server_base() {
        let resolver = SourceResolver::new("http://localhost:3000/");

        assert_eq!(
            resolver.locate(&server_track("/music/a.mp3")).unwrap(),
            Locator::Direct("http://localhost:3000/music/a.mp3".to_string())
        );
        assert_eq!(
            resolver.locate(&server_track("music/b.mp3")).unwrap(),
            Locator::Direct("http://localhost:3000/music/b.mp3".to_string())
        );
    }

    #[test]
    fn swapping_server_base_affects_resolution() {
        let resolver = SourceResolver::new("http://localhost:3000");
        resolver.set_server_url("http://music.lan:8080/");

        assert_eq!(
            resolver.locate(&server_track("x.mp3")).unwrap(),
            Locator::Direct("http://music.lan:8080/x.mp3".to_string())
        );
    }

    #[test]
    fn video_pages_route_through_extraction() {
        let resolver = SourceResolver::new("http://localhost:3000");
        let track = url_track("https://www.youtube.com/watch?v=abc123");

        assert_eq!(
            resolver.locate(&track).unwrap(),
            Locator::YouTube("https://www.youtube.com/watch?v=abc123".to_string())
        );
    }

    #[test]
    fn locator_requires_some_source() {
        let resolver = SourceResolver::new("http://localhost:3000");
        let mut track = server_track("x.mp3");
        track.file_path = None;

        assert!(resolver.locate(&track).is_err());
    }

    #[test]
    fn youtube_host_detection() {
        assert!(is_youtube_url("https://youtu.be/abc"));
        assert!(is_youtube_url("https://music.youtube.com/watch?v=abc"));
        assert!(!is_youtube_url("https://example.com/watch?v=abc"));
        assert!(!is_youtube_url("not a url"));
    }

    #[test]
    fn http_url_validation() {
        assert!(is_http_url("http://example.com/a.mp3"));
        assert!(is_http_url("https://example.com/a.mp3"));
        assert!(!is_http_url("ftp://example.com/a.mp3"));
        assert!(!is_http_url("example.com/a.mp3"));
    }
}
