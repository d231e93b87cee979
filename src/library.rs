//! Track catalog backed by the music server.
//!
//! The catalog is loaded wholesale from `GET <server>/api/music` and cached to
//! a local JSON file so the bot keeps working when the server is down. Search
//! is a case-insensitive substring match ranked by a fixed field weighting.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::storage;

/// Maximum results for a ranked search.
const SEARCH_LIMIT: usize = 15;
/// Maximum results when browsing with an empty query.
const BROWSE_LIMIT: usize = 20;

/// Field weights for relevance scoring. Additive and independent, so a track
/// matching in all three fields scores 23.
const TITLE_WEIGHT: u32 = 10;
const ARTIST_WEIGHT: u32 = 8;
const ALBUM_WEIGHT: u32 = 5;

fn unknown() -> String {
    "Unknown".to_string()
}

/// A single catalog entry. Immutable once resolved; playlist and queue
/// entries are independent copies of these records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    #[serde(default = "unknown")]
    pub title: String,
    #[serde(default = "unknown")]
    pub artist: String,
    #[serde(default = "unknown")]
    pub album: String,
    /// Direct playable URL, if the server provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Server-relative path, resolved against the configured base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    /// Duration in seconds as reported by the server, or "Unknown".
    #[serde(default = "unknown")]
    pub duration: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

impl Track {
    /// Duration in seconds, when the server reported a numeric one.
    pub fn duration_secs(&self) -> Option<u64> {
        self.duration.parse().ok()
    }

    /// Ad-hoc track for a user-supplied URL (the `playurl` command and the
    /// web API). The id is derived from the URL so duplicate suppression in
    /// playlists still works.
    pub fn from_url(url: &str) -> Self {
        use std::hash::{DefaultHasher, Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        url.hash(&mut hasher);

        let title = url
            .rsplit('/')
            .find(|part| !part.is_empty())
            .unwrap_or("Unknown URL Track")
            .to_string();

        Self {
            id: format!("url_{:08x}", hasher.finish() as u32),
            title,
            artist: "URL Source".to_string(),
            album: "Direct URL".to_string(),
            url: Some(url.to_string()),
            file_path: None,
            duration: unknown(),
            thumbnail: None,
        }
    }
}

/// In-memory catalog with remote-fetch / cache-file fallback.
pub struct MusicLibrary {
    server_url: String,
    cache_file: PathBuf,
    client: reqwest::Client,
    tracks: Vec<Track>,
}

impl MusicLibrary {
    pub fn new(server_url: impl Into<String>, cache_file: PathBuf) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self {
            server_url: server_url.into().trim_end_matches('/').to_string(),
            cache_file,
            client,
            tracks: Vec::new(),
        }
    }

    /// Initial load: remote endpoint, then cache file, then empty. Never
    /// fails; the catalog always ends up in a defined state.
    pub async fn load(&mut self) {
        match self.fetch_remote().await {
            Ok(tracks) => {
                info!("📚 Library loaded from server: {} tracks", tracks.len());
                self.tracks = tracks;
                return;
            }
            Err(e) => warn!("Library fetch failed: {e:#}, trying local cache"),
        }

        match storage::read_json::<Vec<Track>>(&self.cache_file).await {
            Ok(Some(tracks)) => {
                info!("📂 Library loaded from cache: {} tracks", tracks.len());
                self.tracks = tracks;
            }
            Ok(None) => {
                info!("📭 No library cache found, starting empty");
                self.tracks = Vec::new();
                self.persist().await;
            }
            Err(e) => {
                warn!("Library cache unreadable: {e:#}, starting empty");
                self.tracks = Vec::new();
            }
        }
    }

    /// Re-fetches from the server. On success the in-memory catalog is
    /// replaced and persisted; on failure prior state is kept.
    pub async fn refresh(&mut self) -> bool {
        match self.fetch_remote().await {
            Ok(tracks) => {
                info!("🔄 Library refreshed: {} tracks", tracks.len());
                self.tracks = tracks;
                self.persist().await;
                true
            }
            Err(e) => {
                warn!("Library refresh failed: {e:#}");
                false
            }
        }
    }

    async fn fetch_remote(&self) -> Result<Vec<Track>> {
        let api_url = format!("{}/api/music", self.server_url);
        let response = self.client.get(&api_url).send().await?;

        if !response.status().is_success() {
            anyhow::bail!("server returned {}", response.status());
        }

        Ok(response.json().await?)
    }

    async fn persist(&self) {
        if let Err(e) = storage::write_json(&self.cache_file, &self.tracks).await {
            warn!("Could not persist library cache: {e:#}");
        }
    }

    /// Case-insensitive substring search over title, artist and album.
    ///
    /// An empty query browses the first [`BROWSE_LIMIT`] entries in catalog
    /// order. Otherwise matches are ranked by [`Self::relevance`] and capped
    /// at [`SEARCH_LIMIT`]; ties keep catalog order (stable sort).
    pub fn search(&self, query: &str) -> Vec<Track> {
        let query = query.trim().to_lowercase();

        if query.is_empty() {
            return self.tracks.iter().take(BROWSE_LIMIT).cloned().collect();
        }

        let mut results: Vec<&Track> = self
            .tracks
            .iter()
            .filter(|track| {
                let haystack =
                    format!("{} {} {}", track.title, track.artist, track.album).to_lowercase();
                haystack.contains(&query)
            })
            .collect();

        results.sort_by_key(|track| std::cmp::Reverse(Self::relevance(track, &query)));
        results.into_iter().take(SEARCH_LIMIT).cloned().collect()
    }

    fn relevance(track: &Track, query: &str) -> u32 {
        let mut score = 0;
        if track.title.to_lowercase().contains(query) {
            score += TITLE_WEIGHT;
        }
        if track.artist.to_lowercase().contains(query) {
            score += ARTIST_WEIGHT;
        }
        if track.album.to_lowercase().contains(query) {
            score += ALBUM_WEIGHT;
        }
        score
    }

    /// Linear scan by stable identifier.
    pub fn get_by_id(&self, id: &str) -> Option<&Track> {
        self.tracks.iter().find(|track| track.id == id)
    }

    pub fn all(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn with_tracks(tracks: Vec<Track>) -> Self {
        let mut library = Self::new("http://localhost:3000", PathBuf::from("library.json"));
        library.tracks = tracks;
        library
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    pub(crate) fn track(id: &str, title: &str, artist: &str, album: &str) -> Track {
        Track {
            id: id.to_string(),
            title: title.to_string(),
            artist: artist.to_string(),
            album: album.to_string(),
            url: None,
            file_path: Some(format!("music/{id}.mp3")),
            duration: "180".to_string(),
            thumbnail: None,
        }
    }

    fn sample_library() -> MusicLibrary {
        MusicLibrary::with_tracks(vec![
            track("1", "Blue Moon", "Sam", "Standards"),
            track("2", "Moon River", "Audrey", "Breakfast"),
            track("3", "Blue Train", "John Coltrane", "Blue Train"),
            track("4", "Something Else", "Sam", "Blue Notes"),
        ])
    }

    #[test]
    fn empty_query_browses_in_catalog_order() {
        let tracks: Vec<Track> = (0..30)
            .map(|i| track(&i.to_string(), &format!("Song {i}"), "A", "B"))
            .collect();
        let library = MusicLibrary::with_tracks(tracks);

        let results = library.search("");
        assert_eq!(results.len(), 20);
        assert_eq!(results[0].title, "Song 0");
        assert_eq!(results[19].title, "Song 19");
    }

    #[test]
    fn search_never_exceeds_limit() {
        let tracks: Vec<Track> = (0..40)
            .map(|i| track(&i.to_string(), &format!("Common Song {i}"), "A", "B"))
            .collect();
        let library = MusicLibrary::with_tracks(tracks);

        assert_eq!(library.search("common").len(), 15);
    }

    #[test]
    fn relevance_weights_are_fixed_and_additive() {
        let blue_moon = track("1", "Blue Moon", "Sam", "Standards");
        assert_eq!(MusicLibrary::relevance(&blue_moon, "blue"), 10);
        assert_eq!(MusicLibrary::relevance(&blue_moon, "sam"), 8);

        let all_fields = track("2", "Blue", "Blue", "Blue");
        assert_eq!(MusicLibrary::relevance(&all_fields, "blue"), 23);

        let album_only = track("3", "Something Else", "Sam", "Blue Notes");
        assert_eq!(MusicLibrary::relevance(&album_only, "blue"), 5);
    }

    #[test]
    fn results_sorted_by_score_descending() {
        let library = sample_library();
        let results = library.search("blue");

        // Title matches first, then album-only match.
        assert_eq!(results[0].id, "1");
        assert_eq!(results[1].id, "3");
        assert_eq!(results[2].id, "4");
    }

    #[test]
    fn ties_preserve_catalog_order() {
        let library = MusicLibrary::with_tracks(vec![
            track("a", "Rain One", "X", "Y"),
            track("b", "Rain Two", "X", "Y"),
            track("c", "Rain Three", "X", "Y"),
        ]);

        let results = library.search("rain");
        let ids: Vec<&str> = results.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn search_is_case_insensitive() {
        let library = sample_library();
        assert_eq!(library.search("BLUE MOON").len(), 1);
        assert_eq!(library.search("coltrane").len(), 1);
    }

    #[test]
    fn get_by_id_returns_first_match() {
        let library = sample_library();
        assert_eq!(library.get_by_id("3").map(|t| t.title.as_str()), Some("Blue Train"));
        assert_eq!(library.get_by_id("missing"), None);
    }
}
