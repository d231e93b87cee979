//! Per-user named playlists, persisted to a single JSON file.
//!
//! The store is keyed by user id, then playlist name. Every mutating
//! operation rewrites the whole file. Benign conflicts (duplicate playlist,
//! duplicate track) are reported as boolean results, not errors.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::library::Track;
use crate::storage;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub name: String,
    pub tracks: Vec<Track>,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
}

type UserPlaylists = HashMap<String, Playlist>;

pub struct PlaylistStore {
    file: PathBuf,
    playlists: HashMap<String, UserPlaylists>,
}

impl PlaylistStore {
    /// Opens the store, loading existing playlists if the file is present.
    /// An unreadable file is logged and treated as empty rather than
    /// aborting startup.
    pub async fn open(file: PathBuf) -> Self {
        let playlists = match storage::read_json(&file).await {
            Ok(Some(playlists)) => playlists,
            Ok(None) => HashMap::new(),
            Err(e) => {
                warn!("Playlist file unreadable: {e:#}, starting empty");
                HashMap::new()
            }
        };

        Self { file, playlists }
    }

    /// Creates an empty playlist. `false` if the user already has one with
    /// that name.
    pub async fn create(&mut self, user_id: &str, name: &str) -> bool {
        let user = self.playlists.entry(user_id.to_string()).or_default();

        if user.contains_key(name) {
            return false;
        }

        user.insert(
            name.to_string(),
            Playlist {
                name: name.to_string(),
                tracks: Vec::new(),
                created_at: Utc::now().to_rfc3339(),
            },
        );

        info!("📋 Playlist '{name}' created for user {user_id}");
        self.persist().await;
        true
    }

    /// Appends a track. `false` if the user or playlist does not exist.
    /// Adding a track that is already present (by id) is a no-op success.
    pub async fn add_track(&mut self, user_id: &str, name: &str, track: Track) -> bool {
        let Some(playlist) = self
            .playlists
            .get_mut(user_id)
            .and_then(|user| user.get_mut(name))
        else {
            return false;
        };

        if playlist.tracks.iter().any(|t| t.id == track.id) {
            return true;
        }

        playlist.tracks.push(track);
        self.persist().await;
        true
    }

    /// Removes every entry matching the id. `false` if the user or playlist
    /// does not exist; removing an absent track is a no-op success.
    pub async fn remove_track(&mut self, user_id: &str, name: &str, track_id: &str) -> bool {
        let Some(playlist) = self
            .playlists
            .get_mut(user_id)
            .and_then(|user| user.get_mut(name))
        else {
            return false;
        };

        playlist.tracks.retain(|t| t.id != track_id);
        self.persist().await;
        true
    }

    pub fn get(&self, user_id: &str, name: &str) -> Option<&Playlist> {
        self.playlists.get(user_id)?.get(name)
    }

    /// All playlists for a user; empty when the user has none.
    pub fn get_all(&self, user_id: &str) -> UserPlaylists {
        self.playlists.get(user_id).cloned().unwrap_or_default()
    }

    /// Deletes a playlist. `false` if it does not exist.
    pub async fn delete(&mut self, user_id: &str, name: &str) -> bool {
        let removed = self
            .playlists
            .get_mut(user_id)
            .and_then(|user| user.remove(name))
            .is_some();

        if removed {
            info!("🗑️ Playlist '{name}' deleted for user {user_id}");
            self.persist().await;
        }
        removed
    }

    async fn persist(&self) {
        if let Err(e) = storage::write_json(&self.file, &self.playlists).await {
            warn!("Could not persist playlists: {e:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn track(id: &str) -> Track {
        Track {
            id: id.to_string(),
            title: format!("Track {id}"),
            artist: "Artist".to_string(),
            album: "Album".to_string(),
            url: None,
            file_path: Some(format!("music/{id}.mp3")),
            duration: "200".to_string(),
            thumbnail: None,
        }
    }

    async fn store() -> (tempfile::TempDir, PlaylistStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = PlaylistStore::open(dir.path().join("playlists.json")).await;
        (dir, store)
    }

    #[tokio::test]
    async fn create_rejects_duplicates() {
        let (_dir, mut store) = store().await;

        assert!(store.create("42", "favorites").await);
        assert!(!store.create("42", "favorites").await);
        // Same name under a different user is fine.
        assert!(store.create("43", "favorites").await);
    }

    #[tokio::test]
    async fn add_track_is_idempotent_by_id() {
        let (_dir, mut store) = store().await;
        store.create("42", "favorites").await;

        assert!(store.add_track("42", "favorites", track("a")).await);
        assert!(store.add_track("42", "favorites", track("a")).await);

        assert_eq!(store.get("42", "favorites").unwrap().tracks.len(), 1);
    }

    #[tokio::test]
    async fn add_track_fails_for_missing_playlist() {
        let (_dir, mut store) = store().await;

        assert!(!store.add_track("42", "nope", track("a")).await);
        store.create("42", "favorites").await;
        assert!(!store.add_track("42", "nope", track("a")).await);
    }

    #[tokio::test]
    async fn remove_track_removes_all_matches() {
        let (_dir, mut store) = store().await;
        store.create("42", "mix").await;
        store.add_track("42", "mix", track("a")).await;
        store.add_track("42", "mix", track("b")).await;

        assert!(store.remove_track("42", "mix", "a").await);
        let playlist = store.get("42", "mix").unwrap();
        assert_eq!(playlist.tracks.len(), 1);
        assert_eq!(playlist.tracks[0].id, "b");

        // Absent id is still a success.
        assert!(store.remove_track("42", "mix", "zzz").await);
    }

    #[tokio::test]
    async fn delete_reports_missing() {
        let (_dir, mut store) = store().await;
        store.create("42", "mix").await;

        assert!(store.delete("42", "mix").await);
        assert!(!store.delete("42", "mix").await);
        assert!(store.get("42", "mix").is_none());
    }

    #[tokio::test]
    async fn store_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("playlists.json");

        let mut store = PlaylistStore::open(path.clone()).await;
        store.create("42", "mix").await;
        store.add_track("42", "mix", track("a")).await;
        store.add_track("42", "mix", track("b")).await;
        store.create("43", "other").await;

        let reloaded = PlaylistStore::open(path).await;
        assert_eq!(reloaded.playlists, store.playlists);
        assert_eq!(reloaded.get("42", "mix").unwrap().tracks.len(), 2);
        assert_eq!(reloaded.get_all("43").len(), 1);
    }
}
