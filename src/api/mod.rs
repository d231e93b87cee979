//! Companion HTTP API exposing read-only player state and basic remote
//! controls alongside the Discord surface.

use std::{collections::HashMap, sync::Arc};

use anyhow::Result;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use serenity::model::id::GuildId;
use tracing::info;

use crate::{
    audio::{LoopMode, Player, SessionSnapshot},
    library::{MusicLibrary, Track},
    playlists::PlaylistStore,
};

#[derive(Clone)]
pub struct ApiState {
    pub library: Arc<tokio::sync::RwLock<MusicLibrary>>,
    pub playlists: Arc<tokio::sync::Mutex<PlaylistStore>>,
    pub player: Arc<Player>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/player/{guild_id}", get(player_state))
        .route("/api/library", get(library_tracks))
        .route("/api/search", get(search_tracks))
        .route("/api/playlists/{user_id}", get(user_playlists))
        .route("/api/server", get(server_url).post(update_server_url))
        .route("/api/control/{guild_id}/{action}", post(control))
        .with_state(state)
}

/// Binds the API listener and serves forever.
pub async fn serve(state: ApiState, port: u16) -> Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🌐 Web API listening on {}", addr);

    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn player_state(
    State(state): State<ApiState>,
    Path(guild_id): Path<u64>,
) -> Result<Json<SessionSnapshot>, StatusCode> {
    state
        .player
        .snapshot(GuildId::new(guild_id))
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn library_tracks(State(state): State<ApiState>) -> Json<Vec<Track>> {
    let library = state.library.read().await;
    Json(library.all().to_vec())
}

#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

async fn search_tracks(
    State(state): State<ApiState>,
    Query(params): Query<SearchParams>,
) -> Json<Vec<Track>> {
    let library = state.library.read().await;
    Json(library.search(&params.q))
}

async fn user_playlists(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
) -> Json<HashMap<String, crate::playlists::Playlist>> {
    let playlists = state.playlists.lock().await;
    Json(playlists.get_all(&user_id))
}

async fn server_url(State(state): State<ApiState>) -> Json<Value> {
    Json(json!({ "server_url": state.player.resolver().server_url() }))
}

#[derive(Deserialize)]
struct ServerBody {
    #[serde(default)]
    url: String,
}

/// Swaps the music server base URL used for file-path resolution. The web
/// front end drives this alongside the `setserver` command.
async fn update_server_url(
    State(state): State<ApiState>,
    Json(body): Json<ServerBody>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !crate::sources::is_http_url(&body.url) {
        return Err(bad_request("Invalid URL")());
    }

    state.player.resolver().set_server_url(&body.url);
    Ok(Json(json!({ "server_url": state.player.resolver().server_url() })))
}

#[derive(Deserialize)]
struct ControlBody {
    value: Option<f64>,
}

async fn control(
    State(state): State<ApiState>,
    Path((guild_id, action)): Path<(u64, String)>,
    body: Option<Json<ControlBody>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let guild_id = GuildId::new(guild_id);
    let value = body.and_then(|Json(b)| b.value);

    let result = match action.as_str() {
        "skip" => state.player.skip(guild_id).map(|track| {
            json!({ "skipped": track.title })
        }),
        "stop" => {
            state.player.stop(guild_id);
            Ok(json!({ "stopped": true }))
        }
        "volume" => {
            let volume = value.ok_or_else(bad_request("Missing volume value"))? as f32;
            state
                .player
                .set_volume(guild_id, volume)
                .map(|()| json!({ "volume": volume }))
        }
        "loop" => {
            let index = value.ok_or_else(bad_request("Missing loop mode value"))? as i64;
            LoopMode::from_index(index).map(|mode| {
                state.player.set_loop(guild_id, mode);
                json!({ "loop_mode": mode.as_index() })
            })
        }
        _ => {
            return Err(bad_request("Unknown action")());
        }
    };

    match result {
        Ok(payload) => Ok(Json(json!({
            "result": payload,
            "player": state.player.snapshot(guild_id),
        }))),
        Err(e) => Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": e.to_string() })),
        )),
    }
}

fn bad_request(message: &str) -> impl Fn() -> (StatusCode, Json<Value>) + '_ {
    move || (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    async fn test_state(dir: &tempfile::TempDir) -> ApiState {
        let config = Config {
            discord_token: "token".to_string(),
            application_id: 1,
            guild_id: None,
            music_server_url: "http://localhost:3000".to_string(),
            default_volume: 1.0,
            max_queue_size: 500,
            api_port: 0,
            data_dir: dir.path().to_path_buf(),
        };

        ApiState {
            library: Arc::new(tokio::sync::RwLock::new(MusicLibrary::with_tracks(vec![]))),
            playlists: Arc::new(tokio::sync::Mutex::new(
                PlaylistStore::open(dir.path().join("playlists.json")).await,
            )),
            player: Arc::new(Player::new(&config)),
        }
    }

    #[tokio::test]
    async fn router_builds_with_all_routes() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir).await;

        let _ = router(state);
    }

    #[tokio::test]
    async fn server_endpoint_reports_and_updates_the_base_url() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir).await;

        let Json(current) = server_url(State(state.clone())).await;
        assert_eq!(current["server_url"], "http://localhost:3000");

        let body = ServerBody {
            url: "http://music.lan:8080/".to_string(),
        };
        let updated = update_server_url(State(state.clone()), Json(body))
            .await
            .unwrap();
        assert_eq!(updated.0["server_url"], "http://music.lan:8080");
        assert_eq!(state.player.resolver().server_url(), "http://music.lan:8080");
    }

    #[tokio::test]
    async fn server_endpoint_rejects_non_http_urls() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir).await;

        let body = ServerBody {
            url: "ftp://music.lan".to_string(),
        };
        let err = update_server_url(State(state.clone()), Json(body))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
        // Base URL is untouched on rejection.
        assert_eq!(state.player.resolver().server_url(), "http://localhost:3000");
    }
}
