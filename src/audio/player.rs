//! Guild session registry and songbird driver glue.
//!
//! [`Player`] owns one [`Session`] per guild (created on first use, torn
//! down on voice leave) plus the live songbird pieces: the `Call` handle
//! registered on join and the `TrackHandle` of whatever is streaming. All
//! session mutations go through the per-guild mutex, so a user `skip` and a
//! driver completion event never race on the same state.

use std::sync::Arc;

use anyhow::Result;
use dashmap::DashMap;
use parking_lot::Mutex;
use serenity::model::id::GuildId;
use songbird::{
    tracks::TrackHandle, Call, Event, EventContext, EventHandler as VoiceEventHandler, TrackEvent,
};
use tracing::{error, info, warn};

use crate::{
    audio::session::{LoopMode, Session, SessionError, SessionSnapshot},
    config::Config,
    library::Track,
    sources::SourceResolver,
};

/// How many tracks a single `advance` will try before giving up and parking
/// the session. Keeps a queue of dead entries from spinning forever.
const MAX_CONSECUTIVE_FAILURES: usize = 5;

pub struct Player {
    sessions: DashMap<GuildId, Arc<Mutex<Session>>>,
    calls: DashMap<GuildId, Arc<tokio::sync::Mutex<Call>>>,
    current: DashMap<GuildId, TrackHandle>,
    resolver: SourceResolver,
    default_volume: f32,
    max_queue_size: usize,
}

impl Player {
    pub fn new(config: &Config) -> Self {
        Self {
            sessions: DashMap::new(),
            calls: DashMap::new(),
            current: DashMap::new(),
            resolver: SourceResolver::new(config.music_server_url.clone()),
            default_volume: config.default_volume,
            max_queue_size: config.max_queue_size,
        }
    }

    pub fn resolver(&self) -> &SourceResolver {
        &self.resolver
    }

    /// Registers the voice connection for a guild after a join.
    pub fn register_call(&self, guild_id: GuildId, call: Arc<tokio::sync::Mutex<Call>>) {
        self.calls.insert(guild_id, call);
    }

    pub fn is_connected(&self, guild_id: GuildId) -> bool {
        self.calls.contains_key(&guild_id)
    }

    /// Tears down everything for a guild: stops the stream, drops the
    /// session and forgets the voice connection. Used when leaving a voice
    /// channel or when Discord disconnects the bot.
    pub fn remove_guild(&self, guild_id: GuildId) {
        if let Some((_, handle)) = self.current.remove(&guild_id) {
            let _ = handle.stop();
        }
        self.sessions.remove(&guild_id);
        self.calls.remove(&guild_id);
        info!("🧹 Session torn down for guild {guild_id}");
    }

    fn session(&self, guild_id: GuildId) -> Arc<Mutex<Session>> {
        self.sessions
            .entry(guild_id)
            .or_insert_with(|| {
                Arc::new(Mutex::new(Session::new(
                    self.default_volume,
                    self.max_queue_size,
                )))
            })
            .clone()
    }

    /// Adds a track to the guild's queue; starts playback immediately when
    /// the session is idle. Requires a registered voice connection.
    pub async fn enqueue(
        self: &Arc<Self>,
        guild_id: GuildId,
        track: Track,
        play_next: bool,
    ) -> Result<(), SessionError> {
        if !self.is_connected(guild_id) {
            return Err(SessionError::NotConnected);
        }

        let session = self.session(guild_id);
        // The idle check and the start claim happen in one lock scope, so
        // two concurrent enqueues cannot both decide to drive the call.
        let start = {
            let mut s = session.lock();
            s.enqueue(track, play_next)?;
            s.begin_playback()
        };

        if start {
            if let Err(e) = self.advance(guild_id).await {
                error!("Error starting playback in guild {guild_id}: {e:#}");
            }
        }
        Ok(())
    }

    /// Pulls the next track out of the session and hands it to songbird.
    ///
    /// Invoked when starting fresh and from the driver's end-of-track
    /// events. Tracks that fail to start are skipped with a bounded retry
    /// loop instead of recursing, so a queue full of dead entries cannot
    /// blow the stack.
    pub async fn advance(self: &Arc<Self>, guild_id: GuildId) -> Result<()> {
        let Some(call) = self.calls.get(&guild_id).map(|c| c.clone()) else {
            // Voice connection is gone; park the session.
            if let Some(session) = self.sessions.get(&guild_id) {
                session.lock().stop();
            }
            return Ok(());
        };

        let session = self.session(guild_id);

        for _ in 0..MAX_CONSECUTIVE_FAILURES {
            let (next, volume) = {
                let mut s = session.lock();
                let next = s.next_track();
                (next, s.volume())
            };

            let Some(track) = next else {
                self.current.remove(&guild_id);
                info!("📭 Queue exhausted in guild {guild_id}, going idle");
                return Ok(());
            };

            match self.start_track(guild_id, &track, volume, &call).await {
                Ok(handle) => {
                    info!("🎵 Now playing in guild {guild_id}: {}", track.title);
                    self.current.insert(guild_id, handle);
                    return Ok(());
                }
                Err(e) => {
                    warn!("Track '{}' failed to start: {e:#}, skipping", track.title);
                }
            }
        }

        warn!("Too many consecutive playback failures in guild {guild_id}, stopping");
        session.lock().stop();
        self.current.remove(&guild_id);
        Ok(())
    }

    async fn start_track(
        self: &Arc<Self>,
        guild_id: GuildId,
        track: &Track,
        volume: f32,
        call: &Arc<tokio::sync::Mutex<Call>>,
    ) -> Result<TrackHandle> {
        let input = self.resolver.input_for(track)?;

        let mut call_lock = call.lock().await;
        let handle = call_lock.play_input(input);
        let _ = handle.set_volume(volume);

        // End fires on natural completion and on skip's stop(); Error fires
        // on stream failures. The handler de-duplicates, so registering both
        // cannot double-advance.
        for event in [TrackEvent::End, TrackEvent::Error] {
            handle
                .add_event(
                    Event::Track(event),
                    TrackFinished {
                        player: self.clone(),
                        guild_id,
                        handle: handle.clone(),
                    },
                )
                .map_err(|e| anyhow::anyhow!("registering track event: {e}"))?;
        }

        Ok(handle)
    }

    /// Stops the current stream, which lets the completion event pull the
    /// next track. Fails when nothing is playing.
    pub fn skip(&self, guild_id: GuildId) -> Result<Track, SessionError> {
        let session = self.session(guild_id);
        let current = {
            let s = session.lock();
            if !s.is_playing() {
                return Err(SessionError::NothingPlaying);
            }
            s.current().cloned()
        };

        if let Some(handle) = self.current.get(&guild_id) {
            let _ = handle.stop();
        }
        current.ok_or(SessionError::NothingPlaying)
    }

    /// Clears the queue and current track and silences the driver.
    pub fn stop(&self, guild_id: GuildId) {
        if let Some(session) = self.sessions.get(&guild_id) {
            session.lock().stop();
        }
        // Removed before stop() so the finished-event handler sees a stale
        // handle and does not advance into the now-empty queue.
        if let Some((_, handle)) = self.current.remove(&guild_id) {
            let _ = handle.stop();
        }
        info!("⏹️ Playback stopped in guild {guild_id}");
    }

    pub fn clear_queue(&self, guild_id: GuildId) -> usize {
        self.session(guild_id).lock().clear_queue()
    }

    pub fn shuffle(&self, guild_id: GuildId) -> Result<usize, SessionError> {
        self.session(guild_id).lock().shuffle()
    }

    pub fn remove_at(&self, guild_id: GuildId, position: usize) -> Result<Track, SessionError> {
        self.session(guild_id).lock().remove_at(position)
    }

    pub fn set_volume(&self, guild_id: GuildId, volume: f32) -> Result<(), SessionError> {
        self.session(guild_id).lock().set_volume(volume)
    }

    pub fn set_loop(&self, guild_id: GuildId, mode: LoopMode) {
        self.session(guild_id).lock().set_loop(mode)
    }

    /// Snapshot for embeds and the HTTP API. `None` when the guild has no
    /// session yet.
    pub fn snapshot(&self, guild_id: GuildId) -> Option<SessionSnapshot> {
        self.sessions
            .get(&guild_id)
            .map(|session| session.lock().snapshot())
    }

    pub fn current_track(&self, guild_id: GuildId) -> Option<Track> {
        self.sessions
            .get(&guild_id)
            .and_then(|session| session.lock().current().cloned())
    }
}

/// Driver completion callback: re-enters `advance` exactly once per track.
struct TrackFinished {
    player: Arc<Player>,
    guild_id: GuildId,
    handle: TrackHandle,
}

#[async_trait::async_trait]
impl VoiceEventHandler for TrackFinished {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        // End and Error can both fire for the same track, and stop()
        // deliberately unregisters the handle first. Only the call that
        // removes the live handle advances.
        let ours = self
            .player
            .current
            .remove_if(&self.guild_id, |_, handle| {
                handle.uuid() == self.handle.uuid()
            })
            .is_some();

        if ours {
            if let Err(e) = self.player.advance(self.guild_id).await {
                error!("Error advancing queue in guild {}: {e:#}", self.guild_id);
            }
        }

        None
    }
}
