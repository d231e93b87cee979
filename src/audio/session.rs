//! Per-guild playback state machine.
//!
//! A [`Session`] owns the pending queue, the current track, the playing flag,
//! the volume gain and the loop mode. It is a plain synchronous state
//! machine: the [`Player`](crate::audio::player::Player) wraps each session
//! in a mutex and drives songbird from its transitions, so user commands and
//! driver completion callbacks never interleave for the same guild.

use std::collections::VecDeque;

use rand::seq::SliceRandom;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::library::Track;

/// Errors surfaced to the caller without mutating session state.
#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("volume must be between 0.0 and 2.0, got {0}")]
    VolumeOutOfRange(f32),
    #[error("invalid loop mode {0}, use 0=off, 1=track, 2=queue")]
    InvalidLoopMode(i64),
    #[error("invalid position {position}, queue has {len} items")]
    PositionOutOfRange { position: usize, len: usize },
    #[error("queue is full (maximum {0} tracks)")]
    QueueFull(usize),
    #[error("queue is empty")]
    EmptyQueue,
    #[error("nothing is playing")]
    NothingPlaying,
    #[error("not connected to a voice channel")]
    NotConnected,
}

/// What gets re-enqueued when the current track finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMode {
    #[default]
    Off,
    Track,
    Queue,
}

impl LoopMode {
    /// Parses the wire representation (0=off, 1=track, 2=queue).
    pub fn from_index(index: i64) -> Result<Self, SessionError> {
        match index {
            0 => Ok(Self::Off),
            1 => Ok(Self::Track),
            2 => Ok(Self::Queue),
            other => Err(SessionError::InvalidLoopMode(other)),
        }
    }

    pub fn as_index(self) -> u8 {
        match self {
            Self::Off => 0,
            Self::Track => 1,
            Self::Queue => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Track => "track",
            Self::Queue => "queue",
        }
    }
}

/// Immutable view of a session for embeds and the HTTP API. Field names
/// match what the web front end consumes.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionSnapshot {
    pub current_track: Option<Track>,
    pub queue: Vec<Track>,
    pub is_playing: bool,
    pub volume: f32,
    pub loop_mode: u8,
}

#[derive(Debug)]
pub struct Session {
    queue: VecDeque<Track>,
    current: Option<Track>,
    playing: bool,
    volume: f32,
    loop_mode: LoopMode,
    max_queue_size: usize,
}

impl Session {
    pub fn new(default_volume: f32, max_queue_size: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            current: None,
            playing: false,
            volume: default_volume.clamp(0.0, 2.0),
            loop_mode: LoopMode::Off,
            max_queue_size,
        }
    }

    /// Appends a track, or inserts it at the front when `play_next` is set
    /// and something is already waiting. The caller starts playback with
    /// [`Self::next_track`] if the session was idle.
    pub fn enqueue(&mut self, track: Track, play_next: bool) -> Result<(), SessionError> {
        if self.queue.len() >= self.max_queue_size {
            return Err(SessionError::QueueFull(self.max_queue_size));
        }

        if play_next && !self.queue.is_empty() {
            self.queue.push_front(track);
        } else {
            self.queue.push_back(track);
        }
        Ok(())
    }

    /// Claims the right to start the driver. Returns `false` when the
    /// session is already playing (or another caller claimed the start),
    /// so concurrent enqueues drive playback at most once. The flag is
    /// reconciled by [`Self::next_track`] and [`Self::stop`].
    pub fn begin_playback(&mut self) -> bool {
        if self.playing {
            return false;
        }
        self.playing = true;
        true
    }

    /// Advances the state machine and returns the track to start, if any.
    ///
    /// Loop handling happens first: `Track` mode pushes the current track
    /// back to the front once the queue drains, `Queue` mode cycles it to
    /// the back. An empty queue after that means the session goes idle and
    /// the current track is cleared.
    pub fn next_track(&mut self) -> Option<Track> {
        match self.loop_mode {
            LoopMode::Track => {
                if let Some(current) = &self.current {
                    if self.queue.is_empty() {
                        self.queue.push_front(current.clone());
                    }
                }
            }
            LoopMode::Queue => {
                if let Some(current) = &self.current {
                    self.queue.push_back(current.clone());
                }
            }
            LoopMode::Off => {}
        }

        match self.queue.pop_front() {
            Some(track) => {
                debug!("▶️ Next up: {}", track.title);
                self.current = Some(track.clone());
                self.playing = true;
                Some(track)
            }
            None => {
                self.current = None;
                self.playing = false;
                None
            }
        }
    }

    /// Clears everything: pending queue, current track and the playing flag.
    pub fn stop(&mut self) {
        self.queue.clear();
        self.current = None;
        self.playing = false;
    }

    /// Empties the pending queue without touching the current track.
    /// Returns the number of dropped entries.
    pub fn clear_queue(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        dropped
    }

    /// Permutes the pending queue in place. Fails on an empty queue.
    pub fn shuffle(&mut self) -> Result<usize, SessionError> {
        if self.queue.is_empty() {
            return Err(SessionError::EmptyQueue);
        }

        let mut items: Vec<Track> = self.queue.drain(..).collect();
        items.shuffle(&mut rand::thread_rng());
        self.queue.extend(items);
        Ok(self.queue.len())
    }

    /// Removes the track at a 1-based queue position.
    pub fn remove_at(&mut self, position: usize) -> Result<Track, SessionError> {
        if position == 0 || position > self.queue.len() {
            return Err(SessionError::PositionOutOfRange {
                position,
                len: self.queue.len(),
            });
        }

        self.queue
            .remove(position - 1)
            .ok_or(SessionError::PositionOutOfRange {
                position,
                len: self.queue.len(),
            })
    }

    /// Linear gain in [0.0, 2.0], inclusive. Applies from the next track
    /// start; the live stream is not re-gained.
    pub fn set_volume(&mut self, volume: f32) -> Result<(), SessionError> {
        if !(0.0..=2.0).contains(&volume) || volume.is_nan() {
            return Err(SessionError::VolumeOutOfRange(volume));
        }
        self.volume = volume;
        Ok(())
    }

    pub fn set_loop(&mut self, mode: LoopMode) {
        self.loop_mode = mode;
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            current_track: self.current.clone(),
            queue: self.queue.iter().cloned().collect(),
            is_playing: self.playing,
            volume: self.volume,
            loop_mode: self.loop_mode.as_index(),
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
            url: Some(format!("http://localhost:3000/music/{id}.mp3")),
            file_path: None,
            duration: "120".to_string(),
            thumbnail: None,
        }
    }

    fn session() -> Session {
        Session::new(1.0, 500)
    }

    fn queue_ids(s: &Session) -> Vec<String> {
        s.snapshot().queue.into_iter().map(|t| t.id).collect()
    }

    #[test]
    fn enqueue_on_idle_session_starts_that_track() {
        let mut s = session();
        s.enqueue(track("a"), false).unwrap();
        assert!(!s.is_playing());

        let started = s.next_track().unwrap();
        assert_eq!(started.id, "a");
        assert!(s.is_playing());
        assert_eq!(s.current().unwrap().id, "a");
        assert_eq!(s.queue_len(), 0);
    }

    #[test]
    fn play_next_inserts_at_front_only_when_queue_nonempty() {
        let mut s = session();
        // Empty queue: play_next degenerates to append.
        s.enqueue(track("a"), true).unwrap();
        s.enqueue(track("b"), false).unwrap();
        s.enqueue(track("c"), true).unwrap();

        assert_eq!(queue_ids(&s), vec!["c", "a", "b"]);
    }

    #[test]
    fn queue_cap_is_enforced() {
        let mut s = Session::new(1.0, 2);
        s.enqueue(track("a"), false).unwrap();
        s.enqueue(track("b"), false).unwrap();

        assert_eq!(s.enqueue(track("c"), false), Err(SessionError::QueueFull(2)));
        assert_eq!(s.queue_len(), 2);
    }

    #[test]
    fn exhausted_queue_goes_idle_and_clears_current() {
        let mut s = session();
        s.enqueue(track("a"), false).unwrap();
        s.next_track();

        assert!(s.next_track().is_none());
        assert!(!s.is_playing());
        assert!(s.current().is_none());
    }

    #[test]
    fn begin_playback_claims_the_start_exactly_once() {
        let mut s = session();
        s.enqueue(track("a"), false).unwrap();

        // Two racing enqueues both land here; only the first one may
        // drive the call.
        assert!(s.begin_playback());
        assert!(!s.begin_playback());

        assert_eq!(s.next_track().unwrap().id, "a");
        assert!(!s.begin_playback());

        // Exhausting the queue releases the claim.
        assert!(s.next_track().is_none());
        s.enqueue(track("b"), false).unwrap();
        assert!(s.begin_playback());
    }

    #[test]
    fn loop_track_repeats_current_indefinitely() {
        let mut s = session();
        s.enqueue(track("a"), false).unwrap();
        s.next_track();
        s.set_loop(LoopMode::Track);

        for _ in 0..3 {
            let again = s.next_track().unwrap();
            assert_eq!(again.id, "a");
            assert_eq!(s.queue_len(), 0);
        }
    }

    #[test]
    fn loop_track_prefers_pending_queue() {
        let mut s = session();
        s.enqueue(track("a"), false).unwrap();
        s.next_track();
        s.set_loop(LoopMode::Track);
        s.enqueue(track("b"), false).unwrap();

        // Queue non-empty, so the loop rule does not re-push the current.
        assert_eq!(s.next_track().unwrap().id, "b");
    }

    #[test]
    fn loop_queue_cycles_current_to_back() {
        let mut s = session();
        s.enqueue(track("c"), false).unwrap();
        s.next_track(); // current = c
        s.enqueue(track("a"), false).unwrap();
        s.enqueue(track("b"), false).unwrap();
        s.set_loop(LoopMode::Queue);

        let next = s.next_track().unwrap();
        assert_eq!(next.id, "a");
        assert_eq!(queue_ids(&s), vec!["b", "c"]);
    }

    #[test]
    fn remove_at_is_one_based_and_range_checked() {
        let mut s = session();
        s.enqueue(track("a"), false).unwrap();
        s.enqueue(track("b"), false).unwrap();

        assert_eq!(
            s.remove_at(0),
            Err(SessionError::PositionOutOfRange { position: 0, len: 2 })
        );
        assert_eq!(
            s.remove_at(3),
            Err(SessionError::PositionOutOfRange { position: 3, len: 2 })
        );

        let removed = s.remove_at(2).unwrap();
        assert_eq!(removed.id, "b");
        assert_eq!(queue_ids(&s), vec!["a"]);
    }

    #[test]
    fn volume_bounds_are_inclusive() {
        let mut s = session();
        assert!(s.set_volume(0.0).is_ok());
        assert!(s.set_volume(2.0).is_ok());
        assert_eq!(s.set_volume(2.5), Err(SessionError::VolumeOutOfRange(2.5)));
        assert_eq!(s.set_volume(-0.1), Err(SessionError::VolumeOutOfRange(-0.1)));
        // Rejected values leave the previous volume intact.
        assert_eq!(s.volume(), 2.0);
    }

    #[test]
    fn loop_mode_parses_only_known_indices() {
        assert_eq!(LoopMode::from_index(0), Ok(LoopMode::Off));
        assert_eq!(LoopMode::from_index(1), Ok(LoopMode::Track));
        assert_eq!(LoopMode::from_index(2), Ok(LoopMode::Queue));
        assert_eq!(LoopMode::from_index(3), Err(SessionError::InvalidLoopMode(3)));
    }

    #[test]
    fn stop_clears_everything() {
        let mut s = session();
        s.enqueue(track("a"), false).unwrap();
        s.next_track();
        s.enqueue(track("b"), false).unwrap();

        s.stop();
        assert!(!s.is_playing());
        assert!(s.current().is_none());
        assert_eq!(s.queue_len(), 0);
    }

    #[test]
    fn clear_queue_keeps_current_track() {
        let mut s = session();
        s.enqueue(track("a"), false).unwrap();
        s.next_track();
        s.enqueue(track("b"), false).unwrap();
        s.enqueue(track("c"), false).unwrap();

        assert_eq!(s.clear_queue(), 2);
        assert_eq!(s.current().unwrap().id, "a");
        assert!(s.is_playing());
    }

    #[test]
    fn shuffle_requires_pending_tracks() {
        let mut s = session();
        assert_eq!(s.shuffle(), Err(SessionError::EmptyQueue));

        for id in ["a", "b", "c", "d"] {
            s.enqueue(track(id), false).unwrap();
        }
        assert_eq!(s.shuffle(), Ok(4));

        let mut ids = queue_ids(&s);
        ids.sort();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn snapshot_reflects_state() {
        let mut s = session();
        s.enqueue(track("a"), false).unwrap();
        s.next_track();
        s.enqueue(track("b"), false).unwrap();
        s.set_loop(LoopMode::Queue);
        s.set_volume(1.5).unwrap();

        let snap = s.snapshot();
        assert_eq!(snap.current_track.unwrap().id, "a");
        assert_eq!(snap.queue.len(), 1);
        assert!(snap.is_playing);
        assert_eq!(snap.volume, 1.5);
        assert_eq!(snap.loop_mode, 2);
    }
}
