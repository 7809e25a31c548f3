/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - ANIKAI Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Watch page controller.
//!
//! Resolving a playable stream takes three dependent fetches: the episode
//! list (to map an episode number to its id), the server list for the
//! selected category, then the sources for the selected server. Each user
//! action starts a new generation and cancels the previous one, so a slow
//! answer for an old selection can never replace the current one.
//!
//! The controller owns the [`Player`]. A failed transition unloads it and
//! `unmount` (or drop) disposes it.

use crate::api::{ApiError, CatalogApi};
use anikai_protocol::{Category, SourceEntry, TrackEntry};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const EPISODE_NOT_FOUND: &str = "Episode not found";
pub const NO_SOURCES: &str = "No video sources available";

pub const SEEK_STEP_SECS: f64 = 10.0;
pub const VOLUME_STEP: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    LoadingEpisodeList,
    LoadingServers,
    LoadingSource,
    Ready,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleTrack {
    pub file: String,
    pub label: String,
    pub lang: String,
    pub default: bool,
}

/// Player-ready subtitle tracks: missing label/lang get defaults and the
/// first track is selected. Thumbnail sprites are not subtitles.
pub fn subtitle_tracks(tracks: &[TrackEntry]) -> Vec<SubtitleTrack> {
    tracks
        .iter()
        .filter(|t| !t.file.is_empty())
        .filter(|t| !t.kind.as_deref().is_some_and(|k| k.eq_ignore_ascii_case("thumbnails")))
        .enumerate()
        .map(|(i, t)| SubtitleTrack {
            file: t.file.clone(),
            label: non_blank(t.label.as_deref()).unwrap_or("Default").to_string(),
            lang: non_blank(t.lang.as_deref()).unwrap_or("en").to_string(),
            default: i == 0,
        })
        .collect()
}

fn non_blank(v: Option<&str>) -> Option<&str> {
    v.map(str::trim).filter(|v| !v.is_empty())
}

/// Media element driven by the controller.
pub trait Player: Send {
    /// Replaces whatever is loaded.
    fn load(&mut self, source: &SourceEntry, tracks: &[SubtitleTrack]);
    fn unload(&mut self);
    fn dispose(&mut self);

    fn is_paused(&self) -> bool;
    fn play(&mut self);
    fn pause(&mut self);
    fn current_time(&self) -> f64;
    fn duration(&self) -> f64;
    fn seek(&mut self, secs: f64);
    fn volume(&self) -> f64;
    fn set_volume(&mut self, volume: f64);
    fn toggle_mute(&mut self);
    fn toggle_fullscreen(&mut self);
    fn set_playback_rate(&mut self, rate: f64);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyCommand {
    TogglePlay,
    Seek(f64),
    Volume(f64),
    ToggleMute,
    ToggleFullscreen,
    Pause,
    Rate(f64),
}

impl KeyCommand {
    /// Maps a keyboard `key` value. Keys typed into a text field are ignored.
    pub fn from_key(key: &str, in_text_input: bool) -> Option<Self> {
        if in_text_input {
            return None;
        }
        let key = key.to_ascii_lowercase();
        let cmd = match key.as_str() {
            " " | "space" => KeyCommand::TogglePlay,
            "arrowleft" => KeyCommand::Seek(-SEEK_STEP_SECS),
            "arrowright" => KeyCommand::Seek(SEEK_STEP_SECS),
            "arrowup" => KeyCommand::Volume(VOLUME_STEP),
            "arrowdown" => KeyCommand::Volume(-VOLUME_STEP),
            "m" => KeyCommand::ToggleMute,
            "f" => KeyCommand::ToggleFullscreen,
            "0" => KeyCommand::Pause,
            "1" | "2" | "3" | "4" | "5" => {
                let n: f64 = key.parse().ok()?;
                KeyCommand::Rate(n / 2.0)
            }
            _ => return None,
        };
        Some(cmd)
    }

    pub fn apply(self, player: &mut dyn Player) {
        match self {
            KeyCommand::TogglePlay => {
                if player.is_paused() {
                    player.play();
                } else {
                    player.pause();
                }
            }
            KeyCommand::Seek(delta) => {
                let duration = player.duration().max(0.0);
                let target = (player.current_time() + delta).clamp(0.0, duration);
                player.seek(target);
            }
            KeyCommand::Volume(delta) => {
                let v = (player.volume() + delta).clamp(0.0, 1.0);
                player.set_volume(v);
            }
            KeyCommand::ToggleMute => player.toggle_mute(),
            KeyCommand::ToggleFullscreen => player.toggle_fullscreen(),
            KeyCommand::Pause => player.pause(),
            KeyCommand::Rate(rate) => player.set_playback_rate(rate),
        }
    }
}

/// Snapshot of everything the watch page renders.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlaybackView {
    pub state: PlaybackState,
    pub anime_id: String,
    pub episode_number: u32,
    pub episode_id: Option<String>,
    pub episode_title: Option<String>,
    pub total_episodes: u32,
    pub category: Category,
    pub servers: Vec<String>,
    pub server: Option<String>,
    pub source: Option<SourceEntry>,
    pub tracks: Vec<SubtitleTrack>,
}

struct Inner<P> {
    player: Option<P>,
    view: PlaybackView,
    generation: u64,
    cancel: CancellationToken,
}

pub struct PlaybackController<P: Player> {
    api: Arc<dyn CatalogApi>,
    inner: Mutex<Inner<P>>,
}

impl<P: Player> PlaybackController<P> {
    pub fn new(api: Arc<dyn CatalogApi>, player: P) -> Self {
        Self {
            api,
            inner: Mutex::new(Inner {
                player: Some(player),
                view: PlaybackView::default(),
                generation: 0,
                cancel: CancellationToken::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<P>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn view(&self) -> PlaybackView {
        self.lock().view.clone()
    }

    pub fn state(&self) -> PlaybackState {
        self.lock().view.state.clone()
    }

    /// Cancels the in-flight transition and starts a new one.
    fn begin(&self, update: impl FnOnce(&mut PlaybackView)) -> (u64, CancellationToken) {
        let mut inner = self.lock();
        inner.cancel.cancel();
        inner.generation += 1;
        inner.cancel = CancellationToken::new();
        update(&mut inner.view);
        (inner.generation, inner.cancel.clone())
    }

    /// Applies `update` only if `generation` is still current.
    fn commit(&self, generation: u64, update: impl FnOnce(&mut Inner<P>)) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation {
            debug!(generation, current = inner.generation, "discarding stale playback result");
            return false;
        }
        update(&mut inner);
        true
    }

    /// Moves to the error state. Whatever was playing is unloaded so the
    /// page never shows a source for a selection that failed.
    fn fail(&self, generation: u64, message: String) {
        let anime = self.lock().view.anime_id.clone();
        warn!(anime = %anime, "playback: {message}");
        self.commit(generation, |inner| {
            inner.view.source = None;
            inner.view.tracks.clear();
            inner.view.state = PlaybackState::Error(message);
            if let Some(p) = inner.player.as_mut() {
                p.unload();
            }
        });
    }

    async fn fetch<T>(
        token: &CancellationToken,
        fut: impl Future<Output = Result<T, ApiError>>,
    ) -> Option<Result<T, ApiError>> {
        tokio::select! {
            _ = token.cancelled() => None,
            res = fut => Some(res),
        }
    }

    /// Opens `episode_number` of `anime_id` with the current category.
    pub async fn mount(&self, anime_id: &str, episode_number: u32) {
        let (generation, token) = self.begin(|v| {
            let category = v.category;
            *v = PlaybackView {
                state: PlaybackState::LoadingEpisodeList,
                anime_id: anime_id.to_string(),
                episode_number,
                category,
                ..PlaybackView::default()
            };
        });
        info!(anime = %anime_id, episode = episode_number, "opening episode");

        let Some(res) = Self::fetch(&token, self.api.episodes(anime_id)).await else {
            return;
        };
        let list = match res {
            Ok(list) => list,
            Err(e) => return self.fail(generation, e.to_string()),
        };
        let Some(entry) = list.find_number(episode_number).cloned() else {
            return self.fail(generation, EPISODE_NOT_FOUND.to_string());
        };

        let committed = self.commit(generation, |inner| {
            inner.view.episode_id = Some(entry.episode_id.clone());
            inner.view.episode_title = entry.title.clone();
            inner.view.total_episodes = list.total_episodes;
            inner.view.state = PlaybackState::LoadingServers;
        });
        if committed {
            self.resolve_servers(generation, &token, &entry.episode_id).await;
        }
    }

    /// Switches sub/dub/raw and resolves the server list again. Before the
    /// episode id is known the choice is only recorded; the pending mount
    /// picks it up when it asks for servers.
    pub async fn select_category(&self, category: Category) {
        let episode_id = {
            let mut inner = self.lock();
            match inner.view.episode_id.clone() {
                Some(id) => id,
                None => {
                    inner.view.category = category;
                    return;
                }
            }
        };
        let (generation, token) = self.begin(|v| {
            v.category = category;
            v.state = PlaybackState::LoadingServers;
        });
        self.resolve_servers(generation, &token, &episode_id).await;
    }

    pub async fn select_server(&self, server: &str) {
        let (episode_id, category) = {
            let inner = self.lock();
            match inner.view.episode_id.clone() {
                Some(id) => (id, inner.view.category),
                None => return,
            }
        };
        let (generation, token) = self.begin(|v| {
            v.server = Some(server.to_string());
            v.state = PlaybackState::LoadingSource;
        });
        self.resolve_source(generation, &token, &episode_id, server, category)
            .await;
    }

    async fn resolve_servers(&self, generation: u64, token: &CancellationToken, episode_id: &str) {
        let category = self.lock().view.category;
        let Some(res) = Self::fetch(token, self.api.servers(episode_id)).await else {
            return;
        };
        let servers = match res {
            Ok(s) => s.names(category),
            Err(e) => return self.fail(generation, e.to_string()),
        };

        let Some(first) = servers.first().cloned() else {
            self.commit(generation, |inner| {
                inner.view.servers.clear();
                inner.view.server = None;
                inner.view.source = None;
                inner.view.tracks.clear();
                inner.view.state = PlaybackState::Ready;
                if let Some(p) = inner.player.as_mut() {
                    p.unload();
                }
            });
            return;
        };

        let committed = self.commit(generation, |inner| {
            inner.view.servers = servers;
            inner.view.server = Some(first.clone());
            inner.view.state = PlaybackState::LoadingSource;
        });
        if committed {
            self.resolve_source(generation, token, episode_id, &first, category)
                .await;
        }
    }

    async fn resolve_source(
        &self,
        generation: u64,
        token: &CancellationToken,
        episode_id: &str,
        server: &str,
        category: Category,
    ) {
        let Some(res) = Self::fetch(token, self.api.sources(episode_id, server, category)).await else {
            return;
        };
        let sources = match res {
            Ok(s) => s,
            Err(e) => return self.fail(generation, e.to_string()),
        };
        let Some(source) = sources.sources.first().cloned() else {
            return self.fail(generation, NO_SOURCES.to_string());
        };
        let tracks = subtitle_tracks(&sources.tracks);

        self.commit(generation, |inner| {
            if let Some(p) = inner.player.as_mut() {
                p.load(&source, &tracks);
            }
            inner.view.source = Some(source);
            inner.view.tracks = tracks;
            inner.view.state = PlaybackState::Ready;
        });
    }

    pub fn previous_episode(&self) -> Option<u32> {
        let inner = self.lock();
        let n = inner.view.episode_number;
        (n > 1).then(|| n - 1)
    }

    pub fn next_episode(&self) -> Option<u32> {
        let inner = self.lock();
        let n = inner.view.episode_number;
        (n >= 1 && n < inner.view.total_episodes).then(|| n + 1)
    }

    /// Returns true when the key was handled.
    pub fn handle_key(&self, key: &str, in_text_input: bool) -> bool {
        let Some(cmd) = KeyCommand::from_key(key, in_text_input) else {
            return false;
        };
        let mut inner = self.lock();
        match inner.player.as_mut() {
            Some(p) => {
                cmd.apply(p);
                true
            }
            None => false,
        }
    }

    /// Cancels pending fetches and disposes the player. Later calls are no-ops.
    pub fn unmount(&self) {
        let mut inner = self.lock();
        inner.cancel.cancel();
        inner.generation += 1;
        inner.view.state = PlaybackState::Idle;
        if let Some(mut p) = inner.player.take() {
            p.dispose();
        }
    }
}

impl<P: Player> Drop for PlaybackController<P> {
    fn drop(&mut self) {
        self.unmount();
    }
}
