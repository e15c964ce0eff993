//! Dobles de prueba para el transporte, el resolver y la radio.

use anyhow::Result;
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::domain::track::{Track, TrackId};
use crate::ports::{RadioSource, SessionRepository, TrackEndCallback, TrackResolver, VoiceTransport};

/// Transporte de voz en memoria que registra cada llamada.
#[derive(Default)]
pub struct FakeTransport {
    pub calls: Mutex<Vec<String>>,
    pub listeners: DashMap<GuildId, Vec<UserId>>,
    channels: DashMap<GuildId, ChannelId>,
    now_playing: DashMap<GuildId, Track>,
    paused: DashSet<GuildId>,
    pub fail_play: AtomicU32,
    pub fail_pause: AtomicU32,
    pub fail_stop: AtomicU32,
    end_callback: Mutex<Option<TrackEndCallback>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_listeners(&self, guild_id: GuildId, users: &[u64]) {
        self.listeners
            .insert(guild_id, users.iter().map(|u| UserId::new(*u)).collect());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }

    fn should_fail(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Simula el aviso de fin de pista del gateway.
    pub async fn fire_track_end(&self, guild_id: GuildId) {
        let callback = self.end_callback.lock().clone();
        if let Some(callback) = callback {
            callback(guild_id).await;
        }
    }
}

#[async_trait]
impl VoiceTransport for FakeTransport {
    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<()> {
        self.record(format!("connect:{guild_id}:{channel_id}"));
        self.channels.insert(guild_id, channel_id);
        Ok(())
    }

    async fn disconnect(&self, guild_id: GuildId) -> Result<()> {
        self.record(format!("disconnect:{guild_id}"));
        self.channels.remove(&guild_id);
        self.now_playing.remove(&guild_id);
        Ok(())
    }

    async fn ensure_connected(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<()> {
        if self.channels.get(&guild_id).map(|c| *c) == Some(channel_id) {
            return Ok(());
        }
        self.connect(guild_id, channel_id).await
    }

    async fn move_to(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<()> {
        self.record(format!("move:{guild_id}:{channel_id}"));
        self.channels.insert(guild_id, channel_id);
        Ok(())
    }

    async fn play(&self, guild_id: GuildId, track: &Track, _seek: Option<Duration>) -> Result<()> {
        self.record(format!("play:{guild_id}:{}", track.id));
        if Self::should_fail(&self.fail_play) {
            anyhow::bail!("fallo simulado de reproducción");
        }
        self.now_playing.insert(guild_id, track.clone());
        self.paused.remove(&guild_id);
        Ok(())
    }

    async fn stop(&self, guild_id: GuildId) -> Result<()> {
        self.record(format!("stop:{guild_id}"));
        if Self::should_fail(&self.fail_stop) {
            anyhow::bail!("fallo simulado de stop");
        }
        self.now_playing.remove(&guild_id);
        self.paused.remove(&guild_id);
        Ok(())
    }

    async fn pause(&self, guild_id: GuildId) -> Result<()> {
        self.record(format!("pause:{guild_id}"));
        if Self::should_fail(&self.fail_pause) {
            anyhow::bail!("fallo simulado de pausa");
        }
        self.paused.insert(guild_id);
        Ok(())
    }

    async fn resume(&self, guild_id: GuildId) -> Result<()> {
        self.record(format!("resume:{guild_id}"));
        self.paused.remove(&guild_id);
        Ok(())
    }

    fn is_connected(&self, guild_id: GuildId) -> bool {
        self.channels.contains_key(&guild_id)
    }

    fn is_playing(&self, guild_id: GuildId) -> bool {
        self.now_playing.contains_key(&guild_id) && !self.paused.contains(&guild_id)
    }

    fn is_paused(&self, guild_id: GuildId) -> bool {
        self.paused.contains(&guild_id)
    }

    async fn list_listeners(&self, guild_id: GuildId) -> Vec<UserId> {
        self.listeners
            .get(&guild_id)
            .map(|l| l.clone())
            .unwrap_or_default()
    }

    fn current_channel(&self, guild_id: GuildId) -> Option<ChannelId> {
        self.channels.get(&guild_id).map(|c| *c)
    }

    fn register_end_of_track_callback(&self, callback: TrackEndCallback) {
        *self.end_callback.lock() = Some(callback);
    }
}

/// Resolver que falla las primeras `failures` veces y después resuelve.
pub struct FlakyResolver {
    failures: AtomicU32,
    pub attempts: AtomicU32,
}

impl FlakyResolver {
    pub fn new(failures: u32) -> Arc<Self> {
        Arc::new(Self {
            failures: AtomicU32::new(failures),
            attempts: AtomicU32::new(0),
        })
    }

    pub fn reliable() -> Arc<Self> {
        Self::new(0)
    }
}

#[async_trait]
impl TrackResolver for FlakyResolver {
    // No aporta título: al mezclarse conserva el de la pista encolada
    async fn resolve(&self, webpage_url: &str) -> Result<Option<Track>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if FakeTransport::should_fail(&self.failures) {
            anyhow::bail!("fallo simulado del extractor");
        }

        Ok(Some(Track {
            id: TrackId::from_url(webpage_url),
            title: String::new(),
            webpage_url: webpage_url.to_string(),
            stream_url: Some(format!("{webpage_url}/stream")),
            duration_seconds: Some(180),
            thumbnail_url: None,
            artist: None,
            uploader: None,
            like_count: None,
            view_count: None,
            requested_by: None,
            requested_by_name: None,
            requested_at: None,
            is_from_recommendation: false,
        }))
    }
}

/// Resolver que nunca encuentra nada.
pub struct EmptyResolver;

#[async_trait]
impl TrackResolver for EmptyResolver {
    async fn resolve(&self, _webpage_url: &str) -> Result<Option<Track>> {
        Ok(None)
    }
}

/// Radio de prueba: encola pistas sintéticas directamente en el repositorio.
pub struct FakeRadio {
    sessions: Arc<dyn SessionRepository>,
    pub enabled: DashSet<GuildId>,
    pub batch_size: usize,
    counter: AtomicU32,
}

impl FakeRadio {
    pub fn new(sessions: Arc<dyn SessionRepository>, batch_size: usize) -> Arc<Self> {
        Arc::new(Self {
            sessions,
            enabled: DashSet::new(),
            batch_size,
            counter: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl RadioSource for FakeRadio {
    fn is_enabled(&self, guild_id: GuildId) -> bool {
        self.enabled.contains(&guild_id)
    }

    async fn refill(&self, guild_id: GuildId) -> Result<usize> {
        let mut session = self.sessions.get_or_create(guild_id).await;
        let mut added = 0;
        for _ in 0..self.batch_size {
            let n = self.counter.fetch_add(1, Ordering::SeqCst);
            let mut track = Track::new(
                format!("Radio {n}"),
                format!("https://radio.example/{n}/stream"),
            )?;
            track.stream_url = Some(format!("https://radio.example/{n}/audio"));
            track.is_from_recommendation = true;
            if session.enqueue(track).is_ok() {
                added += 1;
            }
        }
        if added > 0 {
            self.sessions
                .save(&mut session)
                .await
                .map_err(anyhow::Error::from)?;
        }
        Ok(added)
    }
}
