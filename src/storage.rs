use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serenity::model::id::GuildId;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

use crate::domain::session::GuildPlaybackSession;
use crate::domain::track::{Track, TrackId};
use crate::domain::voting::{VoteSession, VoteType, VotingDomainService};
use crate::error::DomainError;
use crate::ports::{SessionRepository, TrackHistoryRepository, VoteSessionRepository};

/// Repositorio de sesiones en memoria con snapshots JSON opcionales.
///
/// Cada guardado exitoso compara e incrementa la revisión de la sesión
/// (concurrencia optimista); el que pierde la carrera recibe
/// `DomainError::Concurrency` y debe recargar.
pub struct MemorySessionRepository {
    sessions: DashMap<GuildId, GuildPlaybackSession>,
    max_queue_size: usize,
    snapshot_dir: Option<PathBuf>,
}

impl MemorySessionRepository {
    pub fn new(max_queue_size: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            max_queue_size,
            snapshot_dir: None,
        }
    }

    /// Habilita snapshots a `<dir>/guild_<id>.json` en cada guardado.
    pub fn with_snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = Some(dir.into());
        self
    }

    /// Recarga las sesiones guardadas en disco.
    pub async fn load_snapshots(&self) -> Result<usize> {
        let Some(dir) = &self.snapshot_dir else {
            return Ok(0);
        };

        tokio::fs::create_dir_all(dir).await?;
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut loaded = 0;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.starts_with("guild_") || !name.ends_with(".json") {
                continue;
            }

            match tokio::fs::read_to_string(&path).await {
                Ok(json) => match serde_json::from_str::<GuildPlaybackSession>(&json) {
                    Ok(session) => {
                        self.sessions.insert(session.guild_id, session);
                        loaded += 1;
                    }
                    Err(e) => warn!("⚠️ Snapshot corrupto {name}: {e}"),
                },
                Err(e) => warn!("⚠️ No se pudo leer {name}: {e}"),
            }
        }

        if loaded > 0 {
            info!("📁 {loaded} sesiones restauradas desde disco");
        }
        Ok(loaded)
    }

    fn snapshot_path(&self, guild_id: GuildId) -> Option<PathBuf> {
        self.snapshot_dir
            .as_ref()
            .map(|dir| dir.join(format!("guild_{guild_id}.json")))
    }

    async fn write_snapshot(&self, session: &GuildPlaybackSession) {
        let Some(path) = self.snapshot_path(session.guild_id) else {
            return;
        };

        let json = match serde_json::to_string_pretty(session) {
            Ok(json) => json,
            Err(e) => {
                error!("❌ No se pudo serializar la sesión {}: {e}", session.guild_id);
                return;
            }
        };

        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                error!("❌ No se pudo crear el directorio de datos: {e}");
                return;
            }
        }

        if let Err(e) = tokio::fs::write(&path, json).await {
            error!("❌ No se pudo escribir el snapshot de {}: {e}", session.guild_id);
        } else {
            debug!("💾 Sesión {} persistida", session.guild_id);
        }
    }

    async fn remove_snapshot(&self, guild_id: GuildId) {
        if let Some(path) = self.snapshot_path(guild_id) {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("⚠️ No se pudo borrar el snapshot de {guild_id}: {e}");
                }
            }
        }
    }
}

#[async_trait]
impl SessionRepository for MemorySessionRepository {
    async fn get(&self, guild_id: GuildId) -> Option<GuildPlaybackSession> {
        self.sessions.get(&guild_id).map(|s| s.clone())
    }

    async fn get_or_create(&self, guild_id: GuildId) -> GuildPlaybackSession {
        self.sessions
            .entry(guild_id)
            .or_insert_with(|| {
                info!("🆕 Sesión creada para el guild {guild_id}");
                GuildPlaybackSession::new(guild_id, self.max_queue_size)
            })
            .clone()
    }

    async fn save(&self, session: &mut GuildPlaybackSession) -> Result<(), DomainError> {
        // Comparar-e-incrementar bajo el lock del shard; el snapshot se
        // escribe recién después de soltar el guard
        let saved = {
            let mut entry = self
                .sessions
                .entry(session.guild_id)
                .or_insert_with(|| session.clone());

            if entry.revision != session.revision {
                return Err(DomainError::Concurrency {
                    guild_id: session.guild_id.get(),
                });
            }

            session.revision += 1;
            *entry = session.clone();
            entry.clone()
        };

        self.write_snapshot(&saved).await;
        Ok(())
    }

    async fn delete(&self, guild_id: GuildId) -> bool {
        let removed = self.sessions.remove(&guild_id).is_some();
        if removed {
            info!("🗑️ Sesión del guild {guild_id} eliminada");
            self.remove_snapshot(guild_id).await;
        }
        removed
    }

    async fn exists(&self, guild_id: GuildId) -> bool {
        self.sessions.contains_key(&guild_id)
    }

    async fn get_all_active(&self) -> Vec<GuildPlaybackSession> {
        self.sessions
            .iter()
            .filter(|s| s.state.is_active() || s.has_tracks())
            .map(|s| s.clone())
            .collect()
    }

    async fn cleanup_stale(&self, cutoff: DateTime<Utc>) -> usize {
        let stale: Vec<GuildId> = self
            .sessions
            .iter()
            .filter(|s| s.last_activity < cutoff && !s.state.is_active())
            .map(|s| s.guild_id)
            .collect();

        for guild_id in &stale {
            self.sessions.remove(guild_id);
            self.remove_snapshot(*guild_id).await;
        }

        if !stale.is_empty() {
            info!("🔄 {} sesiones inactivas limpiadas", stale.len());
        }
        stale.len()
    }

    async fn count(&self) -> usize {
        self.sessions.len()
    }
}

/// Repositorio de votaciones en memoria.
pub struct MemoryVoteRepository {
    sessions: DashMap<(GuildId, VoteType), VoteSession>,
    expiry_minutes: i64,
}

impl MemoryVoteRepository {
    /// `expiry_minutes` viene de `Config::vote_expiry_minutes` y fija la
    /// ventana de cada sesión que el repositorio crea.
    pub fn new(expiry_minutes: i64) -> Self {
        Self {
            sessions: DashMap::new(),
            expiry_minutes,
        }
    }
}

impl Default for MemoryVoteRepository {
    fn default() -> Self {
        Self::new(VoteSession::DEFAULT_EXPIRATION_MINUTES)
    }
}

#[async_trait]
impl VoteSessionRepository for MemoryVoteRepository {
    async fn get(&self, guild_id: GuildId, vote_type: VoteType) -> Option<VoteSession> {
        let key = (guild_id, vote_type);
        let expired = match self.sessions.get(&key) {
            Some(session) if session.is_expired() => true,
            Some(session) => return Some(session.clone()),
            None => return None,
        };

        if expired {
            self.sessions.remove(&key);
        }
        None
    }

    async fn get_or_create(
        &self,
        guild_id: GuildId,
        track_id: &TrackId,
        vote_type: VoteType,
        threshold: usize,
    ) -> Result<VoteSession, DomainError> {
        let key = (guild_id, vote_type);

        if let Some(mut existing) = self.sessions.get_mut(&key) {
            if VotingDomainService::should_reset_session(&existing, track_id) {
                existing.reset(Some(track_id.clone()));
                debug!("🔄 Votación de {vote_type:?} reiniciada en el guild {guild_id}");
            }
            // El umbral sigue a la audiencia actual
            existing.update_threshold(threshold)?;
            return Ok(existing.clone());
        }

        let session = VoteSession::new(guild_id, track_id.clone(), vote_type, threshold)?
            .with_expiry_minutes(self.expiry_minutes);
        self.sessions.insert(key, session.clone());
        Ok(session)
    }

    async fn save(&self, session: &VoteSession) {
        self.sessions
            .insert((session.guild_id, session.vote_type), session.clone());
    }

    async fn delete(&self, guild_id: GuildId, vote_type: VoteType) -> bool {
        self.sessions.remove(&(guild_id, vote_type)).is_some()
    }

    async fn delete_for_guild(&self, guild_id: GuildId) -> usize {
        let keys: Vec<(GuildId, VoteType)> = self
            .sessions
            .iter()
            .filter(|e| e.key().0 == guild_id)
            .map(|e| *e.key())
            .collect();

        for key in &keys {
            self.sessions.remove(key);
        }
        keys.len()
    }

    async fn cleanup_expired(&self) -> usize {
        let expired: Vec<(GuildId, VoteType)> = self
            .sessions
            .iter()
            .filter(|e| e.value().is_expired())
            .map(|e| *e.key())
            .collect();

        for key in &expired {
            self.sessions.remove(key);
        }
        expired.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct HistoryEntry {
    track: Track,
    played_at: DateTime<Utc>,
    finished: bool,
    skipped: bool,
}

/// Historial de reproducción en memoria, acotado por guild.
pub struct MemoryHistoryRepository {
    entries: DashMap<GuildId, Vec<HistoryEntry>>,
    limit: usize,
}

impl MemoryHistoryRepository {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: DashMap::new(),
            limit,
        }
    }
}

#[async_trait]
impl TrackHistoryRepository for MemoryHistoryRepository {
    async fn record_play(&self, guild_id: GuildId, track: &Track) {
        let mut entries = self.entries.entry(guild_id).or_default();
        entries.push(HistoryEntry {
            track: track.clone(),
            played_at: Utc::now(),
            finished: false,
            skipped: false,
        });

        // Se conservan solo las últimas `limit` entradas
        let len = entries.len();
        if len > self.limit {
            entries.drain(..len - self.limit);
        }
    }

    async fn mark_finished(&self, guild_id: GuildId, track_id: &TrackId, skipped: bool) {
        if let Some(mut entries) = self.entries.get_mut(&guild_id) {
            if let Some(entry) = entries
                .iter_mut()
                .rev()
                .find(|e| &e.track.id == track_id && !e.finished)
            {
                entry.finished = true;
                entry.skipped = skipped;
            }
        }
    }

    async fn get_recent(&self, guild_id: GuildId, limit: usize) -> Vec<Track> {
        self.entries
            .get(&guild_id)
            .map(|entries| {
                entries
                    .iter()
                    .rev()
                    .take(limit)
                    .map(|e| e.track.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    async fn get_play_count(&self, guild_id: GuildId, track_id: &TrackId) -> usize {
        self.entries
            .get(&guild_id)
            .map(|entries| entries.iter().filter(|e| &e.track.id == track_id).count())
            .unwrap_or(0)
    }

    async fn clear_history(&self, guild_id: GuildId) -> usize {
        self.entries
            .remove(&guild_id)
            .map(|(_, entries)| entries.len())
            .unwrap_or(0)
    }
}
