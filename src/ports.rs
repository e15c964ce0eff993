use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::sync::Arc;
use std::time::Duration;

use crate::domain::session::GuildPlaybackSession;
use crate::domain::track::{Track, TrackId};
use crate::domain::voting::{VoteSession, VoteType};
use crate::error::DomainError;

/// Callback invocado por el transporte cuando termina una pista en el
/// canal de voz.
pub type TrackEndCallback = Arc<dyn Fn(GuildId) -> BoxFuture<'static, ()> + Send + Sync>;

/// Callback de notificación al terminar de procesar una pista.
pub type TrackFinishedCallback =
    Arc<dyn Fn(GuildId, Track) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Callback para avisar al canal de texto (p. ej. "¿seguimos?").
pub type PromptCallback =
    Arc<dyn Fn(GuildId, String) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Repositorio de sesiones de reproducción por guild.
///
/// `save` aplica concurrencia optimista: compara la revisión guardada con
/// la del llamador y falla con `DomainError::Concurrency` si otro escritor
/// ganó la carrera. En éxito incrementa la revisión de la copia del
/// llamador.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn get(&self, guild_id: GuildId) -> Option<GuildPlaybackSession>;

    async fn get_or_create(&self, guild_id: GuildId) -> GuildPlaybackSession;

    async fn save(&self, session: &mut GuildPlaybackSession) -> Result<(), DomainError>;

    async fn delete(&self, guild_id: GuildId) -> bool;

    async fn exists(&self, guild_id: GuildId) -> bool;

    async fn get_all_active(&self) -> Vec<GuildPlaybackSession>;

    /// Borra sesiones sin actividad desde antes del corte.
    async fn cleanup_stale(&self, cutoff: DateTime<Utc>) -> usize;

    async fn count(&self) -> usize;
}

/// Repositorio de sesiones de votación, una por (guild, acción).
#[async_trait]
pub trait VoteSessionRepository: Send + Sync {
    async fn get(&self, guild_id: GuildId, vote_type: VoteType) -> Option<VoteSession>;

    /// Devuelve la sesión vigente o crea una nueva; una sesión vieja
    /// (pista distinta o expirada) se reinicia antes de devolverla.
    async fn get_or_create(
        &self,
        guild_id: GuildId,
        track_id: &TrackId,
        vote_type: VoteType,
        threshold: usize,
    ) -> Result<VoteSession, DomainError>;

    async fn save(&self, session: &VoteSession);

    async fn delete(&self, guild_id: GuildId, vote_type: VoteType) -> bool;

    async fn delete_for_guild(&self, guild_id: GuildId) -> usize;

    async fn cleanup_expired(&self) -> usize;
}

/// Historial de reproducción por guild.
#[async_trait]
pub trait TrackHistoryRepository: Send + Sync {
    async fn record_play(&self, guild_id: GuildId, track: &Track);

    /// Marca la última entrada de la pista como terminada o saltada.
    async fn mark_finished(&self, guild_id: GuildId, track_id: &TrackId, skipped: bool);

    async fn get_recent(&self, guild_id: GuildId, limit: usize) -> Vec<Track>;

    async fn get_play_count(&self, guild_id: GuildId, track_id: &TrackId) -> usize;

    async fn clear_history(&self, guild_id: GuildId) -> usize;
}

/// Transporte de voz: la frontera con el gateway de Discord.
///
/// Los servicios de aplicación nunca hablan con el canal de voz
/// directamente; todo pasa por acá, lo que permite fakes en los tests.
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<()>;

    async fn disconnect(&self, guild_id: GuildId) -> Result<()>;

    /// Conecta si hace falta; no hace nada si ya está en el canal.
    async fn ensure_connected(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<()>;

    async fn move_to(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<()>;

    async fn play(&self, guild_id: GuildId, track: &Track, seek: Option<Duration>) -> Result<()>;

    async fn stop(&self, guild_id: GuildId) -> Result<()>;

    async fn pause(&self, guild_id: GuildId) -> Result<()>;

    async fn resume(&self, guild_id: GuildId) -> Result<()>;

    fn is_connected(&self, guild_id: GuildId) -> bool;

    fn is_playing(&self, guild_id: GuildId) -> bool;

    fn is_paused(&self, guild_id: GuildId) -> bool;

    /// Usuarios (sin bots) en el canal de voz del bot.
    async fn list_listeners(&self, guild_id: GuildId) -> Vec<UserId>;

    fn current_channel(&self, guild_id: GuildId) -> Option<ChannelId>;

    /// Registra el callback de fin de pista del lado del gateway.
    fn register_end_of_track_callback(&self, callback: TrackEndCallback);
}

/// Resuelve un URL de página en una pista con stream reproducible.
#[async_trait]
pub trait TrackResolver: Send + Sync {
    /// `Ok(None)` significa "no encontrada"; `Err` es una falla del
    /// extractor que amerita reintento.
    async fn resolve(&self, webpage_url: &str) -> Result<Option<Track>>;
}

/// Fuente de pistas de radio para rellenar la cola vacía.
#[async_trait]
pub trait RadioSource: Send + Sync {
    fn is_enabled(&self, guild_id: GuildId) -> bool;

    /// Encola sugerencias y devuelve cuántas agregó.
    async fn refill(&self, guild_id: GuildId) -> Result<usize>;
}
