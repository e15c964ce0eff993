use serenity::model::id::GuildId;
use std::sync::Arc;
use tracing::{debug, info};

use crate::commands::CommandError;
use crate::playback::playback_service::PlaybackApplicationService;
use crate::playback::queue_service::QueueApplicationService;
use crate::ports::{SessionRepository, VoiceTransport, VoteSessionRepository};

#[derive(Debug, Clone)]
pub struct StopPlaybackCommand {
    pub guild_id: GuildId,
    /// Vaciar también la cola.
    pub clear_queue: bool,
    /// Desconectar del canal de voz y liberar la sesión.
    pub disconnect: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopPlaybackResponse {
    pub cleared_tracks: usize,
    pub disconnected: bool,
}

/// Flujo de /stop: detener, opcionalmente vaciar la cola y desconectar.
/// Las votaciones pendientes del guild se descartan siempre.
pub struct StopPlaybackHandler {
    sessions: Arc<dyn SessionRepository>,
    votes: Arc<dyn VoteSessionRepository>,
    transport: Arc<dyn VoiceTransport>,
    queue: Arc<QueueApplicationService>,
    playback: Arc<PlaybackApplicationService>,
}

impl StopPlaybackHandler {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        votes: Arc<dyn VoteSessionRepository>,
        transport: Arc<dyn VoiceTransport>,
        queue: Arc<QueueApplicationService>,
        playback: Arc<PlaybackApplicationService>,
    ) -> Self {
        Self {
            sessions,
            votes,
            transport,
            queue,
            playback,
        }
    }

    pub async fn execute(
        &self,
        cmd: StopPlaybackCommand,
    ) -> Result<StopPlaybackResponse, CommandError> {
        let session = self
            .sessions
            .get(cmd.guild_id)
            .await
            .ok_or(CommandError::NothingPlaying)?;
        if !session.state.is_active() {
            return Err(CommandError::NothingPlaying);
        }

        self.playback.stop_playback(cmd.guild_id).await?;

        let discarded = self.votes.delete_for_guild(cmd.guild_id).await;
        if discarded > 0 {
            debug!("🗑️ {discarded} votaciones descartadas en el guild {}", cmd.guild_id);
        }

        let cleared_tracks = if cmd.clear_queue {
            self.queue.clear(cmd.guild_id).await?
        } else {
            0
        };

        if cmd.disconnect {
            self.transport
                .disconnect(cmd.guild_id)
                .await
                .map_err(|e| CommandError::Voice(e.to_string()))?;
            self.sessions.delete(cmd.guild_id).await;
        }

        info!("⏹️ /stop en el guild {}", cmd.guild_id);
        Ok(StopPlaybackResponse {
            cleared_tracks,
            disconnected: cmd.disconnect,
        })
    }
}
