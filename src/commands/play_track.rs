use serenity::model::id::{ChannelId, GuildId, UserId};
use std::sync::Arc;
use tracing::info;

use crate::commands::CommandError;
use crate::playback::playback_service::PlaybackApplicationService;
use crate::playback::queue_service::{EnqueueOutcome, QueueApplicationService};
use crate::ports::{TrackResolver, VoiceTransport};

#[derive(Debug, Clone)]
pub struct PlayTrackCommand {
    pub guild_id: GuildId,
    pub voice_channel_id: ChannelId,
    pub query: String,
    pub user_id: UserId,
    pub user_name: String,
    /// Encolar al frente en lugar de al final.
    pub play_next: bool,
    /// Arrancar la reproducción si la cola estaba ociosa.
    pub start_playing: bool,
}

#[derive(Debug, Clone)]
pub struct PlayTrackResponse {
    pub outcome: EnqueueOutcome,
    pub started: bool,
}

impl PlayTrackResponse {
    pub fn message(&self) -> String {
        self.outcome.message()
    }
}

/// Flujo de /play: conectar, resolver, encolar y (si corresponde) arrancar.
pub struct PlayTrackHandler {
    transport: Arc<dyn VoiceTransport>,
    resolver: Arc<dyn TrackResolver>,
    queue: Arc<QueueApplicationService>,
    playback: Arc<PlaybackApplicationService>,
}

impl PlayTrackHandler {
    pub fn new(
        transport: Arc<dyn VoiceTransport>,
        resolver: Arc<dyn TrackResolver>,
        queue: Arc<QueueApplicationService>,
        playback: Arc<PlaybackApplicationService>,
    ) -> Self {
        Self {
            transport,
            resolver,
            queue,
            playback,
        }
    }

    pub async fn execute(&self, cmd: PlayTrackCommand) -> Result<PlayTrackResponse, CommandError> {
        self.transport
            .ensure_connected(cmd.guild_id, cmd.voice_channel_id)
            .await
            .map_err(|e| CommandError::Voice(e.to_string()))?;

        let track = self
            .resolver
            .resolve(&cmd.query)
            .await
            .map_err(|e| CommandError::Resolution(e.to_string()))?
            .ok_or_else(|| CommandError::TrackNotFound(cmd.query.clone()))?;

        let outcome = if cmd.play_next {
            self.queue
                .enqueue_next(cmd.guild_id, track, cmd.user_id, &cmd.user_name)
                .await?
        } else {
            self.queue
                .enqueue(cmd.guild_id, track, cmd.user_id, &cmd.user_name)
                .await?
        };

        let mut started = false;
        if cmd.start_playing && outcome.accepted() && outcome.should_start {
            started = self.playback.start_playback(cmd.guild_id, None).await?;
        }

        info!(
            "🎵 /play de {} en el guild {}: {:?}",
            cmd.user_name, cmd.guild_id, outcome.status
        );
        Ok(PlayTrackResponse { outcome, started })
    }
}
