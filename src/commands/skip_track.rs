use serenity::model::id::{GuildId, UserId};
use std::sync::Arc;
use tracing::info;

use crate::commands::CommandError;
use crate::domain::track::Track;
use crate::domain::voting::VotingDomainService;
use crate::playback::playback_service::PlaybackApplicationService;
use crate::ports::{SessionRepository, VoiceTransport};

#[derive(Debug, Clone)]
pub struct SkipTrackCommand {
    pub guild_id: GuildId,
    pub user_id: UserId,
}

#[derive(Debug, Clone)]
pub struct SkipTrackResponse {
    pub skipped: Track,
    pub next: Option<Track>,
}

/// Salto directo: solo para quien pidió la pista o audiencias chicas.
/// El resto va por votación.
pub struct SkipTrackHandler {
    sessions: Arc<dyn SessionRepository>,
    transport: Arc<dyn VoiceTransport>,
    playback: Arc<PlaybackApplicationService>,
    small_audience_size: usize,
}

impl SkipTrackHandler {
    /// `small_audience_size` viene de `Config::small_audience_size`.
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        transport: Arc<dyn VoiceTransport>,
        playback: Arc<PlaybackApplicationService>,
        small_audience_size: usize,
    ) -> Self {
        Self {
            sessions,
            transport,
            playback,
            small_audience_size,
        }
    }

    pub async fn execute(&self, cmd: SkipTrackCommand) -> Result<SkipTrackResponse, CommandError> {
        let session = self
            .sessions
            .get(cmd.guild_id)
            .await
            .ok_or(CommandError::NothingPlaying)?;
        let current = session
            .current_track
            .clone()
            .ok_or(CommandError::NothingPlaying)?;

        let listeners = self.transport.list_listeners(cmd.guild_id).await;
        if !VotingDomainService::can_auto_skip(
            cmd.user_id,
            &current,
            listeners.len(),
            self.small_audience_size,
        ) {
            return Err(CommandError::VoteRequired(listeners.len()));
        }

        let skipped = self
            .playback
            .skip_track(cmd.guild_id)
            .await?
            .ok_or(CommandError::NothingPlaying)?;

        let next = self
            .sessions
            .get(cmd.guild_id)
            .await
            .and_then(|s| s.current_track);

        info!(
            "⏭️ Salto directo de {} en el guild {}",
            cmd.user_id, cmd.guild_id
        );
        Ok(SkipTrackResponse { skipped, next })
    }
}
