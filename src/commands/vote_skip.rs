use serenity::model::id::{GuildId, UserId};
use std::sync::Arc;
use tracing::info;

use crate::commands::CommandError;
use crate::domain::track::Track;
use crate::domain::voting::{VoteResult, VoteType, VotingDomainService};
use crate::playback::playback_service::PlaybackApplicationService;
use crate::ports::{SessionRepository, VoiceTransport, VoteSessionRepository};

#[derive(Debug, Clone)]
pub struct VoteSkipCommand {
    pub guild_id: GuildId,
    pub user_id: UserId,
}

#[derive(Debug, Clone)]
pub struct VoteSkipResponse {
    pub result: VoteResult,
    pub message: String,
    /// Progreso "n/m votos" cuando la votación sigue abierta.
    pub progress: Option<String>,
    pub skipped_track: Option<Track>,
}

/// Flujo de /voteskip: evalúa el voto contra la pista actual y ejecuta el
/// salto cuando la decisión queda tomada.
pub struct VoteSkipHandler {
    sessions: Arc<dyn SessionRepository>,
    votes: Arc<dyn VoteSessionRepository>,
    transport: Arc<dyn VoiceTransport>,
    playback: Arc<PlaybackApplicationService>,
    small_audience_size: usize,
}

impl VoteSkipHandler {
    /// `small_audience_size` viene de `Config::small_audience_size`.
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        votes: Arc<dyn VoteSessionRepository>,
        transport: Arc<dyn VoiceTransport>,
        playback: Arc<PlaybackApplicationService>,
        small_audience_size: usize,
    ) -> Self {
        Self {
            sessions,
            votes,
            transport,
            playback,
            small_audience_size,
        }
    }

    pub async fn execute(&self, cmd: VoteSkipCommand) -> Result<VoteSkipResponse, CommandError> {
        if !self.transport.is_connected(cmd.guild_id) {
            return Ok(Self::response(VoteResult::BotNotInChannel, 0, 0, None));
        }

        let current = self
            .sessions
            .get(cmd.guild_id)
            .await
            .and_then(|s| s.current_track);
        let Some(track) = current else {
            return Ok(Self::response(VoteResult::NoPlaying, 0, 0, None));
        };

        let listeners = self.transport.list_listeners(cmd.guild_id).await;
        let in_channel = listeners.contains(&cmd.user_id);
        let threshold = VotingDomainService::calculate_threshold(listeners.len());

        let mut vote = self
            .votes
            .get_or_create(cmd.guild_id, &track.id, VoteType::Skip, threshold)
            .await?;

        let result = VotingDomainService::evaluate_vote(
            &mut vote,
            cmd.user_id,
            Some(&track),
            listeners.len(),
            self.small_audience_size,
            in_channel,
        );

        let mut skipped_track = None;
        if result.action_executed() {
            self.votes.delete(cmd.guild_id, VoteType::Skip).await;
            skipped_track = self.playback.skip_track(cmd.guild_id).await?;
            info!(
                "⏭️ Voto decisivo de {} en el guild {} ({result:?})",
                cmd.user_id, cmd.guild_id
            );
        } else if result == VoteResult::VoteRecorded {
            self.votes.save(&vote).await;
        } else if result == VoteResult::VoteExpired {
            self.votes.delete(cmd.guild_id, VoteType::Skip).await;
        }

        Ok(Self::response(
            result,
            vote.vote_count(),
            vote.threshold,
            skipped_track,
        ))
    }

    fn response(
        result: VoteResult,
        votes: usize,
        needed: usize,
        skipped_track: Option<Track>,
    ) -> VoteSkipResponse {
        let progress = match result {
            VoteResult::VoteRecorded | VoteResult::AlreadyVoted => {
                Some(format!("{votes}/{needed} votos"))
            }
            _ => None,
        };
        VoteSkipResponse {
            message: result.message(VoteType::Skip, votes, needed),
            result,
            progress,
            skipped_track,
        }
    }
}
