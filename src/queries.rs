use serenity::model::id::GuildId;
use std::sync::Arc;

use crate::domain::rules::QueueDomainService;
use crate::domain::session::{LoopMode, PlaybackState};
use crate::domain::track::{Track, TrackId};
use crate::ports::{SessionRepository, TrackHistoryRepository};

/// Vista de solo lectura de la cola de un guild.
#[derive(Debug, Clone)]
pub struct QueueView {
    pub current: Option<Track>,
    pub tracks: Vec<Track>,
    pub state: PlaybackState,
    pub loop_mode: LoopMode,
    /// Suma de las duraciones conocidas, en segundos.
    pub total_duration_seconds: u64,
}

impl QueueView {
    pub fn is_empty(&self) -> bool {
        self.current.is_none() && self.tracks.is_empty()
    }

    pub fn length(&self) -> usize {
        self.tracks.len()
    }
}

/// Lecturas sobre sesiones e historial. Nunca mutan nada.
pub struct PlaybackQueries {
    sessions: Arc<dyn SessionRepository>,
    history: Arc<dyn TrackHistoryRepository>,
}

impl PlaybackQueries {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        history: Arc<dyn TrackHistoryRepository>,
    ) -> Self {
        Self { sessions, history }
    }

    pub async fn current_track(&self, guild_id: GuildId) -> Option<Track> {
        self.sessions.get(guild_id).await?.current_track
    }

    pub async fn playback_state(&self, guild_id: GuildId) -> PlaybackState {
        self.sessions
            .get(guild_id)
            .await
            .map(|s| s.state)
            .unwrap_or(PlaybackState::Idle)
    }

    pub async fn queue(&self, guild_id: GuildId) -> Option<QueueView> {
        let session = self.sessions.get(guild_id).await?;
        let total_duration_seconds = session
            .queue
            .iter()
            .chain(session.current_track.iter())
            .filter_map(|t| t.duration_seconds)
            .sum();

        Some(QueueView {
            current: session.current_track.clone(),
            tracks: session.queue.iter().cloned().collect(),
            state: session.state,
            loop_mode: session.loop_mode,
            total_duration_seconds,
        })
    }

    /// Próxima pista según el modo de repetición.
    pub async fn up_next(&self, guild_id: GuildId) -> Option<Track> {
        let session = self.sessions.get(guild_id).await?;
        QueueDomainService::next_track(&session).cloned()
    }

    pub async fn recent_history(&self, guild_id: GuildId, limit: usize) -> Vec<Track> {
        self.history.get_recent(guild_id, limit).await
    }

    pub async fn play_count(&self, guild_id: GuildId, track_id: &TrackId) -> usize {
        self.history.get_play_count(guild_id, track_id).await
    }

    pub async fn active_session_count(&self) -> usize {
        self.sessions.get_all_active().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryHistoryRepository, MemorySessionRepository};
    use pretty_assertions::assert_eq;

    fn queries() -> (
        PlaybackQueries,
        Arc<MemorySessionRepository>,
        Arc<MemoryHistoryRepository>,
    ) {
        let sessions = Arc::new(MemorySessionRepository::new(10));
        let history = Arc::new(MemoryHistoryRepository::new(50));
        (
            PlaybackQueries::new(sessions.clone(), history.clone()),
            sessions,
            history,
        )
    }

    fn track(n: u32, seconds: u64) -> Track {
        let mut t =
            Track::new(format!("Pista {n}"), format!("https://example.com/{n}")).unwrap();
        t.duration_seconds = Some(seconds);
        t
    }

    #[tokio::test]
    async fn queue_view_sums_known_durations() {
        let (queries, sessions, _history) = queries();
        let guild = GuildId::new(1);

        let mut session = sessions.get_or_create(guild).await;
        session.current_track = Some(track(1, 100));
        session.enqueue(track(2, 200)).unwrap();
        let mut unknown = Track::new("Sin duración", "https://example.com/3").unwrap();
        unknown.duration_seconds = None;
        session.enqueue(unknown).unwrap();
        session.state = PlaybackState::Playing;
        sessions.save(&mut session).await.unwrap();

        let view = queries.queue(guild).await.unwrap();
        assert_eq!(view.length(), 2);
        assert_eq!(view.total_duration_seconds, 300);
        assert_eq!(view.state, PlaybackState::Playing);
        assert!(!view.is_empty());
    }

    #[tokio::test]
    async fn up_next_honors_track_loop() {
        let (queries, sessions, _history) = queries();
        let guild = GuildId::new(1);

        let mut session = sessions.get_or_create(guild).await;
        session.current_track = Some(track(1, 100));
        session.enqueue(track(2, 200)).unwrap();
        sessions.save(&mut session).await.unwrap();

        assert_eq!(
            queries.up_next(guild).await.map(|t| t.title),
            Some("Pista 2".to_string())
        );

        let mut session = sessions.get(guild).await.unwrap();
        session.loop_mode = LoopMode::Track;
        sessions.save(&mut session).await.unwrap();

        assert_eq!(
            queries.up_next(guild).await.map(|t| t.title),
            Some("Pista 1".to_string())
        );
    }

    #[tokio::test]
    async fn missing_guild_reads_are_empty() {
        let (queries, _sessions, _history) = queries();
        let guild = GuildId::new(1);

        assert!(queries.current_track(guild).await.is_none());
        assert!(queries.queue(guild).await.is_none());
        assert_eq!(queries.playback_state(guild).await, PlaybackState::Idle);
        assert!(queries.recent_history(guild, 5).await.is_empty());
    }

    #[tokio::test]
    async fn history_reads_delegate_to_the_repository() {
        let (queries, _sessions, history) = queries();
        let guild = GuildId::new(1);
        let t = track(1, 60);

        history.record_play(guild, &t).await;
        history.record_play(guild, &track(2, 60)).await;

        assert_eq!(queries.recent_history(guild, 10).await.len(), 2);
        assert_eq!(queries.play_count(guild, &t.id).await, 1);
    }
}
