use anyhow::Result;
use serenity::model::id::{GuildId, UserId};
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::rules::QueueDomainService;
use crate::domain::session::LoopMode;
use crate::domain::track::Track;
use crate::error::DomainError;
use crate::ports::SessionRepository;

/// Resultado de un pedido de encolado.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueStatus {
    Added,
    Duplicate,
    QueueFull,
    TooLong,
    /// Otro escritor ganó la carrera; el pedido debe reintentarse.
    Conflict,
}

#[derive(Debug, Clone)]
pub struct EnqueueOutcome {
    pub status: EnqueueStatus,
    pub track: Track,
    /// Posición en la cola cuando la pista fue aceptada.
    pub position: Option<usize>,
    pub queue_length: usize,
    /// La cola estaba ociosa: el llamador debería arrancar la reproducción.
    pub should_start: bool,
}

impl EnqueueOutcome {
    pub fn accepted(&self) -> bool {
        self.status == EnqueueStatus::Added
    }

    pub fn message(&self) -> String {
        match self.status {
            EnqueueStatus::Added => match self.position {
                Some(0) if self.should_start => {
                    format!("▶️ Reproduciendo **{}**", self.track.display_title())
                }
                Some(position) => format!(
                    "➕ **{}** agregada en la posición {}",
                    self.track.display_title(),
                    position + 1
                ),
                None => format!("➕ **{}** agregada", self.track.display_title()),
            },
            EnqueueStatus::Duplicate => {
                format!("⚠️ **{}** ya está en la cola", self.track.title)
            }
            EnqueueStatus::QueueFull => "⚠️ La cola está llena".to_string(),
            EnqueueStatus::TooLong => {
                format!("⚠️ **{}** supera la duración máxima permitida", self.track.title)
            }
            EnqueueStatus::Conflict => "⚠️ La cola cambió, probá de nuevo".to_string(),
        }
    }
}

/// Casos de uso sobre la cola de un guild.
///
/// Cada operación recarga la sesión, la muta con el agregado y guarda una
/// sola vez; un conflicto de concurrencia se reporta como resultado, no
/// como panic.
pub struct QueueApplicationService {
    sessions: Arc<dyn SessionRepository>,
    max_track_duration: u64,
}

impl QueueApplicationService {
    pub fn new(sessions: Arc<dyn SessionRepository>, max_track_duration: u64) -> Self {
        Self {
            sessions,
            max_track_duration,
        }
    }

    /// Agrega una pista al final de la cola.
    pub async fn enqueue(
        &self,
        guild_id: GuildId,
        track: Track,
        user_id: UserId,
        user_name: &str,
    ) -> Result<EnqueueOutcome> {
        self.enqueue_impl(guild_id, track, user_id, user_name, false)
            .await
    }

    /// Agrega una pista al frente de la cola (reproducir a continuación).
    pub async fn enqueue_next(
        &self,
        guild_id: GuildId,
        track: Track,
        user_id: UserId,
        user_name: &str,
    ) -> Result<EnqueueOutcome> {
        self.enqueue_impl(guild_id, track, user_id, user_name, true)
            .await
    }

    async fn enqueue_impl(
        &self,
        guild_id: GuildId,
        track: Track,
        user_id: UserId,
        user_name: &str,
        at_front: bool,
    ) -> Result<EnqueueOutcome> {
        let track = track.with_requester(user_id, user_name, None);

        if !QueueDomainService::validate_duration(&track, self.max_track_duration) {
            return Ok(EnqueueOutcome {
                status: EnqueueStatus::TooLong,
                track,
                position: None,
                queue_length: 0,
                should_start: false,
            });
        }

        let mut session = self.sessions.get_or_create(guild_id).await;
        let should_start = session.current_track.is_none();

        let enqueued = if at_front {
            session.enqueue_next(track.clone())
        } else {
            session.enqueue(track.clone())
        };

        let position = match enqueued {
            Ok(position) => position,
            Err(DomainError::BusinessRuleViolation { rule: "DUPLICATE_TRACK", .. }) => {
                return Ok(EnqueueOutcome {
                    status: EnqueueStatus::Duplicate,
                    track,
                    position: None,
                    queue_length: session.queue_length(),
                    should_start: false,
                });
            }
            Err(DomainError::BusinessRuleViolation { rule: "MAX_QUEUE_SIZE", .. }) => {
                return Ok(EnqueueOutcome {
                    status: EnqueueStatus::QueueFull,
                    track,
                    position: None,
                    queue_length: session.queue_length(),
                    should_start: false,
                });
            }
            Err(other) => return Err(other.into()),
        };

        match self.sessions.save(&mut session).await {
            Ok(()) => {
                info!(
                    "➕ \"{}\" encolada en el guild {guild_id} (posición {position})",
                    track.title
                );
                Ok(EnqueueOutcome {
                    status: EnqueueStatus::Added,
                    track,
                    position: Some(position),
                    queue_length: session.queue_length(),
                    should_start,
                })
            }
            Err(DomainError::Concurrency { .. }) => {
                warn!("🔄 Conflicto al encolar en el guild {guild_id}");
                Ok(EnqueueOutcome {
                    status: EnqueueStatus::Conflict,
                    track,
                    position: None,
                    queue_length: session.queue_length(),
                    should_start: false,
                })
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Quita la pista en la posición dada (base cero).
    pub async fn remove(&self, guild_id: GuildId, position: usize) -> Result<Option<Track>> {
        let Some(mut session) = self.sessions.get(guild_id).await else {
            return Ok(None);
        };

        let removed = session.remove_at(position);
        if let Some(track) = &removed {
            self.sessions.save(&mut session).await?;
            info!("🗑️ \"{}\" quitada de la cola del guild {guild_id}", track.title);
        }
        Ok(removed)
    }

    /// Vacía la cola y devuelve cuántas pistas había.
    pub async fn clear(&self, guild_id: GuildId) -> Result<usize> {
        let Some(mut session) = self.sessions.get(guild_id).await else {
            return Ok(0);
        };

        let cleared = session.clear_queue();
        if cleared > 0 {
            self.sessions.save(&mut session).await?;
            info!("🗑️ Cola del guild {guild_id} vaciada ({cleared} pistas)");
        }
        Ok(cleared)
    }

    /// Quita solo las pistas sugeridas automáticamente.
    pub async fn clear_recommendations(&self, guild_id: GuildId) -> Result<usize> {
        let Some(mut session) = self.sessions.get(guild_id).await else {
            return Ok(0);
        };

        let removed = session.clear_recommendations();
        if removed > 0 {
            self.sessions.save(&mut session).await?;
            info!("🗑️ {removed} sugerencias quitadas de la cola del guild {guild_id}");
        }
        Ok(removed)
    }

    pub async fn shuffle(&self, guild_id: GuildId) -> Result<bool> {
        let Some(mut session) = self.sessions.get(guild_id).await else {
            return Ok(false);
        };
        if session.queue_length() < 2 {
            return Ok(false);
        }

        session.shuffle();
        self.sessions.save(&mut session).await?;
        info!("🔀 Cola del guild {guild_id} mezclada");
        Ok(true)
    }

    pub async fn move_track(&self, guild_id: GuildId, from: usize, to: usize) -> Result<bool> {
        let Some(mut session) = self.sessions.get(guild_id).await else {
            return Ok(false);
        };

        if !session.move_track(from, to) {
            return Ok(false);
        }
        self.sessions.save(&mut session).await?;
        Ok(true)
    }

    /// Cicla el modo de repetición y devuelve el nuevo.
    pub async fn toggle_loop(&self, guild_id: GuildId) -> Result<LoopMode> {
        let mut session = self.sessions.get_or_create(guild_id).await;
        let mode = session.toggle_loop();
        self.sessions.save(&mut session).await?;
        let emoji = match mode {
            LoopMode::Off => "➡️",
            LoopMode::Track => "🔂",
            LoopMode::Queue => "🔁",
        };
        info!("{emoji} Modo de repetición del guild {guild_id}: {}", mode.as_str());
        Ok(mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemorySessionRepository;
    use pretty_assertions::assert_eq;

    fn service() -> (QueueApplicationService, Arc<MemorySessionRepository>) {
        let repo = Arc::new(MemorySessionRepository::new(3));
        let service = QueueApplicationService::new(repo.clone(), 600);
        (service, repo)
    }

    fn track(n: u32) -> Track {
        Track::new(format!("Pista {n}"), format!("https://example.com/{n}")).unwrap()
    }

    #[tokio::test]
    async fn first_enqueue_requests_start() {
        let (service, repo) = service();
        let guild = GuildId::new(1);

        let outcome = service
            .enqueue(guild, track(1), UserId::new(10), "ana")
            .await
            .unwrap();
        assert_eq!(outcome.status, EnqueueStatus::Added);
        assert!(outcome.should_start);
        assert_eq!(outcome.position, Some(0));

        let stored = repo.get(guild).await.unwrap();
        assert_eq!(stored.queue_length(), 1);
        assert_eq!(stored.queue[0].requested_by, Some(UserId::new(10)));

        // Con una pista en reproducción ya no pide arranque
        let mut session = repo.get(guild).await.unwrap();
        session.current_track = Some(track(9));
        repo.save(&mut session).await.unwrap();

        let outcome = service
            .enqueue(guild, track(2), UserId::new(10), "ana")
            .await
            .unwrap();
        assert!(outcome.accepted());
        assert!(!outcome.should_start);
    }

    #[tokio::test]
    async fn duplicate_and_full_are_reported_not_errors() {
        let (service, _repo) = service();
        let guild = GuildId::new(1);

        for n in 1..=3 {
            let outcome = service
                .enqueue(guild, track(n), UserId::new(10), "ana")
                .await
                .unwrap();
            assert!(outcome.accepted());
        }

        let dup = service
            .enqueue(guild, track(1), UserId::new(10), "ana")
            .await
            .unwrap();
        assert_eq!(dup.status, EnqueueStatus::Duplicate);

        let full = service
            .enqueue(guild, track(4), UserId::new(10), "ana")
            .await
            .unwrap();
        assert_eq!(full.status, EnqueueStatus::QueueFull);
        assert_eq!(full.queue_length, 3);
    }

    #[tokio::test]
    async fn overlong_track_is_rejected_before_touching_the_queue() {
        let (service, repo) = service();
        let guild = GuildId::new(1);

        let mut long = track(1);
        long.duration_seconds = Some(601);
        let outcome = service
            .enqueue(guild, long, UserId::new(10), "ana")
            .await
            .unwrap();
        assert_eq!(outcome.status, EnqueueStatus::TooLong);
        assert!(repo.get(guild).await.is_none());
    }

    #[tokio::test]
    async fn enqueue_next_jumps_the_line() {
        let (service, repo) = service();
        let guild = GuildId::new(1);

        service
            .enqueue(guild, track(1), UserId::new(10), "ana")
            .await
            .unwrap();
        let outcome = service
            .enqueue_next(guild, track(2), UserId::new(11), "leo")
            .await
            .unwrap();
        assert_eq!(outcome.position, Some(0));

        let stored = repo.get(guild).await.unwrap();
        assert_eq!(stored.peek().map(|t| t.title.as_str()), Some("Pista 2"));
    }

    #[tokio::test]
    async fn mutations_on_missing_session_are_noops() {
        let (service, _repo) = service();
        let guild = GuildId::new(1);

        assert_eq!(service.clear(guild).await.unwrap(), 0);
        assert!(service.remove(guild, 0).await.unwrap().is_none());
        assert!(!service.shuffle(guild).await.unwrap());
        assert!(!service.move_track(guild, 0, 1).await.unwrap());
    }

    #[tokio::test]
    async fn toggle_loop_persists_mode() {
        let (service, repo) = service();
        let guild = GuildId::new(1);

        assert_eq!(service.toggle_loop(guild).await.unwrap(), LoopMode::Track);
        assert_eq!(service.toggle_loop(guild).await.unwrap(), LoopMode::Queue);

        let stored = repo.get(guild).await.unwrap();
        assert_eq!(stored.loop_mode, LoopMode::Queue);
    }
}
