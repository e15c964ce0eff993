use crate::domain::session::{GuildPlaybackSession, LoopMode, PlaybackState};
use crate::domain::track::Track;
use crate::error::DomainError;

/// Reglas puras sobre la cola. Sin efectos ni I/O.
pub struct QueueDomainService;

impl QueueDomainService {
    /// ¿Hay lugar para encolar otra pista?
    pub fn can_enqueue(session: &GuildPlaybackSession) -> bool {
        session.can_add_to_queue()
    }

    /// Acepta duración desconocida o dentro del límite.
    pub fn validate_duration(track: &Track, max_duration_seconds: u64) -> bool {
        match track.duration_seconds {
            None => true,
            Some(duration) => duration <= max_duration_seconds,
        }
    }

    /// Próxima pista según el modo de repetición: con loop de pista se
    /// repite la actual, si no, la cabeza de la cola.
    pub fn next_track(session: &GuildPlaybackSession) -> Option<&Track> {
        if session.loop_mode == LoopMode::Track {
            if let Some(current) = &session.current_track {
                return Some(current);
            }
        }
        session.peek()
    }

    /// ¿Debe continuar el avance automático al terminar una pista?
    ///
    /// Nunca tras un stop explícito; sí cuando queda cola, o cuando el
    /// loop de cola puede reencolar la pista actual.
    pub fn should_auto_advance(session: &GuildPlaybackSession) -> bool {
        if session.state == PlaybackState::Stopped {
            return false;
        }

        if !session.queue.is_empty() {
            return true;
        }

        session.loop_mode == LoopMode::Queue && session.current_track.is_some()
    }
}

/// Reglas puras sobre la reproducción.
pub struct PlaybackDomainService;

impl PlaybackDomainService {
    pub fn can_start(session: &GuildPlaybackSession) -> bool {
        session.has_tracks() && session.state != PlaybackState::Playing
    }

    pub fn can_pause(session: &GuildPlaybackSession) -> bool {
        session.state == PlaybackState::Playing
    }

    pub fn can_resume(session: &GuildPlaybackSession) -> bool {
        session.state == PlaybackState::Paused
    }

    pub fn can_skip(session: &GuildPlaybackSession) -> bool {
        session.current_track.is_some()
    }

    /// Valida una transición sin aplicarla.
    pub fn validate_transition(
        session: &GuildPlaybackSession,
        target: PlaybackState,
    ) -> Result<(), DomainError> {
        if !session.state.can_transition_to(target) {
            return Err(DomainError::InvalidOperation {
                current: session.state.as_str().to_string(),
                requested: target.as_str().to_string(),
            });
        }
        Ok(())
    }
}
