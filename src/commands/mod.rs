//! Casos de uso disparados por interacciones del usuario: cada comando es
//! un par pedido/resultado sobre los servicios de aplicación.

use thiserror::Error;

use crate::error::DomainError;

pub mod clear_queue;
pub mod play_track;
pub mod skip_track;
pub mod stop_playback;
pub mod vote_skip;

pub use clear_queue::{ClearQueueCommand, ClearQueueHandler, ClearQueueResponse};
pub use play_track::{PlayTrackCommand, PlayTrackHandler, PlayTrackResponse};
pub use skip_track::{SkipTrackCommand, SkipTrackHandler, SkipTrackResponse};
pub use stop_playback::{StopPlaybackCommand, StopPlaybackHandler, StopPlaybackResponse};
pub use vote_skip::{VoteSkipCommand, VoteSkipHandler, VoteSkipResponse};

/// Errores que los comandos devuelven al borde de Discord.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("No pude conectarme al canal de voz: {0}")]
    Voice(String),

    #[error("No encontré nada para \"{0}\"")]
    TrackNotFound(String),

    #[error("No se pudo resolver la pista: {0}")]
    Resolution(String),

    #[error("No hay nada reproduciéndose")]
    NothingPlaying,

    #[error("Hacen falta más votos para saltar ({0} oyentes en el canal)")]
    VoteRequired(usize),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CommandError {
    /// Código estable para respuestas etiquetadas.
    pub fn code(&self) -> &'static str {
        match self {
            CommandError::Voice(_) => "VOICE_ERROR",
            CommandError::TrackNotFound(_) => "TRACK_NOT_FOUND",
            CommandError::Resolution(_) => "RESOLUTION_ERROR",
            CommandError::NothingPlaying => "NOTHING_PLAYING",
            CommandError::VoteRequired(_) => "VOTE_REQUIRED",
            CommandError::Domain(e) => e.code(),
            CommandError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
