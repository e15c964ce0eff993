use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serenity::model::id::{GuildId, UserId};
use std::collections::HashSet;

use crate::domain::track::{Track, TrackId};
use crate::error::DomainError;

/// Acciones sometibles a votación.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    Skip,
    Stop,
    Clear,
}

impl VoteType {
    pub fn action_verb(self) -> &'static str {
        match self {
            VoteType::Skip => "saltar",
            VoteType::Stop => "detener",
            VoteType::Clear => "limpiar",
        }
    }

    pub fn past_tense(self) -> &'static str {
        match self {
            VoteType::Skip => "saltada",
            VoteType::Stop => "detenida",
            VoteType::Clear => "limpiada",
        }
    }
}

/// Resultado de intentar emitir un voto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteResult {
    // Resultados positivos
    VoteRecorded,
    ThresholdMet,
    RequesterSkip,
    AutoSkip,

    // Voto no contado
    AlreadyVoted,
    NoPlaying,
    NotInChannel,
    BotNotInChannel,

    // Errores
    VoteExpired,
    InvalidVote,
}

impl VoteResult {
    pub fn is_success(self) -> bool {
        matches!(
            self,
            VoteResult::VoteRecorded
                | VoteResult::ThresholdMet
                | VoteResult::RequesterSkip
                | VoteResult::AutoSkip
        )
    }

    /// ¿El resultado implica ejecutar la acción votada?
    pub fn action_executed(self) -> bool {
        matches!(
            self,
            VoteResult::ThresholdMet | VoteResult::RequesterSkip | VoteResult::AutoSkip
        )
    }

    /// Mensaje para el usuario.
    pub fn message(self, vote_type: VoteType, votes: usize, needed: usize) -> String {
        match self {
            VoteResult::VoteRecorded => format!(
                "Voto registrado ({votes}/{needed} para {})",
                vote_type.action_verb()
            ),
            VoteResult::ThresholdMet => format!(
                "Umbral alcanzado, pista {}.",
                vote_type.past_tense()
            ),
            VoteResult::RequesterSkip => format!(
                "Pista {} por quien la pidió.",
                vote_type.past_tense()
            ),
            VoteResult::AutoSkip => format!(
                "Pista {} automáticamente (audiencia chica).",
                vote_type.past_tense()
            ),
            VoteResult::AlreadyVoted => "Ya votaste.".to_string(),
            VoteResult::NoPlaying => "No hay nada reproduciéndose.".to_string(),
            VoteResult::NotInChannel => {
                "Tenés que estar en el canal de voz para votar.".to_string()
            }
            VoteResult::BotNotInChannel => "No estoy en un canal de voz.".to_string(),
            VoteResult::VoteExpired => "La votación expiró.".to_string(),
            VoteResult::InvalidVote => "Voto inválido.".to_string(),
        }
    }
}

/// Agregado de votación: una sesión por (guild, acción).
///
/// Los votos se deduplican por votante. Una sesión que apunta a un id de
/// pista viejo debe reiniciarse antes de reutilizarse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteSession {
    pub guild_id: GuildId,
    pub track_id: TrackId,
    pub vote_type: VoteType,
    pub threshold: usize,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default = "default_expiry_minutes")]
    expiry_minutes: i64,
    voters: HashSet<UserId>,
}

fn default_expiry_minutes() -> i64 {
    VoteSession::DEFAULT_EXPIRATION_MINUTES
}

impl VoteSession {
    pub const DEFAULT_EXPIRATION_MINUTES: i64 = 5;

    pub fn new(
        guild_id: GuildId,
        track_id: TrackId,
        vote_type: VoteType,
        threshold: usize,
    ) -> Result<Self, DomainError> {
        if threshold < 1 {
            return Err(DomainError::InvalidThreshold(threshold));
        }

        let started_at = Utc::now();
        Ok(Self {
            guild_id,
            track_id,
            vote_type,
            threshold,
            started_at,
            expires_at: started_at + Duration::minutes(Self::DEFAULT_EXPIRATION_MINUTES),
            expiry_minutes: Self::DEFAULT_EXPIRATION_MINUTES,
            voters: HashSet::new(),
        })
    }

    /// Fija la ventana de expiración (config `VOTE_EXPIRY_MINUTES`); cada
    /// reinicio de la sesión la reutiliza.
    pub fn with_expiry_minutes(mut self, minutes: i64) -> Self {
        self.expiry_minutes = minutes;
        self.expires_at = self.started_at + Duration::minutes(minutes);
        self
    }

    pub fn expiry_minutes(&self) -> i64 {
        self.expiry_minutes
    }

    /// Sesión de voto de salto con umbral calculado de la audiencia.
    pub fn create_skip_session(
        guild_id: GuildId,
        track_id: TrackId,
        listener_count: usize,
    ) -> Result<Self, DomainError> {
        let threshold = VotingDomainService::calculate_threshold(listener_count);
        Self::new(guild_id, track_id, VoteType::Skip, threshold)
    }

    pub fn vote_count(&self) -> usize {
        self.voters.len()
    }

    pub fn votes_needed(&self) -> usize {
        self.threshold.saturating_sub(self.vote_count())
    }

    pub fn is_threshold_met(&self) -> bool {
        self.vote_count() >= self.threshold
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Chequeo único de validez: pista vieja o sesión expirada.
    pub fn is_stale(&self, current_track_id: &TrackId) -> bool {
        &self.track_id != current_track_id || self.is_expired()
    }

    pub fn has_voted(&self, user_id: UserId) -> bool {
        self.voters.contains(&user_id)
    }

    pub fn voters(&self) -> &HashSet<UserId> {
        &self.voters
    }

    /// Registra un voto; devuelve true si con él se alcanza el umbral.
    pub fn add_vote(&mut self, user_id: UserId) -> bool {
        if self.has_voted(user_id) {
            return false;
        }
        self.voters.insert(user_id);
        self.is_threshold_met()
    }

    pub fn remove_vote(&mut self, user_id: UserId) -> bool {
        self.voters.remove(&user_id)
    }

    /// Reinicia la sesión para una pista nueva.
    pub fn reset(&mut self, new_track_id: Option<TrackId>) {
        self.voters.clear();
        self.started_at = Utc::now();
        self.expires_at = self.started_at + Duration::minutes(self.expiry_minutes);
        if let Some(track_id) = new_track_id {
            self.track_id = track_id;
        }
    }

    pub fn extend_expiration(&mut self, minutes: i64) {
        self.expires_at = Utc::now() + Duration::minutes(minutes);
    }

    /// Ajusta el umbral cuando cambia la audiencia.
    pub fn update_threshold(&mut self, new_threshold: usize) -> Result<(), DomainError> {
        if new_threshold < 1 {
            return Err(DomainError::InvalidThreshold(new_threshold));
        }
        self.threshold = new_threshold;
        Ok(())
    }

    pub fn progress_string(&self) -> String {
        format!("{}/{} votos", self.vote_count(), self.threshold)
    }
}

/// Reglas puras de votación.
pub struct VotingDomainService;

impl VotingDomainService {
    pub const MINIMUM_THRESHOLD: usize = 1;
    /// Tamaño de audiencia chica por defecto (config `SMALL_AUDIENCE_SIZE`):
    /// con esta cantidad de oyentes o menos, cualquiera puede saltar.
    pub const SMALL_AUDIENCE_SIZE: usize = 2;

    /// Mayoría simple: más de la mitad de los oyentes, mínimo 1.
    pub fn calculate_threshold(listener_count: usize) -> usize {
        if listener_count == 0 {
            return Self::MINIMUM_THRESHOLD;
        }
        std::cmp::max(Self::MINIMUM_THRESHOLD, listener_count / 2 + 1)
    }

    /// ¿Puede saltar sin votación? Quien pidió la pista siempre; con
    /// `small_audience` oyentes o menos, cualquiera.
    pub fn can_auto_skip(
        user_id: UserId,
        track: &Track,
        listener_count: usize,
        small_audience: usize,
    ) -> bool {
        if track.was_requested_by(user_id) {
            return true;
        }
        listener_count <= small_audience
    }

    /// Evalúa un voto en orden: fuera del canal, expirado, auto-salto,
    /// ya votado y recién entonces registro.
    pub fn evaluate_vote(
        session: &mut VoteSession,
        user_id: UserId,
        track: Option<&Track>,
        listener_count: usize,
        small_audience: usize,
        user_in_channel: bool,
    ) -> VoteResult {
        if !user_in_channel {
            return VoteResult::NotInChannel;
        }

        if session.is_expired() {
            return VoteResult::VoteExpired;
        }

        if let Some(track) = track {
            if listener_count > 0 {
                if track.was_requested_by(user_id) {
                    return VoteResult::RequesterSkip;
                }
                if listener_count <= small_audience {
                    return VoteResult::AutoSkip;
                }
            }
        }

        if session.has_voted(user_id) {
            return VoteResult::AlreadyVoted;
        }

        if session.add_vote(user_id) {
            VoteResult::ThresholdMet
        } else {
            VoteResult::VoteRecorded
        }
    }

    /// ¿Hay que reiniciar la sesión? Pista distinta o expiración.
    pub fn should_reset_session(session: &VoteSession, current_track_id: &TrackId) -> bool {
        session.is_stale(current_track_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn track_for(user: u64) -> Track {
        Track::new("Pista", "https://example.com/pista")
            .unwrap()
            .with_requester(UserId::new(user), "nombre", None)
    }

    fn skip_session(threshold: usize) -> VoteSession {
        VoteSession::new(
            GuildId::new(1),
            TrackId::from_url("https://example.com/pista"),
            VoteType::Skip,
            threshold,
        )
        .unwrap()
    }

    #[test]
    fn threshold_is_majority_with_floor_of_one() {
        assert_eq!(VotingDomainService::calculate_threshold(0), 1);
        assert_eq!(VotingDomainService::calculate_threshold(1), 1);
        assert_eq!(VotingDomainService::calculate_threshold(2), 2);
        assert_eq!(VotingDomainService::calculate_threshold(3), 2);
        assert_eq!(VotingDomainService::calculate_threshold(4), 3);
    }

    #[test]
    fn requester_and_small_audience_can_auto_skip() {
        let track = track_for(10);
        assert!(VotingDomainService::can_auto_skip(UserId::new(10), &track, 20, 2));
        assert!(VotingDomainService::can_auto_skip(UserId::new(99), &track, 2, 2));
        assert!(!VotingDomainService::can_auto_skip(UserId::new(99), &track, 3, 2));
    }

    #[test]
    fn small_audience_size_is_configurable() {
        let track = track_for(10);
        let stranger = UserId::new(99);

        // Con el corte en 4, una sala de 4 salta sin votación
        assert!(VotingDomainService::can_auto_skip(stranger, &track, 4, 4));
        assert!(!VotingDomainService::can_auto_skip(stranger, &track, 5, 4));

        let mut session = skip_session(3);
        assert_eq!(
            VotingDomainService::evaluate_vote(&mut session, stranger, Some(&track), 4, 4, true),
            VoteResult::AutoSkip
        );
        assert_eq!(
            VotingDomainService::evaluate_vote(&mut session, stranger, Some(&track), 5, 4, true),
            VoteResult::VoteRecorded
        );
    }

    #[test]
    fn expiry_window_follows_configured_minutes() {
        let session = skip_session(2).with_expiry_minutes(1);
        assert_eq!(session.expiry_minutes(), 1);
        assert_eq!(session.expires_at - session.started_at, Duration::minutes(1));
    }

    #[test]
    fn reset_rearms_with_configured_window() {
        let mut session = skip_session(2).with_expiry_minutes(10);
        session.reset(None);
        assert_eq!(session.expires_at - session.started_at, Duration::minutes(10));
    }

    #[test]
    fn zero_threshold_is_rejected() {
        let result = VoteSession::new(
            GuildId::new(1),
            TrackId::from_url("https://example.com/x"),
            VoteType::Skip,
            0,
        );
        assert!(matches!(result, Err(DomainError::InvalidThreshold(0))));
    }

    #[test]
    fn repeated_vote_is_not_double_counted() {
        let mut session = skip_session(3);
        let track = track_for(10);
        let voter = UserId::new(20);

        let first =
            VotingDomainService::evaluate_vote(&mut session, voter, Some(&track), 5, 2, true);
        assert_eq!(first, VoteResult::VoteRecorded);
        assert_eq!(session.vote_count(), 1);

        let second =
            VotingDomainService::evaluate_vote(&mut session, voter, Some(&track), 5, 2, true);
        assert_eq!(second, VoteResult::AlreadyVoted);
        assert_eq!(session.vote_count(), 1);
    }

    #[test]
    fn threshold_met_on_final_vote() {
        let mut session = skip_session(2);
        let track = track_for(10);

        assert_eq!(
            VotingDomainService::evaluate_vote(
                &mut session,
                UserId::new(20),
                Some(&track),
                5,
                2,
                true
            ),
            VoteResult::VoteRecorded
        );
        assert_eq!(
            VotingDomainService::evaluate_vote(
                &mut session,
                UserId::new(21),
                Some(&track),
                5,
                2,
                true
            ),
            VoteResult::ThresholdMet
        );
    }

    #[test]
    fn checks_run_in_order() {
        let mut session = skip_session(3);
        let track = track_for(10);

        // Fuera del canal gana a todo lo demás
        assert_eq!(
            VotingDomainService::evaluate_vote(
                &mut session,
                UserId::new(10),
                Some(&track),
                5,
                2,
                false
            ),
            VoteResult::NotInChannel
        );

        // Expirado gana al auto-salto
        session.expires_at = Utc::now() - Duration::minutes(1);
        assert_eq!(
            VotingDomainService::evaluate_vote(
                &mut session,
                UserId::new(10),
                Some(&track),
                5,
                2,
                true
            ),
            VoteResult::VoteExpired
        );

        // Quien pidió la pista saltea la votación
        session.reset(None);
        assert_eq!(
            VotingDomainService::evaluate_vote(
                &mut session,
                UserId::new(10),
                Some(&track),
                5,
                2,
                true
            ),
            VoteResult::RequesterSkip
        );
        assert_eq!(session.vote_count(), 0);
    }

    #[test]
    fn stale_check_covers_track_change_and_expiry() {
        let mut session = skip_session(2);
        let same = TrackId::from_url("https://example.com/pista");
        let other = TrackId::from_url("https://example.com/otra");

        assert!(!session.is_stale(&same));
        assert!(session.is_stale(&other));

        session.expires_at = Utc::now() - Duration::minutes(1);
        assert!(session.is_stale(&same));
        assert!(VotingDomainService::should_reset_session(&session, &same));
    }

    #[test]
    fn reset_clears_votes_and_rearms_expiry() {
        let mut session = skip_session(2);
        session.add_vote(UserId::new(1));
        session.expires_at = Utc::now() - Duration::minutes(1);

        let new_id = TrackId::from_url("https://example.com/nueva");
        session.reset(Some(new_id.clone()));

        assert_eq!(session.vote_count(), 0);
        assert_eq!(session.track_id, new_id);
        assert!(!session.is_expired());
    }

    #[test]
    fn progress_string_shows_count_and_threshold() {
        let mut session = skip_session(3);
        session.add_vote(UserId::new(1));
        assert_eq!(session.progress_string(), "1/3 votos");
        assert_eq!(session.votes_needed(), 2);
    }
}
