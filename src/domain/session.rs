use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serenity::model::id::GuildId;
use std::collections::VecDeque;

use crate::domain::track::{Track, TrackId};
use crate::error::DomainError;

/// Estado de reproducción de un guild.
///
/// Transiciones permitidas:
/// - Idle -> Playing
/// - Playing -> Paused | Stopped | Idle
/// - Paused -> Playing | Stopped | Idle
/// - Stopped -> Idle | Playing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
    Stopped,
}

impl PlaybackState {
    pub fn can_transition_to(self, target: PlaybackState) -> bool {
        use PlaybackState::*;
        matches!(
            (self, target),
            (Idle, Playing)
                | (Playing, Paused)
                | (Playing, Stopped)
                | (Playing, Idle)
                | (Paused, Playing)
                | (Paused, Stopped)
                | (Paused, Idle)
                | (Stopped, Idle)
                | (Stopped, Playing)
        )
    }

    /// Reproduciendo o en pausa.
    pub fn is_active(self) -> bool {
        matches!(self, PlaybackState::Playing | PlaybackState::Paused)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Stopped => "stopped",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopMode {
    Off,
    Track,
    Queue,
}

impl LoopMode {
    /// Cicla Off -> Track -> Queue -> Off.
    pub fn next_mode(self) -> LoopMode {
        match self {
            LoopMode::Off => LoopMode::Track,
            LoopMode::Track => LoopMode::Queue,
            LoopMode::Queue => LoopMode::Off,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LoopMode::Off => "off",
            LoopMode::Track => "track",
            LoopMode::Queue => "queue",
        }
    }
}

fn default_max_queue_size() -> usize {
    GuildPlaybackSession::DEFAULT_MAX_QUEUE_SIZE
}

/// Agregado de sesión de reproducción por guild.
///
/// Invariantes: la cola nunca supera `max_queue_size`; ningún id de pista
/// aparece dos veces entre la cola y la pista actual; las transiciones de
/// estado respetan la tabla de `PlaybackState`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildPlaybackSession {
    pub guild_id: GuildId,
    pub queue: VecDeque<Track>,
    pub current_track: Option<Track>,
    pub state: PlaybackState,
    pub loop_mode: LoopMode,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,

    /// Contador para concurrencia optimista; el repositorio lo compara
    /// al guardar y lo incrementa en cada escritura exitosa.
    pub revision: u64,

    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
}

impl GuildPlaybackSession {
    pub const DEFAULT_MAX_QUEUE_SIZE: usize = 50;

    pub fn new(guild_id: GuildId, max_queue_size: usize) -> Self {
        let now = Utc::now();
        Self {
            guild_id,
            queue: VecDeque::new(),
            current_track: None,
            state: PlaybackState::Idle,
            loop_mode: LoopMode::Off,
            created_at: now,
            last_activity: now,
            revision: 0,
            max_queue_size,
        }
    }

    pub fn queue_length(&self) -> usize {
        self.queue.len()
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn is_paused(&self) -> bool {
        self.state == PlaybackState::Paused
    }

    pub fn is_idle(&self) -> bool {
        self.state == PlaybackState::Idle
    }

    pub fn has_tracks(&self) -> bool {
        self.current_track.is_some() || !self.queue.is_empty()
    }

    pub fn can_add_to_queue(&self) -> bool {
        self.queue.len() < self.max_queue_size
    }

    /// Actualiza la marca de última actividad.
    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Busca el id en la cola y en la pista actual.
    pub fn contains_track(&self, id: &TrackId) -> bool {
        if let Some(current) = &self.current_track {
            if &current.id == id {
                return true;
            }
        }
        self.queue.iter().any(|t| &t.id == id)
    }

    fn check_can_enqueue(&self, track: &Track) -> Result<(), DomainError> {
        if self.contains_track(&track.id) {
            return Err(DomainError::BusinessRuleViolation {
                rule: "DUPLICATE_TRACK",
                message: format!("\"{}\" ya está en la cola o reproduciéndose", track.title),
            });
        }
        if !self.can_add_to_queue() {
            return Err(DomainError::BusinessRuleViolation {
                rule: "MAX_QUEUE_SIZE",
                message: format!("La cola está llena (máximo {} pistas)", self.max_queue_size),
            });
        }
        Ok(())
    }

    /// Agrega una pista al final de la cola y devuelve su posición.
    pub fn enqueue(&mut self, track: Track) -> Result<usize, DomainError> {
        self.check_can_enqueue(&track)?;
        self.queue.push_back(track);
        self.touch();
        Ok(self.queue.len() - 1)
    }

    /// Agrega una pista al frente de la cola (reproducir a continuación).
    pub fn enqueue_next(&mut self, track: Track) -> Result<usize, DomainError> {
        self.check_can_enqueue(&track)?;
        self.queue.push_front(track);
        self.touch();
        Ok(0)
    }

    /// Saca y devuelve la próxima pista de la cola.
    pub fn dequeue(&mut self) -> Option<Track> {
        let track = self.queue.pop_front();
        if track.is_some() {
            self.touch();
        }
        track
    }

    /// Mira la próxima pista sin sacarla.
    pub fn peek(&self) -> Option<&Track> {
        self.queue.front()
    }

    pub fn remove_at(&mut self, position: usize) -> Option<Track> {
        let track = self.queue.remove(position);
        if track.is_some() {
            self.touch();
        }
        track
    }

    /// Vacía la cola y devuelve cuántas pistas había.
    pub fn clear_queue(&mut self) -> usize {
        let count = self.queue.len();
        self.queue.clear();
        self.touch();
        count
    }

    /// Elimina solo las pistas sugeridas automáticamente.
    pub fn clear_recommendations(&mut self) -> usize {
        let before = self.queue.len();
        self.queue.retain(|t| !t.is_from_recommendation);
        let removed = before - self.queue.len();
        if removed > 0 {
            self.touch();
        }
        removed
    }

    /// Quita de la cola la primera pista que corresponde a `target`.
    ///
    /// Dos entradas corresponden si comparten id y marca de pedido; sin
    /// marca, se comparan id, URL y solicitante.
    pub fn remove_first_matching(&mut self, target: &Track) -> bool {
        let position = self.queue.iter().position(|t| tracks_match(t, target));
        match position {
            Some(index) => {
                self.queue.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn set_current_track(&mut self, track: Option<Track>) {
        self.current_track = track;
        self.touch();
    }

    /// Transición validada contra la tabla de estados.
    pub fn transition_to(&mut self, target: PlaybackState) -> Result<(), DomainError> {
        if !self.state.can_transition_to(target) {
            return Err(DomainError::InvalidOperation {
                current: self.state.as_str().to_string(),
                requested: target.as_str().to_string(),
            });
        }
        self.state = target;
        self.touch();
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), DomainError> {
        self.transition_to(PlaybackState::Paused)
    }

    pub fn resume(&mut self) -> Result<(), DomainError> {
        self.transition_to(PlaybackState::Playing)
    }

    /// Detiene por completo: valida la transición y descarta la pista actual.
    pub fn stop(&mut self) -> Result<(), DomainError> {
        self.transition_to(PlaybackState::Stopped)?;
        self.current_track = None;
        Ok(())
    }

    /// Vuelve al estado inicial descartando pista y cola.
    pub fn reset(&mut self) {
        self.state = PlaybackState::Idle;
        self.current_track = None;
        self.queue.clear();
        self.touch();
    }

    /// Avanza según el modo de repetición.
    ///
    /// - `Track`: devuelve la pista actual sin tocarla.
    /// - `Queue`: reencola la actual al final antes de sacar la próxima.
    /// - `Off`: saca la cabeza de la cola.
    ///
    /// Sin próxima pista, la sesión queda en Idle.
    pub fn advance_to_next_track(&mut self) -> Option<Track> {
        if self.loop_mode == LoopMode::Track {
            if let Some(current) = &self.current_track {
                return Some(current.clone());
            }
        }

        if self.loop_mode == LoopMode::Queue {
            if let Some(current) = self.current_track.take() {
                self.queue.push_back(current);
            }
        }

        let next = self.dequeue();
        self.current_track = next.clone();

        if next.is_none() {
            self.state = PlaybackState::Idle;
        }

        next
    }

    /// Cicla el modo de repetición y devuelve el nuevo.
    pub fn toggle_loop(&mut self) -> LoopMode {
        self.loop_mode = self.loop_mode.next_mode();
        self.touch();
        self.loop_mode
    }

    /// Mezcla la cola.
    pub fn shuffle(&mut self) {
        let mut items: Vec<Track> = self.queue.drain(..).collect();
        items.shuffle(&mut rand::thread_rng());
        self.queue.extend(items);
        self.touch();
    }

    pub fn move_track(&mut self, from: usize, to: usize) -> bool {
        if from >= self.queue.len() || to >= self.queue.len() {
            return false;
        }
        if let Some(track) = self.queue.remove(from) {
            self.queue.insert(to, track);
            self.touch();
        }
        true
    }
}

fn tracks_match(left: &Track, right: &Track) -> bool {
    if left.requested_at.is_some() && right.requested_at.is_some() {
        return left.id == right.id && left.requested_at == right.requested_at;
    }
    left.id == right.id
        && left.webpage_url == right.webpage_url
        && left.requested_by == right.requested_by
}
