use anyhow::Result;
use dashmap::{DashMap, DashSet};
use parking_lot::RwLock;
use serenity::model::id::GuildId;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::domain::rules::PlaybackDomainService;
use crate::domain::session::PlaybackState;
use crate::domain::track::Track;
use crate::error::DomainError;
use crate::events::{DomainEvent, EventBus};
use crate::ports::{
    SessionRepository, TrackFinishedCallback, TrackHistoryRepository, TrackResolver,
    VoiceTransport,
};

/// Orquesta la reproducción por guild.
///
/// El flujo de arranque persiste la pista elegida ANTES de resolver su
/// stream: si el proceso muere en medio de la resolución, el estado en el
/// repositorio ya refleja la decisión y no se pierde la pista.
///
/// Un salto o un stop explícito suprimen el próximo aviso de fin de pista
/// del transporte, para no avanzar dos veces por el mismo corte.
pub struct PlaybackApplicationService {
    sessions: Arc<dyn SessionRepository>,
    history: Arc<dyn TrackHistoryRepository>,
    transport: Arc<dyn VoiceTransport>,
    resolver: Arc<dyn TrackResolver>,
    bus: Arc<EventBus>,

    pending_seek: DashMap<GuildId, Duration>,
    ignore_next_track_end: DashSet<GuildId>,
    on_track_finished: RwLock<Option<TrackFinishedCallback>>,
    max_resolve_retries: u32,
}

impl PlaybackApplicationService {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        history: Arc<dyn TrackHistoryRepository>,
        transport: Arc<dyn VoiceTransport>,
        resolver: Arc<dyn TrackResolver>,
        bus: Arc<EventBus>,
        max_resolve_retries: u32,
    ) -> Arc<Self> {
        Arc::new(Self {
            sessions,
            history,
            transport,
            resolver,
            bus,
            pending_seek: DashMap::new(),
            ignore_next_track_end: DashSet::new(),
            on_track_finished: RwLock::new(None),
            max_resolve_retries: max_resolve_retries.max(1),
        })
    }

    /// Engancha el servicio al aviso de fin de pista del transporte.
    pub fn register_track_end_handler(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        self.transport
            .register_end_of_track_callback(Arc::new(move |guild_id| {
                let weak = weak.clone();
                Box::pin(async move {
                    if let Some(service) = weak.upgrade() {
                        service.on_voice_track_end(guild_id).await;
                    }
                })
            }));
    }

    /// Callback opcional al terminar de procesar una pista.
    pub fn set_track_finished_callback(&self, callback: TrackFinishedCallback) {
        *self.on_track_finished.write() = Some(callback);
    }

    /// Arranca (o reanuda desde cero) la reproducción del guild.
    ///
    /// Devuelve `true` si quedó sonando una pista. Cada intento fallido de
    /// resolución descarta la pista elegida y prueba con la siguiente,
    /// hasta agotar el presupuesto de reintentos.
    pub async fn start_playback(&self, guild_id: GuildId, seek: Option<Duration>) -> Result<bool> {
        if let Some(seek) = seek {
            self.pending_seek.insert(guild_id, seek);
        }

        for attempt in 1..=self.max_resolve_retries {
            let session = self.sessions.get_or_create(guild_id).await;
            if session.is_playing() {
                return Ok(true);
            }

            let had_current = session.current_track.is_some();
            let candidate = session
                .current_track
                .clone()
                .or_else(|| session.peek().cloned());
            let Some(track) = candidate else {
                return Ok(false);
            };

            // La elección se persiste antes de resolver
            self.persist_playback_state(
                guild_id,
                Some(track.clone()),
                PlaybackState::Idle,
                !had_current,
            )
            .await?;

            let resolved = match self.ensure_stream_url(&track).await {
                Ok(Some(resolved)) => resolved,
                Ok(None) => {
                    warn!(
                        "⚠️ \"{}\" no se pudo resolver (intento {attempt}/{})",
                        track.title, self.max_resolve_retries
                    );
                    self.discard_current(guild_id).await?;
                    continue;
                }
                Err(e) => {
                    warn!(
                        "⚠️ Resolución de \"{}\" falló: {e} (intento {attempt}/{})",
                        track.title, self.max_resolve_retries
                    );
                    self.discard_current(guild_id).await?;
                    continue;
                }
            };

            let seek = self.pending_seek.remove(&guild_id).map(|(_, d)| d);
            if let Err(e) = self.transport.play(guild_id, &resolved, seek).await {
                warn!(
                    "⚠️ El transporte rechazó \"{}\": {e} (intento {attempt}/{})",
                    resolved.title, self.max_resolve_retries
                );
                self.discard_current(guild_id).await?;
                continue;
            }

            self.persist_playback_state(
                guild_id,
                Some(resolved.clone()),
                PlaybackState::Playing,
                false,
            )
            .await?;

            self.history.record_play(guild_id, &resolved).await;
            info!("🎵 Reproduciendo \"{}\" en el guild {guild_id}", resolved.title);
            self.bus
                .publish(DomainEvent::TrackStarted {
                    guild_id,
                    track: resolved,
                })
                .await;
            return Ok(true);
        }

        error!(
            "❌ Presupuesto de reintentos agotado en el guild {guild_id} ({} intentos)",
            self.max_resolve_retries
        );
        Ok(false)
    }

    pub async fn pause_playback(&self, guild_id: GuildId) -> Result<()> {
        let mut session = self
            .sessions
            .get(guild_id)
            .await
            .ok_or(DomainError::SessionNotFound {
                guild_id: guild_id.get(),
            })?;

        PlaybackDomainService::validate_transition(&session, PlaybackState::Paused)?;
        self.transport.pause(guild_id).await?;

        session.pause()?;
        self.sessions.save(&mut session).await?;
        info!("⏸️ Reproducción pausada en el guild {guild_id}");
        Ok(())
    }

    pub async fn resume_playback(&self, guild_id: GuildId) -> Result<()> {
        let mut session = self
            .sessions
            .get(guild_id)
            .await
            .ok_or(DomainError::SessionNotFound {
                guild_id: guild_id.get(),
            })?;

        if !PlaybackDomainService::can_resume(&session) {
            return Err(DomainError::InvalidOperation {
                current: session.state.as_str().to_string(),
                requested: PlaybackState::Playing.as_str().to_string(),
            }
            .into());
        }
        self.transport.resume(guild_id).await?;

        session.resume()?;
        self.sessions.save(&mut session).await?;
        info!("▶️ Reproducción reanudada en el guild {guild_id}");
        Ok(())
    }

    /// Detiene la reproducción descartando la pista actual. La cola queda
    /// intacta.
    pub async fn stop_playback(&self, guild_id: GuildId) -> Result<()> {
        let mut session = self
            .sessions
            .get(guild_id)
            .await
            .ok_or(DomainError::SessionNotFound {
                guild_id: guild_id.get(),
            })?;

        PlaybackDomainService::validate_transition(&session, PlaybackState::Stopped)?;

        // El stop del transporte dispara un fin de pista que no debe
        // provocar avance
        self.ignore_next_track_end.insert(guild_id);
        if let Err(e) = self.transport.stop(guild_id).await {
            self.ignore_next_track_end.remove(&guild_id);
            return Err(e);
        }

        let stopped = session.current_track.clone();
        session.stop()?;
        self.sessions.save(&mut session).await?;

        if let Some(track) = stopped {
            self.history.mark_finished(guild_id, &track.id, true).await;
        }
        info!("⏹️ Reproducción detenida en el guild {guild_id}");
        Ok(())
    }

    /// Salta la pista actual y arranca la siguiente si la hay.
    pub async fn skip_track(&self, guild_id: GuildId) -> Result<Option<Track>> {
        let Some(mut session) = self.sessions.get(guild_id).await else {
            return Ok(None);
        };
        let Some(skipped) = session.current_track.clone() else {
            return Ok(None);
        };

        self.ignore_next_track_end.insert(guild_id);
        if let Err(e) = self.transport.stop(guild_id).await {
            self.ignore_next_track_end.remove(&guild_id);
            return Err(e);
        }

        let next = session.advance_to_next_track();
        if next.is_some() && session.state != PlaybackState::Idle {
            session.transition_to(PlaybackState::Idle)?;
        }
        self.sessions.save(&mut session).await?;

        self.history.mark_finished(guild_id, &skipped.id, true).await;
        info!("⏭️ \"{}\" saltada en el guild {guild_id}", skipped.title);
        self.bus
            .publish(DomainEvent::TrackSkipped {
                guild_id,
                track: skipped.clone(),
            })
            .await;

        if next.is_some() {
            self.start_playback(guild_id, None).await?;
        }
        Ok(Some(skipped))
    }

    /// Reinicia la pista actual desde la posición dada.
    pub async fn seek(&self, guild_id: GuildId, position: Duration) -> Result<bool> {
        let Some(session) = self.sessions.get(guild_id).await else {
            return Ok(false);
        };
        let Some(current) = session.current_track.clone() else {
            return Ok(false);
        };

        self.ignore_next_track_end.insert(guild_id);
        if let Err(e) = self.transport.stop(guild_id).await {
            self.ignore_next_track_end.remove(&guild_id);
            return Err(e);
        }

        self.persist_playback_state(guild_id, Some(current), PlaybackState::Idle, false)
            .await?;
        self.start_playback(guild_id, Some(position)).await
    }

    /// Avance natural al terminar una pista.
    pub async fn handle_track_finished(&self, guild_id: GuildId) -> Result<()> {
        let Some(mut session) = self.sessions.get(guild_id).await else {
            return Ok(());
        };

        // Tras un stop explícito el fin de pista no provoca avance
        if session.state == PlaybackState::Stopped {
            return Ok(());
        }

        let finished = session.current_track.clone();
        let next = session.advance_to_next_track();
        if next.is_some() && session.state != PlaybackState::Idle {
            session.transition_to(PlaybackState::Idle)?;
        }
        self.sessions.save(&mut session).await?;

        if let Some(track) = finished {
            self.history.mark_finished(guild_id, &track.id, false).await;
            self.bus
                .publish(DomainEvent::TrackFinished {
                    guild_id,
                    track: track.clone(),
                })
                .await;

            let callback = self.on_track_finished.read().clone();
            if let Some(callback) = callback {
                if let Err(e) = callback(guild_id, track).await {
                    warn!("⚠️ Callback de fin de pista falló: {e}");
                }
            }
        }

        if next.is_some() {
            self.start_playback(guild_id, None).await?;
        } else {
            info!("📭 Cola agotada en el guild {guild_id}");
            self.bus
                .publish(DomainEvent::QueueExhausted { guild_id })
                .await;
        }
        Ok(())
    }

    /// Aviso de fin de pista desde el gateway de voz.
    pub async fn on_voice_track_end(&self, guild_id: GuildId) {
        if self.ignore_next_track_end.remove(&guild_id).is_some() {
            debug!("🔇 Fin de pista suprimido en el guild {guild_id}");
            return;
        }

        let has_current = self
            .sessions
            .get(guild_id)
            .await
            .map(|s| s.current_track.is_some())
            .unwrap_or(false);
        if !has_current {
            return;
        }

        if let Err(e) = self.handle_track_finished(guild_id).await {
            error!("❌ Error al avanzar la cola del guild {guild_id}: {e}");
        }
    }

    /// Libera todo lo asociado al guild.
    pub async fn cleanup_guild(&self, guild_id: GuildId) {
        if let Err(e) = self.transport.stop(guild_id).await {
            debug!("Stop durante limpieza del guild {guild_id}: {e}");
        }
        if let Err(e) = self.transport.disconnect(guild_id).await {
            debug!("Desconexión durante limpieza del guild {guild_id}: {e}");
        }

        self.pending_seek.remove(&guild_id);
        self.ignore_next_track_end.remove(&guild_id);
        self.sessions.delete(guild_id).await;
        info!("🗑️ Sesión del guild {guild_id} liberada");
    }

    async fn ensure_stream_url(&self, track: &Track) -> Result<Option<Track>> {
        if track.is_resolved() {
            return Ok(Some(track.clone()));
        }

        match self.resolver.resolve(&track.webpage_url).await? {
            Some(resolved) => Ok(Some(track.merged_with(resolved))),
            None => Ok(None),
        }
    }

    async fn discard_current(&self, guild_id: GuildId) -> Result<()> {
        self.persist_playback_state(guild_id, None, PlaybackState::Idle, false)
            .await
    }

    /// Escritura autoritativa del orquestador: reconcilia el estado tras
    /// I/O externa, por lo que no pasa por la tabla de transiciones.
    async fn persist_playback_state(
        &self,
        guild_id: GuildId,
        current: Option<Track>,
        state: PlaybackState,
        remove_from_queue: bool,
    ) -> Result<()> {
        for _ in 0..3 {
            let mut session = self.sessions.get_or_create(guild_id).await;
            if remove_from_queue {
                if let Some(track) = &current {
                    session.remove_first_matching(track);
                }
            }
            session.set_current_track(current.clone());
            session.state = state;

            match self.sessions.save(&mut session).await {
                Ok(()) => return Ok(()),
                Err(DomainError::Concurrency { .. }) => continue,
                Err(other) => return Err(other.into()),
            }
        }
        anyhow::bail!("no se pudo persistir el estado del guild {guild_id}")
    }
}
