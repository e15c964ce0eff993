use anyhow::Result;
use dashmap::DashMap;
use parking_lot::RwLock;
use serenity::model::id::{GuildId, UserId};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::events::{handler, DomainEvent, EventBus, EventKind, SubscriberId};
use crate::playback::playback_service::PlaybackApplicationService;
use crate::ports::{PromptCallback, SessionRepository, VoiceTransport};

/// Reacciona cuando quien pidió la pista actual abandona el canal de voz.
///
/// Sin más oyentes, la pista se salta directamente. Con oyentes restantes
/// se pausa la reproducción y se les pregunta si quieren seguir.
///
/// Un lock por guild serializa las salidas en ráfaga: dos abandonos casi
/// simultáneos no deben producir dos saltos.
pub struct AutoSkipOnRequesterLeave {
    sessions: Arc<dyn SessionRepository>,
    playback: Arc<PlaybackApplicationService>,
    transport: Arc<dyn VoiceTransport>,
    bus: Arc<EventBus>,
    guild_locks: DashMap<GuildId, Arc<Mutex<()>>>,
    prompt: RwLock<Option<PromptCallback>>,
}

impl AutoSkipOnRequesterLeave {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        playback: Arc<PlaybackApplicationService>,
        transport: Arc<dyn VoiceTransport>,
        bus: Arc<EventBus>,
    ) -> Arc<Self> {
        Arc::new(Self {
            sessions,
            playback,
            transport,
            bus,
            guild_locks: DashMap::new(),
            prompt: RwLock::new(None),
        })
    }

    /// Callback para avisar en el canal de texto al pausar.
    pub fn set_prompt_callback(&self, callback: PromptCallback) {
        *self.prompt.write() = Some(callback);
    }

    /// Se suscribe a las salidas del canal de voz.
    pub fn start(self: &Arc<Self>) -> SubscriberId {
        let weak = Arc::downgrade(self);
        self.bus.subscribe(
            EventKind::VoiceMemberLeft,
            handler(move |event| {
                let weak = weak.clone();
                async move {
                    if let DomainEvent::VoiceMemberLeft {
                        guild_id, user_id, ..
                    } = event
                    {
                        if let Some(subscriber) = weak.upgrade() {
                            subscriber.on_member_left(guild_id, user_id).await?;
                        }
                    }
                    Ok(())
                }
            }),
        )
    }

    async fn on_member_left(&self, guild_id: GuildId, user_id: UserId) -> Result<()> {
        let lock = self
            .guild_locks
            .entry(guild_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let Some(session) = self.sessions.get(guild_id).await else {
            return Ok(());
        };
        if !session.state.is_active() {
            return Ok(());
        }
        let Some(track) = session.current_track.clone() else {
            return Ok(());
        };
        if !track.was_requested_by(user_id) {
            return Ok(());
        }

        let remaining: Vec<UserId> = self
            .transport
            .list_listeners(guild_id)
            .await
            .into_iter()
            .filter(|u| *u != user_id)
            .collect();

        if remaining.is_empty() {
            info!(
                "⏭️ \"{}\" saltada: se fue quien la pidió y no queda nadie escuchando",
                track.title
            );
            self.playback.skip_track(guild_id).await?;
            return Ok(());
        }

        if session.is_playing() {
            self.playback.pause_playback(guild_id).await?;
        }
        info!(
            "⏸️ \"{}\" pausada: se fue quien la pidió ({} oyentes quedan)",
            track.title,
            remaining.len()
        );

        let prompt = self.prompt.read().clone();
        if let Some(prompt) = prompt {
            let message = format!(
                "⏸️ **{}** quedó pausada porque se fue quien la pidió. ¿Seguimos?",
                track.title
            );
            if let Err(e) = prompt(guild_id, message).await {
                warn!("⚠️ No se pudo avisar en el canal de texto: {e}");
            }
        }
        Ok(())
    }
}
