use serenity::model::id::GuildId;
use std::sync::Arc;
use tracing::{info, warn};

use crate::events::{handler, DomainEvent, EventBus, EventKind, SubscriberId};
use crate::playback::playback_service::PlaybackApplicationService;
use crate::ports::RadioSource;

/// Modo radio: cuando la cola se agota, pide sugerencias a la fuente y
/// sigue reproduciendo sin intervención.
pub struct RadioAutoRefill {
    radio: Arc<dyn RadioSource>,
    playback: Arc<PlaybackApplicationService>,
    bus: Arc<EventBus>,
}

impl RadioAutoRefill {
    pub fn new(
        radio: Arc<dyn RadioSource>,
        playback: Arc<PlaybackApplicationService>,
        bus: Arc<EventBus>,
    ) -> Arc<Self> {
        Arc::new(Self {
            radio,
            playback,
            bus,
        })
    }

    /// Se suscribe al agotamiento de la cola.
    pub fn start(self: &Arc<Self>) -> SubscriberId {
        let weak = Arc::downgrade(self);
        self.bus.subscribe(
            EventKind::QueueExhausted,
            handler(move |event| {
                let weak = weak.clone();
                async move {
                    if let DomainEvent::QueueExhausted { guild_id } = event {
                        if let Some(subscriber) = weak.upgrade() {
                            subscriber.on_queue_exhausted(guild_id).await?;
                        }
                    }
                    Ok(())
                }
            }),
        )
    }

    async fn on_queue_exhausted(&self, guild_id: GuildId) -> anyhow::Result<()> {
        if !self.radio.is_enabled(guild_id) {
            return Ok(());
        }

        let added = match self.radio.refill(guild_id).await {
            Ok(added) => added,
            Err(e) => {
                warn!("⚠️ La radio no pudo rellenar la cola del guild {guild_id}: {e}");
                return Ok(());
            }
        };

        if added == 0 {
            return Ok(());
        }

        info!("📻 Radio: {added} sugerencias encoladas en el guild {guild_id}");
        self.playback.start_playback(guild_id, None).await?;
        Ok(())
    }
}
