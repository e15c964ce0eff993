use dashmap::DashMap;
use futures::future::{join_all, BoxFuture};
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

use crate::domain::track::Track;

/// Eventos de dominio publicados por los servicios de aplicación.
#[derive(Debug, Clone)]
pub enum DomainEvent {
    TrackStarted {
        guild_id: GuildId,
        track: Track,
    },
    TrackFinished {
        guild_id: GuildId,
        track: Track,
    },
    TrackSkipped {
        guild_id: GuildId,
        track: Track,
    },
    QueueExhausted {
        guild_id: GuildId,
    },
    VoiceMemberJoined {
        guild_id: GuildId,
        user_id: UserId,
        channel_id: ChannelId,
    },
    VoiceMemberLeft {
        guild_id: GuildId,
        user_id: UserId,
        channel_id: ChannelId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    TrackStarted,
    TrackFinished,
    TrackSkipped,
    QueueExhausted,
    VoiceMemberJoined,
    VoiceMemberLeft,
}

impl DomainEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            DomainEvent::TrackStarted { .. } => EventKind::TrackStarted,
            DomainEvent::TrackFinished { .. } => EventKind::TrackFinished,
            DomainEvent::TrackSkipped { .. } => EventKind::TrackSkipped,
            DomainEvent::QueueExhausted { .. } => EventKind::QueueExhausted,
            DomainEvent::VoiceMemberJoined { .. } => EventKind::VoiceMemberJoined,
            DomainEvent::VoiceMemberLeft { .. } => EventKind::VoiceMemberLeft,
        }
    }

    pub fn guild_id(&self) -> GuildId {
        match self {
            DomainEvent::TrackStarted { guild_id, .. }
            | DomainEvent::TrackFinished { guild_id, .. }
            | DomainEvent::TrackSkipped { guild_id, .. }
            | DomainEvent::QueueExhausted { guild_id }
            | DomainEvent::VoiceMemberJoined { guild_id, .. }
            | DomainEvent::VoiceMemberLeft { guild_id, .. } => *guild_id,
        }
    }
}

pub type EventHandler =
    Arc<dyn Fn(DomainEvent) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Identificador de suscripción, para poder darse de baja.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriberId(u64);

/// Bus de eventos en memoria.
///
/// Se inyecta como `Arc<EventBus>` en los servicios que publican y en los
/// suscriptores. `publish` despacha los handlers del tipo en concurrencia
/// y espera a todos; sus errores se loguean sin cortar la publicación.
pub struct EventBus {
    handlers: DashMap<EventKind, Vec<(SubscriberId, EventHandler)>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn subscribe(&self, kind: EventKind, handler: EventHandler) -> SubscriberId {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers.entry(kind).or_default().push((id, handler));
        debug!("📡 Suscripción registrada para {kind:?}");
        id
    }

    pub fn unsubscribe(&self, kind: EventKind, id: SubscriberId) -> bool {
        if let Some(mut entry) = self.handlers.get_mut(&kind) {
            let before = entry.len();
            entry.retain(|(sub_id, _)| *sub_id != id);
            return entry.len() < before;
        }
        false
    }

    /// Publica un evento a todos los suscriptores de su tipo.
    pub async fn publish(&self, event: DomainEvent) {
        let kind = event.kind();

        // Se copian los handlers antes de esperar, para no retener el
        // lock del mapa a través de un await
        let handlers: Vec<EventHandler> = match self.handlers.get(&kind) {
            Some(entry) => entry.iter().map(|(_, h)| h.clone()).collect(),
            None => return,
        };

        debug!(
            "📡 Publicando {kind:?} (guild {}) a {} suscriptores",
            event.guild_id(),
            handlers.len()
        );

        let futures = handlers.iter().map(|handler| handler(event.clone()));
        for result in join_all(futures).await {
            if let Err(e) = result {
                error!("❌ Suscriptor de {kind:?} falló: {e}");
            }
        }
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map(|e| e.len()).unwrap_or(0)
    }

    pub fn clear(&self) {
        self.handlers.clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Envuelve una clausura async como handler del bus.
pub fn handler<F, Fut>(f: F) -> EventHandler
where
    F: Fn(DomainEvent) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |event| Box::pin(f(event)))
}
