use serenity::model::id::GuildId;
use std::sync::Arc;
use tracing::info;

use crate::commands::CommandError;
use crate::playback::queue_service::QueueApplicationService;

#[derive(Debug, Clone)]
pub struct ClearQueueCommand {
    pub guild_id: GuildId,
    /// Quitar solo las sugerencias de la radio, conservando los pedidos.
    pub only_recommendations: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearQueueResponse {
    pub removed: usize,
}

impl ClearQueueResponse {
    pub fn message(&self) -> String {
        match self.removed {
            0 => "📭 La cola ya estaba vacía".to_string(),
            1 => "🗑️ 1 pista quitada de la cola".to_string(),
            n => format!("🗑️ {n} pistas quitadas de la cola"),
        }
    }
}

/// Flujo de /clear: vacía la cola sin tocar la pista actual.
pub struct ClearQueueHandler {
    queue: Arc<QueueApplicationService>,
}

impl ClearQueueHandler {
    pub fn new(queue: Arc<QueueApplicationService>) -> Self {
        Self { queue }
    }

    pub async fn execute(
        &self,
        cmd: ClearQueueCommand,
    ) -> Result<ClearQueueResponse, CommandError> {
        let removed = if cmd.only_recommendations {
            self.queue.clear_recommendations(cmd.guild_id).await?
        } else {
            self.queue.clear(cmd.guild_id).await?
        };

        info!("🗑️ /clear en el guild {}: {removed} pistas", cmd.guild_id);
        Ok(ClearQueueResponse { removed })
    }
}
