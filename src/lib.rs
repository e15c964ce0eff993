//! # Open Groove
//!
//! Núcleo de orquestación de reproducción para bots de música de Discord:
//! colas por guild, máquina de estados de reproducción, votaciones de
//! salto y modo radio.
//!
//! La biblioteca no habla con Discord directamente: el gateway de voz y
//! el extractor de streams entran por los traits de [`ports`], y el bot
//! arma los servicios de [`playback`] y los handlers de [`commands`]
//! encima.

pub mod commands;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod playback;
pub mod ports;
pub mod queries;
pub mod storage;

pub use config::Config;
pub use error::DomainError;
pub use events::{DomainEvent, EventBus, EventKind};
pub use playback::{PlaybackApplicationService, QueueApplicationService};
pub use queries::PlaybackQueries;

/// Inicializa el logging para bots que no traen su propio subscriber.
///
/// Respeta `RUST_LOG` y por defecto deja la biblioteca en `debug` y
/// serenity en `info`. Falla si ya hay un subscriber global instalado.
pub fn init_tracing() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("open_groove=debug".parse()?)
                .add_directive("serenity=info".parse()?),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("No se pudo instalar el subscriber: {e}"))?;
    Ok(())
}
