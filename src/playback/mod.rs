/// Servicios de aplicación: orquestan dominio, repositorios y transporte.
pub mod autoskip;
pub mod playback_service;
pub mod queue_service;
pub mod radio;

#[cfg(test)]
pub(crate) mod fakes;

pub use autoskip::AutoSkipOnRequesterLeave;
pub use playback_service::PlaybackApplicationService;
pub use queue_service::{EnqueueOutcome, EnqueueStatus, QueueApplicationService};
pub use radio::RadioAutoRefill;
