/// Modelo de dominio: pistas, sesiones por guild, reglas y votación.
pub mod rules;
pub mod session;
pub mod track;
pub mod voting;

pub use rules::{PlaybackDomainService, QueueDomainService};
pub use session::{GuildPlaybackSession, LoopMode, PlaybackState};
pub use track::{Track, TrackId};
pub use voting::{VoteResult, VoteSession, VoteType, VotingDomainService};
