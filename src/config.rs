use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Colas
    pub max_queue_size: usize,
    pub max_track_duration: u64, // En segundos

    // Reproducción
    pub resolve_retry_limit: u32,

    // Votación
    pub vote_expiry_minutes: i64,
    pub small_audience_size: usize,

    // Historial
    pub history_limit: usize,

    // Paths
    pub data_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Colas
            max_queue_size: std::env::var("MAX_QUEUE_SIZE")
                .unwrap_or_else(|_| "50".to_string())
                .parse()?,
            max_track_duration: std::env::var("MAX_TRACK_DURATION")
                .unwrap_or_else(|_| "10800".to_string()) // 3 horas
                .parse()?,

            // Reproducción
            resolve_retry_limit: std::env::var("RESOLVE_RETRY_LIMIT")
                .unwrap_or_else(|_| "3".to_string())
                .parse()?,

            // Votación
            vote_expiry_minutes: std::env::var("VOTE_EXPIRY_MINUTES")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
            small_audience_size: std::env::var("SMALL_AUDIENCE_SIZE")
                .unwrap_or_else(|_| "2".to_string())
                .parse()?,

            // Historial
            history_limit: std::env::var("HISTORY_LIMIT")
                .unwrap_or_else(|_| "50".to_string())
                .parse()?,

            // Paths
            data_dir: std::env::var("DATA_DIR")
                .unwrap_or_else(|_| "/app/data".to_string())
                .into(),
        };

        // Validate configuration before returning
        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// Performs sanity checks on configuration values to catch
    /// common mistakes before any guild session is created.
    ///
    /// # Validation Rules
    ///
    /// - Queue size and track duration must be greater than 0
    /// - The resolve retry budget must be at least 1
    /// - Vote expiry must be a positive number of minutes
    pub fn validate(&self) -> Result<()> {
        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if self.max_track_duration == 0 {
            anyhow::bail!("Max track duration must be greater than 0");
        }

        if self.resolve_retry_limit == 0 {
            anyhow::bail!("Resolve retry limit must be at least 1");
        }

        if self.vote_expiry_minutes <= 0 {
            anyhow::bail!(
                "Vote expiry must be positive, got: {}",
                self.vote_expiry_minutes
            );
        }

        if self.history_limit == 0 {
            anyhow::bail!("History limit must be greater than 0");
        }

        Ok(())
    }

    /// Returns a summary of the current configuration for logging.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Queue: {} tracks max, {}s max duration\n  \
            Playback: {} resolve retries\n  \
            Voting: {}min expiry, small audience <= {}\n  \
            History: {} entries per guild",
            self.max_queue_size,
            self.max_track_duration,
            self.resolve_retry_limit,
            self.vote_expiry_minutes,
            self.small_audience_size,
            self.history_limit,
        )
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            max_queue_size: 50,
            max_track_duration: 10800, // 3 horas
            resolve_retry_limit: 3,
            vote_expiry_minutes: 5,
            small_audience_size: 2,
            history_limit: 50,
            data_dir: "/app/data".into(),
        }
    }
}
