use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serenity::model::id::UserId;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::OnceLock;

use crate::error::DomainError;

/// Identificador estable de una pista.
///
/// Para URLs de YouTube se extrae el id del video; para cualquier otra
/// fuente se usa un hash del URL. El id es estable entre copias y entre
/// reinicios del proceso.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

fn youtube_patterns() -> &'static [Regex; 2] {
    static PATTERNS: OnceLock<[Regex; 2]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(
                r"(?:youtube\.com/watch\?v=|youtu\.be/|youtube\.com/embed/)([a-zA-Z0-9_-]{11})",
            )
            .expect("regex de YouTube inválida"),
            Regex::new(r"youtube\.com/shorts/([a-zA-Z0-9_-]{11})")
                .expect("regex de shorts inválida"),
        ]
    })
}

impl TrackId {
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(DomainError::Validation {
                field: "track_id",
                message: "el id de pista no puede estar vacío".into(),
            });
        }
        Ok(Self(value))
    }

    /// Deriva el id a partir de un URL.
    pub fn from_url(url: &str) -> Self {
        for pattern in youtube_patterns() {
            if let Some(captures) = pattern.captures(url) {
                if let Some(id) = captures.get(1) {
                    return Self(id.as_str().to_string());
                }
            }
        }

        // Fallback: hash del URL completo
        let digest = Sha256::digest(url.as_bytes());
        let hex: String = digest.iter().take(8).map(|b| format!("{b:02x}")).collect();
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pista reproducible. Valor inmutable: toda modificación produce una
/// copia nueva con el mismo id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub webpage_url: String,
    pub stream_url: Option<String>,
    pub duration_seconds: Option<u64>,
    pub thumbnail_url: Option<String>,

    // Metadatos del resolver
    pub artist: Option<String>,
    pub uploader: Option<String>,
    pub like_count: Option<u64>,
    pub view_count: Option<u64>,

    // Metadatos del pedido (se fijan al encolar)
    pub requested_by: Option<UserId>,
    pub requested_by_name: Option<String>,
    pub requested_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub is_from_recommendation: bool,
}

impl Track {
    /// Crea una pista mínima a partir de título y URL.
    pub fn new(title: impl Into<String>, webpage_url: impl Into<String>) -> Result<Self, DomainError> {
        let title = title.into();
        let webpage_url = webpage_url.into();

        if title.is_empty() {
            return Err(DomainError::Validation {
                field: "title",
                message: "el título no puede estar vacío".into(),
            });
        }
        if webpage_url.is_empty() {
            return Err(DomainError::Validation {
                field: "webpage_url",
                message: "el URL no puede estar vacío".into(),
            });
        }

        Ok(Self {
            id: TrackId::from_url(&webpage_url),
            title,
            webpage_url,
            stream_url: None,
            duration_seconds: None,
            thumbnail_url: None,
            artist: None,
            uploader: None,
            like_count: None,
            view_count: None,
            requested_by: None,
            requested_by_name: None,
            requested_at: None,
            is_from_recommendation: false,
        })
    }

    /// Copia con metadatos del solicitante.
    pub fn with_requester(
        &self,
        user_id: UserId,
        user_name: impl Into<String>,
        requested_at: Option<DateTime<Utc>>,
    ) -> Self {
        let mut track = self.clone();
        track.requested_by = Some(user_id);
        track.requested_by_name = Some(user_name.into());
        track.requested_at = Some(requested_at.unwrap_or_else(Utc::now));
        track
    }

    pub fn was_requested_by(&self, user_id: UserId) -> bool {
        self.requested_by == Some(user_id)
    }

    /// Combina esta pista con los campos resueltos, conservando id,
    /// URL y metadatos del pedido.
    pub fn merged_with(&self, resolved: Track) -> Self {
        Self {
            id: self.id.clone(),
            title: if resolved.title.is_empty() {
                self.title.clone()
            } else {
                resolved.title
            },
            webpage_url: self.webpage_url.clone(),
            stream_url: resolved.stream_url,
            duration_seconds: resolved.duration_seconds.or(self.duration_seconds),
            thumbnail_url: resolved.thumbnail_url.or_else(|| self.thumbnail_url.clone()),
            artist: resolved.artist.or_else(|| self.artist.clone()),
            uploader: resolved.uploader.or_else(|| self.uploader.clone()),
            like_count: resolved.like_count.or(self.like_count),
            view_count: resolved.view_count.or(self.view_count),
            requested_by: self.requested_by,
            requested_by_name: self.requested_by_name.clone(),
            requested_at: self.requested_at,
            is_from_recommendation: self.is_from_recommendation,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.stream_url.is_some()
    }

    /// Formatea la duración como MM:SS o H:MM:SS.
    pub fn duration_formatted(&self) -> String {
        match self.duration_seconds {
            None => "Unknown".to_string(),
            Some(total) => {
                let hours = total / 3600;
                let minutes = (total % 3600) / 60;
                let seconds = total % 60;
                if hours > 0 {
                    format!("{hours}:{minutes:02}:{seconds:02}")
                } else {
                    format!("{minutes}:{seconds:02}")
                }
            }
        }
    }

    /// Título con duración, para mensajes al usuario.
    pub fn display_title(&self) -> String {
        if self.duration_seconds.is_some() {
            format!("{} [{}]", self.title, self.duration_formatted())
        } else {
            self.title.clone()
        }
    }
}
