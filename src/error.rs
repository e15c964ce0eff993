use thiserror::Error;

/// Errores de dominio del núcleo de reproducción.
///
/// Todas las violaciones de reglas se modelan como valores y se recuperan
/// en el borde de los servicios de aplicación; nunca cruzan esa frontera
/// como panic.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Regla de negocio violada [{rule}]: {message}")]
    BusinessRuleViolation { rule: &'static str, message: String },

    #[error("Operación inválida: no se puede pasar de '{current}' a '{requested}'")]
    InvalidOperation { current: String, requested: String },

    #[error("Validación fallida en '{field}': {message}")]
    Validation { field: &'static str, message: String },

    #[error("Conflicto de concurrencia al guardar la sesión del guild {guild_id}")]
    Concurrency { guild_id: u64 },

    #[error("No existe sesión para el guild {guild_id}")]
    SessionNotFound { guild_id: u64 },

    #[error("Umbral de votos inválido: {0}")]
    InvalidThreshold(usize),
}

impl DomainError {
    /// Código estable del error, útil para respuestas etiquetadas.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::BusinessRuleViolation { .. } => "BUSINESS_RULE_VIOLATION",
            DomainError::InvalidOperation { .. } => "INVALID_OPERATION",
            DomainError::Validation { .. } => "VALIDATION_ERROR",
            DomainError::Concurrency { .. } => "CONCURRENCY_ERROR",
            DomainError::SessionNotFound { .. } => "SESSION_NOT_FOUND",
            DomainError::InvalidThreshold(_) => "INVALID_THRESHOLD",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn codes_are_stable() {
        let err = DomainError::BusinessRuleViolation {
            rule: "MAX_QUEUE_SIZE",
            message: "llena".into(),
        };
        assert_eq!(err.code(), "BUSINESS_RULE_VIOLATION");

        let err = DomainError::Concurrency { guild_id: 1 };
        assert_eq!(err.code(), "CONCURRENCY_ERROR");
    }

    #[test]
    fn display_includes_states() {
        let err = DomainError::InvalidOperation {
            current: "idle".into(),
            requested: "paused".into(),
        };
        let text = err.to_string();
        assert!(text.contains("idle"));
        assert!(text.contains("paused"));
    }
}
