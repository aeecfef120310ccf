use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("Not found: {entity} with {field}={value}")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("No capacity left at parking location {0}")]
    NoCapacity(String),

    #[error("User {0} already holds an active reservation")]
    AlreadyReserved(String),

    #[error("Concurrent modification: {0}")]
    Conflict(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Validation: {0}")]
    Validation(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl DomainError {
    pub fn location_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "ParkingLocation",
            field: "id",
            value: id.into(),
        }
    }

    pub fn reservation_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "Reservation",
            field: "id",
            value: id.into(),
        }
    }

    /// Whether the operation may succeed if retried against the store.
    pub fn is_transient(&self) -> bool {
        matches!(self, DomainError::Conflict(_))
    }

    /// Short machine-readable label, used for metrics and API payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::NoCapacity(_) => "no_capacity",
            Self::AlreadyReserved(_) => "already_reserved",
            Self::Conflict(_) => "conflict",
            Self::Unavailable(_) => "unavailable",
            Self::Validation(_) => "validation",
            Self::Forbidden(_) => "forbidden",
        }
    }
}

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<InfraError> for DomainError {
    fn from(err: InfraError) -> Self {
        match err {
            InfraError::Database(db) => db_err(db),
            other => DomainError::Unavailable(other.to_string()),
        }
    }
}

/// Map a SeaORM error onto the domain taxonomy.
///
/// SQLite lock contention surfaces as `Conflict` so the allocator retries it;
/// everything else means the store is unreachable or broken.
pub fn db_err(e: sea_orm::DbErr) -> DomainError {
    let msg = e.to_string();
    let lower = msg.to_ascii_lowercase();
    if lower.contains("database is locked") || lower.contains("busy") {
        DomainError::Conflict(msg)
    } else {
        DomainError::Unavailable(format!("Database error: {}", msg))
    }
}

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;
