use thiserror::Error;

#[derive(Error, Debug)]
pub enum PaperGraphError {
    /// Rejected before any mutation: unknown enum value, missing field, bad transition.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A storage-level uniqueness constraint fired.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Storage unavailable or a transaction was rolled back. Safe to retry.
    #[error("Database error: {0}")]
    Database(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl PaperGraphError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Client-side mistakes; everything else is the server's problem.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::NotFound { .. } | Self::Forbidden(_) | Self::Conflict(_)
        )
    }
}

impl From<sqlx::Error> for PaperGraphError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::NotFound {
                entity: "row",
                id: "?".to_string(),
            },
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::Conflict(db.message().to_string())
            }
            sqlx::Error::Database(db) if db.is_check_violation() => {
                Self::Validation(db.message().to_string())
            }
            _ => Self::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for PaperGraphError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation(format!("invalid JSON: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, PaperGraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_formats_entity_and_id() {
        let err = PaperGraphError::not_found("task", 42);
        assert_eq!(err.to_string(), "task not found: 42");
        assert!(err.is_not_found());
        assert!(err.is_client_error());
    }

    #[test]
    fn database_errors_are_not_client_errors() {
        let err: PaperGraphError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, PaperGraphError::Database(_)));
        assert!(!err.is_client_error());
    }
}
