//! Database error types

use thiserror::Error;

/// Database errors
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate entry: {0}")]
    Duplicate(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl DbError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// The store could not be reached at all, as opposed to rejecting a request
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            DbError::Connection(_) | DbError::Timeout(_) | DbError::Unavailable(_)
        )
    }

    /// Short label used for logging and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            DbError::Connection(_) => "connection",
            DbError::Query(_) => "query",
            DbError::Serialization(_) => "serialization",
            DbError::NotFound(_) => "not_found",
            DbError::Duplicate(_) => "duplicate",
            DbError::Migration(_) => "migration",
            DbError::Configuration(_) => "configuration",
            DbError::Timeout(_) => "timeout",
            DbError::Unavailable(_) => "unavailable",
        }
    }
}

impl From<serde_json::Error> for DbError {
    fn from(e: serde_json::Error) -> Self {
        DbError::Serialization(e.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_classification() {
        assert!(DbError::unavailable("down").is_unavailable());
        assert!(DbError::Timeout("3s".into()).is_unavailable());
        assert!(DbError::Connection("refused".into()).is_unavailable());
        assert!(!DbError::not_found("drone").is_unavailable());
        assert!(!DbError::query("syntax").is_unavailable());
    }
}
