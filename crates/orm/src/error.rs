//! Error types for the ORM system
//!
//! Every fallible operation in the crate returns [`ModelResult`]. Executor
//! failures are surfaced as [`ModelError::QueryExecution`] without retry;
//! unknown relations are rejected as [`ModelError::InvalidRelation`] before
//! any SQL is sent.

/// Result type alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// ORM error type alias
pub type OrmError = ModelError;

/// ORM result type alias
pub type OrmResult<T> = ModelResult<T>;

/// Error types for ORM operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    /// The requested relation is not declared on the model
    #[error("Relation '{relation}' is not defined on model '{model}'")]
    InvalidRelation { model: String, relation: String },

    /// The executor failed to run a statement
    #[error("Query execution failed: {0}")]
    QueryExecution(String),

    /// Database connection or pool error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Model not found in database
    #[error("Record not found in table '{0}'")]
    NotFound(String),

    /// Input rejected before reaching the database
    #[error("Validation error: {0}")]
    Validation(String),

    /// Primary key is missing or invalid
    #[error("Primary key is missing or invalid")]
    MissingPrimaryKey,

    /// A result row did not contain the requested column
    #[error("Column '{0}' not found")]
    ColumnNotFound(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ModelError {
    /// Shorthand for an unknown relation on `model`
    pub fn invalid_relation(model: &str, relation: &str) -> Self {
        ModelError::InvalidRelation {
            model: model.to_string(),
            relation: relation.to_string(),
        }
    }
}

// Convert from sqlx errors
impl From<sqlx::Error> for ModelError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::ColumnNotFound(column) => ModelError::ColumnNotFound(column),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                ModelError::Connection(err.to_string())
            }
            other => ModelError::QueryExecution(other.to_string()),
        }
    }
}

// Convert from serde_json errors
impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_relation_message() {
        let err = ModelError::invalid_relation("posts", "authors");
        assert_eq!(
            err.to_string(),
            "Relation 'authors' is not defined on model 'posts'"
        );
    }

    #[test]
    fn test_sqlx_errors_map_to_variants() {
        let err: ModelError = sqlx::Error::ColumnNotFound("comments_count".to_string()).into();
        assert_eq!(err, ModelError::ColumnNotFound("comments_count".to_string()));

        let err: ModelError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, ModelError::Connection(_)));

        let err: ModelError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, ModelError::QueryExecution(_)));
    }
}
