use thiserror::Error;

/// Errors from the repository layer
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Invalid connection string: {0}")]
    InvalidConnectionString(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unknown column '{column}' on table '{table}'")]
    UnknownColumn { table: &'static str, column: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}
