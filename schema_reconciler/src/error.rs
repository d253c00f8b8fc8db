//! Error types for the schema reconciler

use thiserror::Error;

/// Result type for reconciler operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the reconciler, one variant per stage
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Schema analysis error: {0}")]
    SchemaAnalysisError(String),

    #[error("Migration error: statement #{index} `{statement}` failed: {message}")]
    MigrationError {
        index: usize,
        statement: String,
        message: String,
    },

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl Error {
    /// Validation failure scoped to a table
    pub(crate) fn table(table: &str, message: impl std::fmt::Display) -> Self {
        Error::ValidationError(format!("table: {} {}", table, message))
    }

    /// Validation failure scoped to a column of a table
    pub(crate) fn column(table: &str, column: &str, message: impl std::fmt::Display) -> Self {
        Error::ValidationError(format!("table: {} column: {} {}", table, column, message))
    }
}

/// Convert Serde JSON errors to reconciler errors
impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::SerializationError(error.to_string())
    }
}

/// Convert TOML deserialization errors to reconciler errors
impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::ConfigError(error.to_string())
    }
}
