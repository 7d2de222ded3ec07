pub mod history;
pub mod sqlite;

pub use history::SqliteHistoryStore;
pub use sqlite::*;

use thiserror::Error;

use crate::models::ModelError;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Constraint violated: {0}")]
    ConstraintViolation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ModelError> for DatabaseError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::InvalidEnum { field, value } => Self::InvalidEnum { field, value },
        }
    }
}
