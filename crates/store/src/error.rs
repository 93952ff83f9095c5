//! Error types for the catalog store

use thiserror::Error;

/// Result type alias using the store Error
pub type Result<T> = std::result::Result<T, Error>;

/// Store error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Record already exists: {kind} {key}")]
    AlreadyExists { kind: String, key: String },

    #[error("{kind} references {target} {id}, which has not been persisted")]
    DanglingReference {
        kind: String,
        target: String,
        id: String,
    },

    #[error("Fixture '{0}' is already registered")]
    DuplicateFixture(String),

    #[error("Unknown fixture reference: {0}")]
    UnknownReference(String),

    #[error("Fixture '{name}' failed: {reason}")]
    Fixture { name: String, reason: String },
}
