//! Error types for campus-hub

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PortalError {
    #[error("Authentication required: {0}")]
    AuthRequired(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Directory error: {0}")]
    Directory(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<diesel::result::Error> for PortalError {
    fn from(e: diesel::result::Error) -> Self {
        PortalError::Database(e.to_string())
    }
}
