//! Error types for the SolveSpace engine
//!
//! All errors use thiserror for structured error handling.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store has not finished initializing")]
    StoreUnavailable,

    #[error("Problem not found: {0}")]
    ProblemNotFound(String),

    #[error("Import format error: {0}")]
    ImportFormat(String),

    #[error("Invalid problem: {0}")]
    InvalidProblem(String),

    #[error("Notification error: {0}")]
    Notification(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
