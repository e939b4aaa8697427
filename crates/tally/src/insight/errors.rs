use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during insight storage operations.
#[derive(Debug, Error)]
pub enum InsightError {
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Not found: {context}")]
    NotFound { context: String },

    #[error("Expected {expected} row(s) affected, got {actual}")]
    UnexpectedRowsAffected { expected: u64, actual: u64 },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
}

impl InsightError {
    pub fn insight_not_found(id: Uuid) -> Self {
        Self::NotFound {
            context: format!("insight id={id}"),
        }
    }

    pub fn repository_not_found(full_name: &str) -> Self {
        Self::NotFound {
            context: format!("repository {full_name}"),
        }
    }
}

pub type Result<T> = std::result::Result<T, InsightError>;
