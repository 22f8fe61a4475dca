use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Constraint violation: {message}")]
    ConstraintViolation { message: String },

    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Invalid amount: {amount}")]
    InvalidAmount { amount: f64 },

    #[error("Invalid {field}: {day} (must be between 1 and 27)")]
    InvalidStatementDay { field: &'static str, day: i32 },

    #[error("Invalid last four digits: '{digits}'")]
    InvalidLastFourDigits { digits: String },

    #[error("Invalid name: {message}")]
    InvalidName { message: String },

    #[error("A transaction requires at least one subtransaction")]
    EmptyTransaction,

    #[error("Tag {parent_id} cannot become the parent of tag {tag_id}: it is the tag itself or one of its descendants")]
    TagCycle { tag_id: i64, parent_id: i64 },

    #[error("Invalid limit: {limit} (must be positive)")]
    InvalidLimit { limit: usize },
}

impl Error {
    /// Converts a database error into a rejected-write error when it stems from a
    /// uniqueness or foreign-key constraint, leaving every other error untouched.
    #[must_use]
    pub fn from_write(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(message)) => Self::ConstraintViolation {
                message: format!("unique constraint failed: {message}"),
            },
            Some(SqlErr::ForeignKeyConstraintViolation(message)) => Self::ConstraintViolation {
                message: format!("foreign key constraint failed: {message}"),
            },
            _ => Self::Database(err),
        }
    }
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
