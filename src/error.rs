//! Errors raised by the core operations (authentication, owned stores, aggregation).
//!
//! The API layer maps these onto HTTP responses in `api::error`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The record does not exist or belongs to another user
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// Bad credentials. Never says which half of the pair was wrong.
    #[error("{0}")]
    Unauthorized(String),

    #[error("{field}: {message}")]
    Validation { field: String, message: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Internal(String),
}

impl Error {
    pub fn not_found(entity: &str, id: &str) -> Self {
        Self::NotFound(format!("{} with ID {} not found", entity, id))
    }

    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// True when the error came from a UNIQUE constraint in the store
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::Database(sqlx::Error::Database(db_err)) => {
                db_err.message().contains("UNIQUE constraint failed")
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_names_entity_and_id() {
        let err = Error::not_found("Patient", "abc");
        assert_eq!(err.to_string(), "Patient with ID abc not found");
    }

    #[test]
    fn test_validation_display() {
        let err = Error::validation("month", "Month must be between 1 and 12");
        assert_eq!(err.to_string(), "month: Month must be between 1 and 12");
    }
}
