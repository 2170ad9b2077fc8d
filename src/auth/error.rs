use thiserror::Error;

use crate::auth::repo::StoreError;

/// Failure kinds of the authentication service.
///
/// Callers branch on the variant, never on the message.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    #[error("a user with this email already exists")]
    DuplicateEmail,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("reset code not found for this email")]
    CodeNotFound,
    #[error("invalid verification code")]
    CodeMismatch,
    #[error("verification code expired")]
    CodeExpired,
    #[error("failed to hash password: {0}")]
    Hashing(anyhow::Error),
    #[error("failed to generate auth token: {0}")]
    Token(anyhow::Error),
    #[error("persistence failure: {0}")]
    Persistence(#[source] StoreError),
    #[error("internal failure: {0}")]
    Internal(String),
}

impl AuthError {
    /// Stable machine-readable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::Validation(_) => "VALIDATION_ERROR",
            AuthError::DuplicateEmail => "DUPLICATE_EMAIL",
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::CodeNotFound => "CODE_NOT_FOUND",
            AuthError::CodeMismatch => "CODE_MISMATCH",
            AuthError::CodeExpired => "CODE_EXPIRED",
            AuthError::Hashing(_) => "HASHING_FAILURE",
            AuthError::Token(_) => "TOKEN_FAILURE",
            AuthError::Persistence(_) => "PERSISTENCE_FAILURE",
            AuthError::Internal(_) => "INTERNAL_FAILURE",
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate => AuthError::DuplicateEmail,
            other => AuthError::Persistence(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_store_error_maps_to_duplicate_email() {
        let err: AuthError = StoreError::Duplicate.into();
        assert!(matches!(err, AuthError::DuplicateEmail));
        assert_eq!(err.code(), "DUPLICATE_EMAIL");
    }

    #[test]
    fn database_error_maps_to_persistence() {
        let err: AuthError = StoreError::Database(sqlx::Error::PoolTimedOut).into();
        assert!(matches!(err, AuthError::Persistence(_)));
        assert_eq!(err.code(), "PERSISTENCE_FAILURE");
    }

    #[test]
    fn reset_code_messages_are_specific() {
        assert_eq!(AuthError::CodeNotFound.to_string(), "reset code not found for this email");
        assert_eq!(AuthError::CodeMismatch.to_string(), "invalid verification code");
        assert_eq!(AuthError::CodeExpired.to_string(), "verification code expired");
    }
}
