use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// How long a password reset code stays valid after it is issued.
pub const RESET_CODE_TTL: Duration = Duration::minutes(15);

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,                     // unique user ID
    pub name: String,                 // display name
    pub email: String,                // normalised email
    #[serde(skip_serializing)]
    pub hashed_password: String,      // Argon2 hash, not exposed in JSON
    pub is_verified: bool,            // set at creation, never enforced
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl User {
    /// Builds a fresh, unverified user with a new identifier.
    pub fn new(name: String, email: String, hashed_password: String) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            name,
            email,
            hashed_password,
            is_verified: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Row in `password_reset_tokens`; email is the primary key.
#[derive(Debug, Clone, FromRow)]
pub struct ResetCodeRow {
    pub email: String,
    pub code: String,
    pub expires_at: OffsetDateTime,
}

/// Outcome of checking a submitted reset code against the stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeCheck {
    Valid,
    NotFound,
    Mismatch,
    Expired,
}

impl ResetCodeRow {
    /// Mismatch is reported before expiry.
    pub fn check(&self, submitted: &str, now: OffsetDateTime) -> CodeCheck {
        if self.code != submitted {
            CodeCheck::Mismatch
        } else if self.expires_at <= now {
            CodeCheck::Expired
        } else {
            CodeCheck::Valid
        }
    }
}
