use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{CodeCheck, ResetCodeRow, User, RESET_CODE_TTL};

#[derive(Debug, Error)]
pub enum StoreError {
    /// Unique constraint on `users.email` was violated.
    #[error("email already registered")]
    Duplicate,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Persistence of users and single-use password reset codes.
///
/// Every call is a single atomic statement. Dropping the returned future
/// cancels the in-flight query.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn create_user(&self, user: &User) -> Result<(), StoreError>;

    /// `Ok(None)` when no user has this email.
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Replaces the password hash and bumps `updated_at`.
    async fn update_user_password(&self, user_id: Uuid, hashed_password: &str)
        -> Result<(), StoreError>;

    /// Upserts the code for `email`, superseding any previous one.
    async fn create_password_reset_code(&self, email: &str, code: &str) -> Result<(), StoreError>;

    async fn verify_password_reset_code(&self, email: &str, code: &str)
        -> Result<CodeCheck, StoreError>;

    /// Idempotent: deleting a missing code is not an error.
    async fn delete_password_reset_code(&self, email: &str) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct PgCredentialStore {
    db: PgPool,
}

impl PgCredentialStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, hashed_password, is_verified, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.hashed_password)
        .bind(user.is_verified)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.db)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db) = &e {
                if db.is_unique_violation() {
                    return StoreError::Duplicate;
                }
            }
            StoreError::Database(e)
        })?;
        Ok(())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, hashed_password, is_verified, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn update_user_password(
        &self,
        user_id: Uuid,
        hashed_password: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(r#"UPDATE users SET hashed_password = $1, updated_at = $2 WHERE id = $3"#)
            .bind(hashed_password)
            .bind(OffsetDateTime::now_utc())
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn create_password_reset_code(&self, email: &str, code: &str) -> Result<(), StoreError> {
        let expires_at = OffsetDateTime::now_utc() + RESET_CODE_TTL;
        sqlx::query(
            r#"
            INSERT INTO password_reset_tokens (email, code, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO UPDATE
            SET code = EXCLUDED.code, expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(email)
        .bind(code)
        .bind(expires_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn verify_password_reset_code(
        &self,
        email: &str,
        code: &str,
    ) -> Result<CodeCheck, StoreError> {
        let row = sqlx::query_as::<_, ResetCodeRow>(
            r#"SELECT email, code, expires_at FROM password_reset_tokens WHERE email = $1"#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;

        Ok(match row {
            Some(row) => row.check(code, OffsetDateTime::now_utc()),
            None => CodeCheck::NotFound,
        })
    }

    async fn delete_password_reset_code(&self, email: &str) -> Result<(), StoreError> {
        sqlx::query(r#"DELETE FROM password_reset_tokens WHERE email = $1"#)
            .bind(email)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}
