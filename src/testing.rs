//! In-process doubles for the store, mailer and identity provider.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{
    auth::{
        repo::{CredentialStore, StoreError},
        repo_types::{CodeCheck, ResetCodeRow, User, RESET_CODE_TTL},
    },
    identity::{IdentityClaims, IdentityVerifier},
    mail::ResetCodeSender,
};

fn unavailable() -> StoreError {
    StoreError::Database(sqlx::Error::PoolTimedOut)
}

/// Credential store over hash maps with a movable clock and switches for
/// failure injection.
#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<HashMap<String, User>>,
    codes: Mutex<HashMap<String, ResetCodeRow>>,
    clock_offset_secs: AtomicI64,
    pub fail_lookups: AtomicBool,
    /// Lookups report "absent" even when the user exists.
    pub blind_lookups: AtomicBool,
    pub fail_code_writes: AtomicBool,
    pub fail_code_deletes: AtomicBool,
}

impl MemoryStore {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc() + Duration::seconds(self.clock_offset_secs.load(Ordering::SeqCst))
    }

    pub fn advance(&self, by: Duration) {
        self.clock_offset_secs
            .fetch_add(by.whole_seconds(), Ordering::SeqCst);
    }

    pub fn user_count(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    pub fn stored_code(&self, email: &str) -> Option<String> {
        self.codes.lock().unwrap().get(email).map(|r| r.code.clone())
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.users.lock().unwrap();
        if users.contains_key(&user.email) {
            return Err(StoreError::Duplicate);
        }
        users.insert(user.email.clone(), user.clone());
        Ok(())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        if self.blind_lookups.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(self.users.lock().unwrap().get(email).cloned())
    }

    async fn update_user_password(
        &self,
        user_id: Uuid,
        hashed_password: &str,
    ) -> Result<(), StoreError> {
        let now = self.now();
        let mut users = self.users.lock().unwrap();
        if let Some(user) = users.values_mut().find(|u| u.id == user_id) {
            user.hashed_password = hashed_password.to_string();
            user.updated_at = now;
        }
        Ok(())
    }

    async fn create_password_reset_code(&self, email: &str, code: &str) -> Result<(), StoreError> {
        if self.fail_code_writes.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        let row = ResetCodeRow {
            email: email.to_string(),
            code: code.to_string(),
            expires_at: self.now() + RESET_CODE_TTL,
        };
        self.codes.lock().unwrap().insert(email.to_string(), row);
        Ok(())
    }

    async fn verify_password_reset_code(
        &self,
        email: &str,
        code: &str,
    ) -> Result<CodeCheck, StoreError> {
        let now = self.now();
        Ok(match self.codes.lock().unwrap().get(email) {
            Some(row) => row.check(code, now),
            None => CodeCheck::NotFound,
        })
    }

    async fn delete_password_reset_code(&self, email: &str) -> Result<(), StoreError> {
        if self.fail_code_deletes.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.codes.lock().unwrap().remove(email);
        Ok(())
    }
}

/// Records every code it is asked to deliver.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<(String, String)>>,
    pub fail: AtomicBool,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResetCodeSender for RecordingMailer {
    async fn send_password_reset_code(&self, to_email: &str, code: &str) -> anyhow::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("smtp relay unreachable");
        }
        self.sent
            .lock()
            .unwrap()
            .push((to_email.to_string(), code.to_string()));
        Ok(())
    }
}

/// Accepts exactly one token and returns fixed claims for it.
pub struct StaticVerifier {
    pub token: String,
    pub claims: IdentityClaims,
}

#[async_trait]
impl IdentityVerifier for StaticVerifier {
    async fn verify(&self, token: &str) -> anyhow::Result<IdentityClaims> {
        if token == self.token {
            Ok(self.claims.clone())
        } else {
            anyhow::bail!("token rejected")
        }
    }
}
