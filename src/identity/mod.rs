use std::sync::Arc;

use async_trait::async_trait;
use axum::{extract::FromRef, Router};
use serde::Serialize;

use crate::state::AppState;

pub mod extractors;
pub mod firebase;
pub mod handlers;

/// Identity asserted by the third-party provider for a request.
#[derive(Debug, Clone, Serialize)]
pub struct IdentityClaims {
    pub uid: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub claims: serde_json::Map<String, serde_json::Value>,
}

/// Verifies a provider-issued ID token.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> anyhow::Result<IdentityClaims>;
}

impl FromRef<AppState> for Arc<dyn IdentityVerifier> {
    fn from_ref(state: &AppState) -> Self {
        state.identity.clone()
    }
}

pub fn router() -> Router<AppState> {
    handlers::profile_routes()
}
