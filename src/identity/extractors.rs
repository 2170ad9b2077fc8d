use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
    Json,
};
use serde_json::{json, Value};
use tracing::warn;

use super::{IdentityClaims, IdentityVerifier};

/// Extracts and verifies the provider ID token, returning its claims.
pub struct FirebaseUser(pub IdentityClaims);

#[async_trait]
impl<S> FromRequestParts<S> for FirebaseUser
where
    S: Send + Sync,
    Arc<dyn IdentityVerifier>: FromRef<S>,
{
    type Rejection = (StatusCode, Json<Value>);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let reject = |msg: &str| (StatusCode::UNAUTHORIZED, Json(json!({ "error": msg })));

        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .filter(|h| !h.is_empty())
            .ok_or_else(|| reject("Authorization header required"))?;

        // Expect "Bearer <token>"
        let token = match header.split_once(' ') {
            Some(("Bearer", token)) if !token.is_empty() && !token.contains(' ') => token,
            _ => return Err(reject("Authorization format must be Bearer <token>")),
        };

        let verifier = <Arc<dyn IdentityVerifier> as FromRef<S>>::from_ref(state);
        let claims = verifier.verify(token).await.map_err(|e| {
            warn!(error = %e, "identity token rejected");
            reject("Invalid or expired token")
        })?;

        Ok(FirebaseUser(claims))
    }
}
