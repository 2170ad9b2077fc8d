use axum::{routing::get, Json, Router};
use serde::Serialize;
use tracing::instrument;

use crate::{identity::extractors::FirebaseUser, state::AppState};

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub message: &'static str,
    pub user_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub claims_raw: serde_json::Map<String, serde_json::Value>,
}

pub fn profile_routes() -> Router<AppState> {
    Router::new().route("/profile", get(get_profile))
}

#[instrument(skip_all)]
pub async fn get_profile(FirebaseUser(user): FirebaseUser) -> Json<ProfileResponse> {
    Json(ProfileResponse {
        message: "Welcome! You are authenticated.",
        user_id: user.uid,
        email: user.email,
        name: user.name,
        claims_raw: user.claims,
    })
}
