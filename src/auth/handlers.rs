use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::json;
use tracing::{error, instrument, warn};

use crate::{
    auth::{
        code::RESET_CODE_LEN,
        dto::{
            AuthResponse, ForgotPasswordRequest, ForgotPasswordResponse, LoginRequest,
            RegisterRequest, ResetPasswordRequest,
        },
        error::AuthError,
    },
    state::AppState,
};

const MIN_PASSWORD_LEN: usize = 8;
const FORGOT_PASSWORD_MESSAGE: &str =
    "If the email is registered, a password reset code has been sent.";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email.trim())
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let code = self.code();
        let (status, body) = match &self {
            AuthError::Validation(details) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Invalid input", "code": code, "details": details }),
            ),
            AuthError::DuplicateEmail => (
                StatusCode::CONFLICT,
                json!({ "error": "User registration failed", "code": code, "details": self.to_string() }),
            ),
            AuthError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": "Invalid email or password", "code": code }),
            ),
            AuthError::CodeNotFound | AuthError::CodeMismatch | AuthError::CodeExpired => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Password reset failed", "code": code, "details": self.to_string() }),
            ),
            AuthError::Hashing(_)
            | AuthError::Token(_)
            | AuthError::Persistence(_)
            | AuthError::Internal(_) => {
                error!(error = %self, code, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error", "code": code }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

fn invalid(details: impl Into<String>) -> AuthError {
    AuthError::Validation(details.into())
}

fn parse<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AuthError> {
    payload.map(|Json(p)| p).map_err(|e| {
        warn!(error = %e, "malformed request body");
        invalid(e.body_text())
    })
}

fn check_email(email: &str) -> Result<(), AuthError> {
    if is_valid_email(email) {
        Ok(())
    } else {
        Err(invalid("email must be a valid email address"))
    }
}

fn check_new_password(password: &str, confirm: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(invalid("password must be at least 8 characters"));
    }
    if password != confirm {
        return Err(invalid("password and confirmation do not match"));
    }
    Ok(())
}

fn validate_register(req: &RegisterRequest) -> Result<(), AuthError> {
    let name_len = req.name.trim().chars().count();
    if !(2..=50).contains(&name_len) {
        return Err(invalid("name must be between 2 and 50 characters"));
    }
    check_email(&req.email)?;
    check_new_password(&req.password, &req.confirm_password)
}

fn validate_login(req: &LoginRequest) -> Result<(), AuthError> {
    check_email(&req.email)?;
    if req.password.is_empty() {
        return Err(invalid("password is required"));
    }
    Ok(())
}

fn validate_reset(req: &ResetPasswordRequest) -> Result<(), AuthError> {
    check_email(&req.email)?;
    if req.code.len() != RESET_CODE_LEN || !req.code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("code must be exactly 6 digits"));
    }
    check_new_password(&req.new_password, &req.confirm_password)
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>), AuthError> {
    let req = parse(payload)?;
    validate_register(&req)?;
    let resp = state.auth.register(req).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, AuthError> {
    let req = parse(payload)?;
    validate_login(&req)?;
    Ok(Json(state.auth.login(req).await?))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    payload: Result<Json<ForgotPasswordRequest>, JsonRejection>,
) -> Result<Json<ForgotPasswordResponse>, AuthError> {
    let req = parse(payload)?;
    check_email(&req.email)?;
    let code = state.auth.start_password_reset(req).await?;
    Ok(Json(ForgotPasswordResponse {
        message: FORGOT_PASSWORD_MESSAGE,
        debug_code: code.filter(|_| state.config.expose_reset_code),
    }))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, AuthError> {
    let req = parse(payload)?;
    validate_reset(&req)?;
    Ok(Json(state.auth.reset_password(req).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{app::build_app, state::AppState};
    use axum::{body::Body, http::Request};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use std::sync::atomic::Ordering;
    use tower::ServiceExt;

    async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
        post_raw(app, uri, body.to_string()).await
    }

    async fn post_raw(app: &Router, uri: &str, body: String) -> (StatusCode, Value) {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn register_body(email: &str, password: &str) -> Value {
        json!({ "name": "Ada", "email": email, "password": password, "confirm_password": password })
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("ada@x.com"));
        assert!(is_valid_email("  ada@x.com "));
        assert!(!is_valid_email("ada@x"));
        assert!(!is_valid_email("ada x@y.com"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn error_kinds_map_to_statuses() {
        let cases = [
            (AuthError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (AuthError::DuplicateEmail, StatusCode::CONFLICT),
            (AuthError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (AuthError::CodeNotFound, StatusCode::BAD_REQUEST),
            (AuthError::CodeMismatch, StatusCode::BAD_REQUEST),
            (AuthError::CodeExpired, StatusCode::BAD_REQUEST),
            (AuthError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[tokio::test]
    async fn end_to_end_account_recovery() {
        let app = build_app(AppState::fake());

        let (status, t1) = post(&app, "/api/v1/auth/register", register_body("ada@x.com", "pw123456")).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(t1["email"], "ada@x.com");
        assert_eq!(t1["name"], "Ada");

        let (status, t2) = post(
            &app,
            "/api/v1/auth/login",
            json!({ "email": "ada@x.com", "password": "pw123456" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(t2["user_id"], t1["user_id"]);
        assert_ne!(t2["token"], t1["token"]);

        let (status, forgot) = post(&app, "/api/v1/auth/forgot-password", json!({ "email": "ada@x.com" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(forgot["message"], FORGOT_PASSWORD_MESSAGE);
        let code = forgot["debug_code"].as_str().expect("debug code exposed in fake state").to_string();
        assert_eq!(code.len(), 6);

        let (status, t3) = post(
            &app,
            "/api/v1/auth/reset-password",
            json!({ "email": "ada@x.com", "code": code, "new_password": "newpw1234", "confirm_password": "newpw1234" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(t3["user_id"], t1["user_id"]);

        let (status, body) = post(
            &app,
            "/api/v1/auth/login",
            json!({ "email": "ada@x.com", "password": "pw123456" }),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "INVALID_CREDENTIALS");

        let (status, _) = post(
            &app,
            "/api/v1/auth/login",
            json!({ "email": "ada@x.com", "password": "newpw1234" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn duplicate_registration_is_conflict() {
        let app = build_app(AppState::fake());
        post(&app, "/api/v1/auth/register", register_body("ada@x.com", "pw123456")).await;
        let (status, body) = post(&app, "/api/v1/auth/register", register_body("ada@x.com", "pw123456")).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "DUPLICATE_EMAIL");
        assert_eq!(body["details"], "a user with this email already exists");
    }

    #[tokio::test]
    async fn login_failures_share_one_response() {
        let app = build_app(AppState::fake());
        post(&app, "/api/v1/auth/register", register_body("ada@x.com", "pw123456")).await;

        let wrong = post(&app, "/api/v1/auth/login", json!({ "email": "ada@x.com", "password": "wrongpass" })).await;
        let unknown = post(&app, "/api/v1/auth/login", json!({ "email": "bob@x.com", "password": "pw123456" })).await;
        assert_eq!(wrong.0, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong, unknown);
    }

    #[tokio::test]
    async fn register_validation_errors_are_bad_request() {
        let app = build_app(AppState::fake());
        let bad_bodies = [
            json!({ "name": "A", "email": "ada@x.com", "password": "pw123456", "confirm_password": "pw123456" }),
            json!({ "name": "Ada", "email": "not-an-email", "password": "pw123456", "confirm_password": "pw123456" }),
            json!({ "name": "Ada", "email": "ada@x.com", "password": "short", "confirm_password": "short" }),
            json!({ "name": "Ada", "email": "ada@x.com", "password": "pw123456", "confirm_password": "pw654321" }),
            json!({ "email": "ada@x.com" }),
        ];
        for body in bad_bodies {
            let (status, resp) = post(&app, "/api/v1/auth/register", body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(resp["code"], "VALIDATION_ERROR");
        }

        let (status, _) = post_raw(&app, "/api/v1/auth/register", "{not json".into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn forgot_password_for_unknown_email_has_no_debug_code() {
        let app = build_app(AppState::fake());
        let (status, body) = post(&app, "/api/v1/auth/forgot-password", json!({ "email": "ghost@x.com" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], FORGOT_PASSWORD_MESSAGE);
        assert!(body.get("debug_code").is_none());
    }

    #[tokio::test]
    async fn forgot_password_hides_code_unless_exposed() {
        let mut state = AppState::fake();
        let mut config = (*state.config).clone();
        config.expose_reset_code = false;
        state.config = std::sync::Arc::new(config);
        let app = build_app(state);

        post(&app, "/api/v1/auth/register", register_body("ada@x.com", "pw123456")).await;
        let (status, body) = post(&app, "/api/v1/auth/forgot-password", json!({ "email": "ada@x.com" })).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.get("debug_code").is_none());
    }

    #[tokio::test]
    async fn forgot_password_delivery_failure_is_still_ok() {
        let (state, _store, mailer) = AppState::fake_parts();
        mailer.fail.store(true, Ordering::SeqCst);
        let app = build_app(state);

        post(&app, "/api/v1/auth/register", register_body("ada@x.com", "pw123456")).await;
        let (status, body) = post(&app, "/api/v1/auth/forgot-password", json!({ "email": "ada@x.com" })).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.get("debug_code").is_none());
    }

    #[tokio::test]
    async fn forgot_password_store_failure_is_server_error() {
        let (state, store, _mailer) = AppState::fake_parts();
        store.fail_lookups.store(true, Ordering::SeqCst);
        let app = build_app(state);

        let (status, body) = post(&app, "/api/v1/auth/forgot-password", json!({ "email": "ada@x.com" })).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "INTERNAL_FAILURE");
        assert!(!body.to_string().contains("pool"));
    }

    #[tokio::test]
    async fn reset_password_reports_specific_reasons() {
        let (state, store, _mailer) = AppState::fake_parts();
        let app = build_app(state);
        post(&app, "/api/v1/auth/register", register_body("ada@x.com", "pw123456")).await;

        let reset = |code: &str| {
            json!({ "email": "ada@x.com", "code": code, "new_password": "newpw1234", "confirm_password": "newpw1234" })
        };

        let (status, body) = post(&app, "/api/v1/auth/reset-password", reset("123456")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "CODE_NOT_FOUND");

        let (_, forgot) = post(&app, "/api/v1/auth/forgot-password", json!({ "email": "ada@x.com" })).await;
        let code = forgot["debug_code"].as_str().unwrap().to_string();
        let wrong = if code == "000000" { "111111" } else { "000000" };

        let (status, body) = post(&app, "/api/v1/auth/reset-password", reset(wrong)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "CODE_MISMATCH");
        assert_eq!(body["details"], "invalid verification code");

        store.advance(time::Duration::minutes(16));
        let (status, body) = post(&app, "/api/v1/auth/reset-password", reset(code.as_str())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "CODE_EXPIRED");
    }

    #[tokio::test]
    async fn reset_password_rejects_malformed_code() {
        let app = build_app(AppState::fake());
        for code in ["12345", "1234567", "12a456"] {
            let (status, body) = post(
                &app,
                "/api/v1/auth/reset-password",
                json!({ "email": "ada@x.com", "code": code, "new_password": "newpw1234", "confirm_password": "newpw1234" }),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["code"], "VALIDATION_ERROR");
        }
    }
}
