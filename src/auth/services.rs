use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        code::{generate_numeric_code, RESET_CODE_LEN},
        dto::{AuthResponse, ForgotPasswordRequest, LoginRequest, RegisterRequest, ResetPasswordRequest},
        error::AuthError,
        jwt::JwtKeys,
        password::{hash_password, verify_against_dummy, verify_password},
        repo::CredentialStore,
        repo_types::{CodeCheck, User},
    },
    mail::ResetCodeSender,
};

/// Emails are matched and stored trimmed and lower-cased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Registration, login and the two-phase password reset.
///
/// Store writes are not wrapped in a transaction. The only partial state a
/// failure can leave behind is a reset code that outlives a completed reset
/// when its cleanup fails; it is superseded by the next reset request.
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    keys: JwtKeys,
    mailer: Arc<dyn ResetCodeSender>,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        keys: JwtKeys,
        mailer: Arc<dyn ResetCodeSender>,
    ) -> Self {
        Self { store, keys, mailer }
    }

    fn respond(&self, user: &User) -> Result<AuthResponse, AuthError> {
        let token = self.keys.generate_token(user.id, &user.email).map_err(|e| {
            error!(error = %e, user_id = %user.id, "jwt sign failed");
            AuthError::Token(e)
        })?;
        Ok(AuthResponse {
            user_id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            token,
        })
    }

    #[instrument(skip(self, req))]
    pub async fn register(&self, req: RegisterRequest) -> Result<AuthResponse, AuthError> {
        if req.password != req.confirm_password {
            return Err(AuthError::Validation(
                "password and confirmation do not match".into(),
            ));
        }
        let email = normalize_email(&req.email);

        match self.store.get_user_by_email(&email).await {
            Ok(Some(_)) => {
                warn!(email = %email, "email already registered");
                return Err(AuthError::DuplicateEmail);
            }
            Ok(None) => {}
            Err(e) => {
                error!(error = %e, "user lookup failed during registration");
                return Err(AuthError::Persistence(e));
            }
        }

        let hashed = hash_password(&req.password).map_err(AuthError::Hashing)?;
        let user = User::new(req.name.trim().to_string(), email, hashed);

        if let Err(e) = self.store.create_user(&user).await {
            let err = AuthError::from(e);
            match &err {
                AuthError::DuplicateEmail => warn!(email = %user.email, "duplicate email on insert"),
                _ => error!(error = %err, "create user failed"),
            }
            return Err(err);
        }

        let resp = self.respond(&user)?;
        info!(user_id = %user.id, email = %user.email, "user registered");
        Ok(resp)
    }

    /// Unknown email, lookup failure and wrong password all yield
    /// `InvalidCredentials` after the same amount of hashing work.
    #[instrument(skip(self, req))]
    pub async fn login(&self, req: LoginRequest) -> Result<AuthResponse, AuthError> {
        let email = normalize_email(&req.email);

        let user = match self.store.get_user_by_email(&email).await {
            Ok(Some(u)) => u,
            Ok(None) => {
                verify_against_dummy(&req.password);
                warn!(email = %email, "login unknown email");
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => {
                verify_against_dummy(&req.password);
                error!(error = %e, "user lookup failed during login");
                return Err(AuthError::InvalidCredentials);
            }
        };

        if !verify_password(&req.password, &user.hashed_password) {
            warn!(email = %email, user_id = %user.id, "login invalid password");
            return Err(AuthError::InvalidCredentials);
        }

        let resp = self.respond(&user)?;
        info!(user_id = %user.id, "user logged in");
        Ok(resp)
    }

    /// Returns the delivered code, or `None` when the email is unknown or
    /// delivery failed. The two `None` cases are indistinguishable.
    #[instrument(skip(self, req))]
    pub async fn start_password_reset(
        &self,
        req: ForgotPasswordRequest,
    ) -> Result<Option<String>, AuthError> {
        let email = normalize_email(&req.email);

        let user = self.store.get_user_by_email(&email).await.map_err(|e| {
            error!(error = %e, "user lookup failed during reset request");
            AuthError::Internal("user lookup failed".into())
        })?;
        if user.is_none() {
            info!(email = %email, "password reset requested for unknown email");
            return Ok(None);
        }

        let code = generate_numeric_code(RESET_CODE_LEN).map_err(|e| {
            error!(error = %e, "reset code generation failed");
            AuthError::Internal("reset code generation failed".into())
        })?;

        self.store
            .create_password_reset_code(&email, &code)
            .await
            .map_err(|e| {
                error!(error = %e, "saving reset code failed");
                AuthError::Persistence(e)
            })?;

        if let Err(e) = self.mailer.send_password_reset_code(&email, &code).await {
            error!(error = %e, email = %email, "failed to send reset code email");
            return Ok(None);
        }

        info!(email = %email, "password reset code issued");
        Ok(Some(code))
    }

    #[instrument(skip(self, req))]
    pub async fn reset_password(
        &self,
        req: ResetPasswordRequest,
    ) -> Result<AuthResponse, AuthError> {
        if req.new_password != req.confirm_password {
            return Err(AuthError::Validation(
                "password and confirmation do not match".into(),
            ));
        }
        let email = normalize_email(&req.email);

        let check = self
            .store
            .verify_password_reset_code(&email, &req.code)
            .await
            .map_err(|e| {
                error!(error = %e, "reset code lookup failed");
                AuthError::Persistence(e)
            })?;
        match check {
            CodeCheck::Valid => {}
            CodeCheck::NotFound => return Err(AuthError::CodeNotFound),
            CodeCheck::Mismatch => return Err(AuthError::CodeMismatch),
            CodeCheck::Expired => return Err(AuthError::CodeExpired),
        }

        let user = match self.store.get_user_by_email(&email).await {
            Ok(Some(u)) => u,
            Ok(None) => {
                error!(email = %email, "reset code exists but user is gone");
                return Err(AuthError::Internal(
                    "user not found after code verification".into(),
                ));
            }
            Err(e) => {
                error!(error = %e, "user lookup failed during reset");
                return Err(AuthError::Internal("user lookup failed".into()));
            }
        };

        let hashed = hash_password(&req.new_password).map_err(AuthError::Hashing)?;
        self.store
            .update_user_password(user.id, &hashed)
            .await
            .map_err(|e| {
                error!(error = %e, user_id = %user.id, "password update failed");
                AuthError::Persistence(e)
            })?;

        if let Err(e) = self.store.delete_password_reset_code(&email).await {
            warn!(error = %e, email = %email, "failed to delete reset code");
        }

        let resp = self.respond(&user)?;
        info!(user_id = %user.id, "password reset completed");
        Ok(resp)
    }
}
