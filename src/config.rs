use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub ttl_minutes: i64,
}

/// Outbound mail relay used for password reset codes.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FirebaseConfig {
    pub project_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub should_migrate: bool,
    pub host: String,
    pub port: u16,
    pub request_timeout: Duration,
    /// Echo delivered reset codes back in the forgot-password response.
    /// Only meant for local development.
    pub expose_reset_code: bool,
    pub jwt: JwtConfig,
    pub smtp: SmtpConfig,
    pub firebase: FirebaseConfig,
}

#[derive(Deserialize)]
struct ServiceAccountKey {
    project_id: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so it can be exercised
    /// without touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> anyhow::Result<String> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow!("required environment variable {key} is not set"))
        };
        let or_default = |key: &str, default: &str| -> String {
            lookup(key).unwrap_or_else(|| default.to_string())
        };

        let database_url = required("DATABASE_URL")?;
        let should_migrate = parse_bool("SHOULD_MIGRATE", lookup("SHOULD_MIGRATE"))?;
        let expose_reset_code = parse_bool("EXPOSE_RESET_CODE", lookup("EXPOSE_RESET_CODE"))?;
        let host = or_default("APP_HOST", "0.0.0.0");
        let port = or_default("PORT", "8080")
            .parse::<u16>()
            .context("PORT must be a valid port number")?;
        let request_timeout = or_default("REQUEST_TIMEOUT_SECS", "30")
            .parse::<u64>()
            .map(Duration::from_secs)
            .context("REQUEST_TIMEOUT_SECS must be a number of seconds")?;

        let jwt = JwtConfig {
            secret: required("JWT_SECRET")?,
            issuer: or_default("JWT_ISSUER", "gatekeeper"),
            ttl_minutes: or_default("JWT_TTL_MINUTES", "1440")
                .parse::<i64>()
                .context("JWT_TTL_MINUTES must be an integer")?,
        };

        let smtp = SmtpConfig {
            host: required("SMTP_HOST")?,
            port: or_default("SMTP_PORT", "587")
                .parse::<u16>()
                .context("SMTP_PORT must be a valid port number")?,
            username: required("SMTP_USER")?,
            password: required("SMTP_PASS")?,
            from: required("FROM_EMAIL")?,
        };

        let project_id = match lookup("FIREBASE_PROJECT_ID").filter(|v| !v.trim().is_empty()) {
            Some(id) => id,
            None => {
                let path = lookup("FIREBASE_SERVICE_KEY_PATH").ok_or_else(|| {
                    anyhow!("either FIREBASE_PROJECT_ID or FIREBASE_SERVICE_KEY_PATH must be set")
                })?;
                project_id_from_key_file(Path::new(&path))?
            }
        };

        Ok(Self {
            database_url,
            should_migrate,
            host,
            port,
            request_timeout,
            expose_reset_code,
            jwt,
            smtp,
            firebase: FirebaseConfig { project_id },
        })
    }
}

fn parse_bool(key: &str, value: Option<String>) -> anyhow::Result<bool> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(false),
        Some(v) if v.eq_ignore_ascii_case("true") || v == "1" => Ok(true),
        Some(v) if v.eq_ignore_ascii_case("false") || v == "0" => Ok(false),
        Some(v) => Err(anyhow!("{key} must be true or false, got {v:?}")),
    }
}

fn project_id_from_key_file(path: &Path) -> anyhow::Result<String> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read firebase service key {}", path.display()))?;
    let key: ServiceAccountKey =
        serde_json::from_str(&raw).context("parse firebase service key json")?;
    Ok(key.project_id)
}
