use std::sync::Arc;

mod app;
mod auth;
mod config;
mod db;
mod identity;
mod mail;
mod state;
#[cfg(test)]
mod testing;

use crate::{config::AppConfig, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "gatekeeper=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = Arc::new(AppConfig::from_env()?);
    let db = db::connect(&config).await?;
    db::migrate(&db, &config).await?;

    if config.expose_reset_code {
        tracing::warn!("EXPOSE_RESET_CODE is enabled; reset codes are returned to clients");
    }

    let app_state = AppState::init(config.clone(), db)?;
    let app = app::build_app(app_state);
    app::serve(app, &config.host, config.port).await
}
