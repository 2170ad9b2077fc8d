use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

use crate::config::AppConfig;

pub async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    let db = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("connect to database")?;
    info!("connected to database");
    Ok(db)
}

/// Applies embedded migrations when `SHOULD_MIGRATE` is set.
pub async fn migrate(db: &PgPool, config: &AppConfig) -> anyhow::Result<()> {
    if !config.should_migrate {
        info!("skipping automatic database migration (SHOULD_MIGRATE=false)");
        return Ok(());
    }
    sqlx::migrate!("./migrations")
        .run(db)
        .await
        .context("run database migrations")?;
    info!("database migration completed");
    Ok(())
}
