pub mod db;
pub mod token;
pub mod user;

use anyhow::Context;
use sqlx::PgPool;

use crate::config;
use crate::database::DatabaseManager;

/// Connect with the process configuration (`DATABASE_URL` etc.).
pub(crate) async fn connect() -> anyhow::Result<PgPool> {
    DatabaseManager::connect(&config::config().database)
        .await
        .context("failed to connect to database")
}
