use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::database::{schema, DatabaseManager};

#[derive(Subcommand)]
pub enum DbCommands {
    #[command(about = "Create tables and seed role names (idempotent)")]
    Init,

    #[command(about = "Check database connectivity")]
    Ping,
}

pub async fn handle(cmd: DbCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let pool = super::connect().await?;

    let result = match cmd {
        DbCommands::Init => {
            schema::bootstrap(&pool).await?;
            output_success(
                &output_format,
                "Database schema initialized",
                Some(json!({ "roles": ["super_admin", "admin", "standard_user"] })),
            )
        }
        DbCommands::Ping => {
            DatabaseManager::health_check(&pool).await?;
            output_success(&output_format, "Database reachable", None)
        }
    };

    DatabaseManager::close(pool).await;
    result
}
