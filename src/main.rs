use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rolegate::database::{
    schema, DatabaseManager, InMemoryUserRepository, PgUserRepository, UserRepository,
};
use rolegate::AppState;

#[derive(Parser)]
#[command(name = "rolegate")]
#[command(about = "User accounts with role-based access control")]
#[command(version)]
struct Args {
    #[arg(long, help = "Keep users in memory instead of Postgres (development only)")]
    in_memory: bool,

    #[arg(long, help = "Listen port (overrides API_PORT / PORT)")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, SECURITY_JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let config = rolegate::config::config();
    config.validate().context("invalid configuration")?;
    info!("Starting rolegate in {:?} mode", config.environment);

    let repo: Arc<dyn UserRepository> = if args.in_memory {
        if rolegate::is_production!() {
            anyhow::bail!("--in-memory cannot be used in production");
        }
        warn!("Using in-memory user storage; all data is lost on exit");
        Arc::new(InMemoryUserRepository::new())
    } else {
        let pool = DatabaseManager::connect(&config.database)
            .await
            .context("failed to connect to database")?;
        schema::bootstrap(&pool)
            .await
            .context("failed to bootstrap schema")?;
        Arc::new(PgUserRepository::new(pool))
    };

    let app = rolegate::app(AppState::from_repository(repo, config));

    let port = args.port.unwrap_or(config.api.port);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    info!("rolegate listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("rolegate stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
