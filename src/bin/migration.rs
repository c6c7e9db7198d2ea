//! Applies the schema migrations to `DATABASE_URL`.
//!
//! Run with: cargo run --bin migration

use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let database_url = std::env::var("DATABASE_URL")
        .or_else(|_| std::env::var("APP__DATABASE_URL"))
        .unwrap_or_else(|_| "sqlite://roomservice.db?mode=rwc".to_string());

    info!("Starting database migration");
    roomservice_api::migrator::run_migration(&database_url)
        .await
        .map_err(|e| {
            error!("Migration failed: {}", e);
            e
        })?;

    info!("Migration completed successfully");
    Ok(())
}
