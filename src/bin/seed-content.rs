//! Populate the configured section store with the bundled defaults.
//!
//! Usage: seed-content [--force]

use anyhow::Context;
use portfolio_server::{
    config::Config,
    content::{seed_defaults, FileSectionStore, PgSectionStore, SectionStore},
    db,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let force = match std::env::args().nth(1).as_deref() {
        None => false,
        Some("--force") => true,
        Some(other) => {
            eprintln!("Unknown argument: {}", other);
            eprintln!("Usage: seed-content [--force]");
            std::process::exit(2);
        }
    };

    let config = Config::from_env().context("invalid configuration")?;

    let store = match &config.database {
        Some(db_config) => {
            let pool = db::init_pool(db_config)
                .await
                .context("failed to connect to DATABASE_URL")?;
            db::run_migrations(&pool)
                .await
                .context("failed to run database migrations")?;
            SectionStore::new(Arc::new(PgSectionStore::new(pool)))
        }
        None => SectionStore::new(Arc::new(FileSectionStore::new(config.content_file.clone()))),
    };

    let report = seed_defaults(&store, force)
        .await
        .context("seeding failed")?;

    println!(
        "Seeded {} store: {} inserted, {} updated",
        store.backend_kind(),
        report.inserted,
        report.updated
    );
    Ok(())
}
