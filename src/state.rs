//! Process-scoped application state.

use anyhow::Context;
use axum::extract::FromRef;
use sqlx::PgPool;
use std::{sync::Arc, time::Duration, time::Instant};

use crate::{
    auth::{
        AdminDirectory, AuthGate, MemorySessionStore, PgSessionStore, RateLimiter, SessionStore,
    },
    config::Config,
    content::{seed_defaults, FileSectionStore, PgSectionStore, SectionStore},
    db,
    uploads::AssetStore,
};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Per-client throttle on the contact form, kept apart from the login limiter.
#[derive(Clone)]
pub struct ContactLimiter(pub RateLimiter);

#[derive(Clone, FromRef)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sections: SectionStore,
    pub auth: Arc<AuthGate>,
    pub assets: AssetStore,
    pub contact_limiter: ContactLimiter,
    pub db: Option<PgPool>,
    pub started_at: Instant,
}

impl AppState {
    /// Connect to the configured backends and run startup seeding.
    pub async fn bootstrap(config: Config) -> anyhow::Result<Self> {
        let pool = match &config.database {
            Some(db_config) => {
                let pool = db::init_pool(db_config)
                    .await
                    .context("failed to connect to DATABASE_URL")?;
                db::run_migrations(&pool)
                    .await
                    .context("failed to run database migrations")?;
                Some(pool)
            }
            None => {
                tracing::info!("DATABASE_URL not set, running without a database");
                None
            }
        };

        let assets = AssetStore::connect(&config.uploads, pool.clone())
            .await
            .context("failed to initialise upload storage")?;

        let state = Self::assemble(config, pool, assets);

        if state.config.seed_on_startup {
            if let Err(e) = seed_defaults(&state.sections, false).await {
                tracing::error!(error = %e, "content seeding failed, continuing without it");
            }
        }

        Ok(state)
    }

    /// Wire state together from already-connected parts.
    pub fn assemble(config: Config, pool: Option<PgPool>, assets: AssetStore) -> Self {
        let sections = match &pool {
            Some(pool) => SectionStore::new(Arc::new(PgSectionStore::new(pool.clone()))),
            None => SectionStore::new(Arc::new(FileSectionStore::new(config.content_file.clone()))),
        };

        let sessions: Arc<dyn SessionStore> = match &pool {
            Some(pool) => Arc::new(PgSessionStore::new(pool.clone())),
            None => Arc::new(MemorySessionStore::new()),
        };

        let auth = AuthGate::new(
            AdminDirectory::from_config(&config.admin, pool.clone()),
            sessions,
            RateLimiter::new(config.login_limit),
            config.session.clone(),
        );

        tracing::info!(
            sections = sections.backend_kind(),
            sessions = auth.session_store_kind(),
            uploads = %assets.strategy(),
            "application state ready"
        );

        Self {
            contact_limiter: ContactLimiter(RateLimiter::new(config.contact_limit)),
            config: Arc::new(config),
            sections,
            auth: Arc::new(auth),
            assets,
            db: pool,
            started_at: Instant::now(),
        }
    }

    /// Periodic cleanup of expired sessions and rate-limit windows.
    pub fn spawn_maintenance(&self) -> tokio::task::JoinHandle<()> {
        let auth = self.auth.clone();
        let contact = self.contact_limiter.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                auth.sweep().await;
                contact.0.purge_expired().await;
            }
        })
    }
}
