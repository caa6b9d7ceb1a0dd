// Bootstrap utilities for binary initialization

use crate::clock::{Clock, SystemClock};
use crate::config::Settings;
use crate::db::{DbPool, OfferRepository, ScheduleRepository};
use crate::scheduler::{OfferScheduler, StoreTransitions, TokioTimerService};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// Initialize database pool, applying migrations when configured
///
/// # Errors
/// Returns error if the pool cannot connect or a migration fails
#[tracing::instrument(skip(settings))]
pub async fn init_database_pool(settings: &Settings) -> Result<DbPool> {
    info!("Initializing database pool");

    let db_pool = DbPool::new(&settings.database)
        .await
        .context("Failed to initialize database pool")?;

    db_pool
        .health_check()
        .await
        .context("Database health check failed")?;

    if settings.database.run_migrations {
        db_pool
            .run_migrations()
            .await
            .context("Failed to run database migrations")?;
    }

    info!("Database pool initialized");
    Ok(db_pool)
}

/// Build the production scheduler: PostgreSQL-backed transitions, tokio
/// timers and the system clock
pub fn init_offer_scheduler(db_pool: &DbPool) -> OfferScheduler {
    let offers = Arc::new(OfferRepository::new(db_pool.clone()));
    let schedule = Arc::new(ScheduleRepository::new(db_pool.clone()));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    OfferScheduler::new(
        Arc::new(StoreTransitions::new(offers, schedule.clone())),
        schedule,
        Arc::new(TokioTimerService::new(clock.clone())),
        clock,
    )
}
