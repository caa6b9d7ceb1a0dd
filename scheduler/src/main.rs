// Scheduler binary entry point
//
// Reconciles stored offer schedules at startup, then keeps the offer timers
// alive until SIGINT. OfferService and AnalyticsService are library-only and
// are not served from this process.

use anyhow::{anyhow, Context, Result};
use common::bootstrap;
use common::config::Settings;
use common::telemetry;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load().context("Failed to load configuration")?;
    settings
        .validate()
        .map_err(|e| anyhow!("Invalid configuration: {}", e))?;

    telemetry::init_logging(
        &settings.observability.log_level,
        settings.observability.tracing_endpoint.as_deref(),
    )?;
    telemetry::init_metrics(settings.observability.metrics_port)?;

    info!(
        max_connections = settings.database.max_connections,
        reconcile_on_startup = settings.scheduler.reconcile_on_startup,
        "Starting offer scheduler"
    );

    let db_pool = bootstrap::init_database_pool(&settings).await?;
    let scheduler = bootstrap::init_offer_scheduler(&db_pool);

    if settings.scheduler.reconcile_on_startup {
        let summary = scheduler
            .restore_offer_schedule()
            .await
            .context("Failed to restore offer schedule")?;
        if summary.failed > 0 {
            warn!(
                failed = summary.failed,
                "Some overdue transitions failed and will be retried on next start"
            );
        }
    } else {
        warn!("Startup reconciliation disabled, stored schedules were not restored");
    }

    info!(
        scheduled_offers = scheduler.scheduled_offer_ids().len(),
        "Offer scheduler running"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    info!("Received Ctrl+C signal, initiating graceful shutdown");

    scheduler.shutdown();
    db_pool.close().await;
    telemetry::shutdown_tracer();

    info!("Offer scheduler stopped");
    Ok(())
}
