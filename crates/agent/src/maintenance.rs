//! Daily partition maintenance.
//!
//! Creates partitions ahead of time and drops those past retention on a
//! timer independent of the sampling interval. Relies on PostgreSQL's
//! transactional DDL to coexist with concurrent inserts.

use std::time::Duration;

use chrono::Utc;
use ntpwatch_db::models::partition::MaintenanceReport;
use ntpwatch_db::repositories::PartitionRepo;
use ntpwatch_db::DbPool;
use tokio_util::sync::CancellationToken;

/// Retention settings for [`run`].
#[derive(Debug, Clone, Copy)]
pub struct MaintenanceSchedule {
    pub retention_days: u32,
    pub premake_days: u32,
    pub interval: Duration,
}

/// Ensure then prune once, for today's UTC date.
pub async fn run_once(
    pool: &DbPool,
    schedule: &MaintenanceSchedule,
) -> Result<MaintenanceReport, sqlx::Error> {
    let today = Utc::now().date_naive();
    let report = PartitionRepo::maintain(
        pool,
        today,
        schedule.retention_days,
        schedule.premake_days,
    )
    .await?;

    if report.created.is_empty() && report.dropped.is_empty() {
        tracing::debug!(%today, "Partition maintenance: nothing to do");
    } else {
        tracing::info!(
            %today,
            created = report.created.len(),
            dropped = report.dropped.len(),
            "Partition maintenance complete"
        );
    }
    Ok(report)
}

/// Run the maintenance loop until `cancel` is triggered.
///
/// The first pass happens one `interval` after start; callers run
/// [`run_once`] at startup.
pub async fn run(pool: DbPool, schedule: MaintenanceSchedule, cancel: CancellationToken) {
    tracing::info!(
        retention_days = schedule.retention_days,
        premake_days = schedule.premake_days,
        interval_secs = schedule.interval.as_secs(),
        "Partition maintenance job started"
    );

    let start = tokio::time::Instant::now() + schedule.interval;
    let mut interval = tokio::time::interval_at(start, schedule.interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Partition maintenance job stopping");
                break;
            }
            _ = interval.tick() => {
                if let Err(e) = run_once(&pool, &schedule).await {
                    tracing::error!(error = %e, "Partition maintenance failed");
                }
            }
        }
    }
}
