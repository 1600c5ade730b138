//! Partition lifecycle for `metrics.ntp_parent`.
//!
//! Creation goes through the `metrics.create_daily_partition` SQL function
//! so the agent and external schedulers share the same DDL. Pruning reads
//! partition bounds from the `metrics.ntp_partitions` catalog view and
//! relies on PostgreSQL's transactional DDL for isolation from concurrent
//! inserts; no application-level locks are taken.

use ntpwatch_core::partition::{days_to_ensure, day_start, partitions_to_prune, PartitionBounds};
use ntpwatch_core::types::Day;
use sqlx::PgPool;

use crate::models::partition::{MaintenanceReport, PartitionRow};

/// Provides partition management operations.
pub struct PartitionRepo;

impl PartitionRepo {
    /// Create the partition for `day` (and its `ts` index) if absent.
    ///
    /// Returns the qualified partition name.
    pub async fn create_daily_partition(pool: &PgPool, day: Day) -> Result<String, sqlx::Error> {
        let (name,): (String,) = sqlx::query_as("SELECT metrics.create_daily_partition($1)")
            .bind(day)
            .fetch_one(pool)
            .await?;
        Ok(name)
    }

    /// Bounded partitions currently attached to the parent, oldest first.
    pub async fn list(pool: &PgPool) -> Result<Vec<PartitionBounds>, sqlx::Error> {
        let rows = sqlx::query_as::<_, PartitionRow>(
            "SELECT name, range_start, range_end \
             FROM metrics.ntp_partitions \
             ORDER BY range_start NULLS FIRST",
        )
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().filter_map(PartitionRow::into_bounds).collect())
    }

    /// Create the `ts` index on an attached partition if absent.
    pub async fn ensure_index(pool: &PgPool, name: &str) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT metrics.ensure_partition_index($1::regclass)")
            .bind(name)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Drop one partition by its catalog (already quoted) name.
    pub async fn drop_partition(pool: &PgPool, name: &str) -> Result<(), sqlx::Error> {
        sqlx::query(&format!("DROP TABLE IF EXISTS {name}"))
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Ensure partitions for `today` and the next `premake_days` days exist.
    ///
    /// Days already covered by an existing partition -- whatever its name --
    /// only get that partition's index ensured. Returns the names of
    /// partitions created by this call.
    pub async fn ensure_partitions(
        pool: &PgPool,
        today: Day,
        premake_days: u32,
    ) -> Result<Vec<String>, sqlx::Error> {
        let existing = Self::list(pool).await?;
        let mut created = Vec::new();

        for day in days_to_ensure(today, premake_days) {
            let start = day_start(day);
            let covering = existing
                .iter()
                .find(|p| p.range_start <= start && start < p.range_end);
            if let Some(partition) = covering {
                Self::ensure_index(pool, &partition.name).await?;
                continue;
            }
            let name = Self::create_daily_partition(pool, day).await?;
            tracing::info!(partition = %name, %day, "Created daily partition");
            created.push(name);
        }

        Ok(created)
    }

    /// Drop every partition whose range ends before `today - retention_days`.
    ///
    /// Returns the names of dropped partitions.
    pub async fn prune_partitions(
        pool: &PgPool,
        today: Day,
        retention_days: u32,
    ) -> Result<Vec<String>, sqlx::Error> {
        let existing = Self::list(pool).await?;
        let mut dropped = Vec::new();

        for partition in partitions_to_prune(&existing, today, retention_days) {
            Self::drop_partition(pool, &partition.name).await?;
            tracing::info!(
                partition = %partition.name,
                range_end = %partition.range_end,
                "Dropped expired partition"
            );
            dropped.push(partition.name.clone());
        }

        Ok(dropped)
    }

    /// Daily maintenance: ensure ahead, then prune.
    ///
    /// Ensuring first guarantees `today` always has a writable partition.
    pub async fn maintain(
        pool: &PgPool,
        today: Day,
        retention_days: u32,
        premake_days: u32,
    ) -> Result<MaintenanceReport, sqlx::Error> {
        let created = Self::ensure_partitions(pool, today, premake_days).await?;
        let dropped = Self::prune_partitions(pool, today, retention_days).await?;
        Ok(MaintenanceReport { created, dropped })
    }
}
