//! Integration tests for daily partition management.
//!
//! Exercises creation-ahead, idempotence, bound-based pruning and the SQL
//! maintenance entry points against a real database.

use chrono::NaiveDate;
use ntpwatch_core::partition::day_start;
use ntpwatch_db::repositories::PartitionRepo;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

async fn partition_names(pool: &PgPool) -> Vec<String> {
    PartitionRepo::list(pool)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect()
}

async fn index_exists(pool: &PgPool, index_name: &str) -> bool {
    let (exists,): (bool,) = sqlx::query_as(
        "SELECT EXISTS (SELECT 1 FROM pg_indexes WHERE schemaname = 'metrics' AND indexname = $1)",
    )
    .bind(index_name)
    .fetch_one(pool)
    .await
    .unwrap();
    exists
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn ensure_creates_today_plus_premake(pool: PgPool) {
    let created = PartitionRepo::ensure_partitions(&pool, day(2026, 10, 18), 2)
        .await
        .unwrap();

    assert_eq!(
        created,
        vec![
            "metrics.ntp_parent_20261018",
            "metrics.ntp_parent_20261019",
            "metrics.ntp_parent_20261020",
        ]
    );

    let partitions = PartitionRepo::list(&pool).await.unwrap();
    assert_eq!(partitions[0].range_start, day_start(day(2026, 10, 18)));
    assert_eq!(partitions[0].range_end, day_start(day(2026, 10, 19)));
    assert!(index_exists(&pool, "ntp_parent_20261018_ts_idx").await);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn ensure_twice_is_idempotent(pool: PgPool) {
    PartitionRepo::ensure_partitions(&pool, day(2026, 10, 18), 3)
        .await
        .unwrap();
    let second = PartitionRepo::ensure_partitions(&pool, day(2026, 10, 18), 3)
        .await
        .unwrap();

    assert!(second.is_empty(), "second pass should create nothing");
    assert_eq!(partition_names(&pool).await.len(), 4);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_daily_partition_twice_is_a_no_op(pool: PgPool) {
    let first = PartitionRepo::create_daily_partition(&pool, day(2026, 10, 18))
        .await
        .unwrap();
    let second = PartitionRepo::create_daily_partition(&pool, day(2026, 10, 18))
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(partition_names(&pool).await, vec![first]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn ensure_skips_days_covered_under_another_name(pool: PgPool) {
    sqlx::query(
        "CREATE TABLE metrics.legacy_oct18 PARTITION OF metrics.ntp_parent \
         FOR VALUES FROM ('2026-10-18 00:00:00+00') TO ('2026-10-19 00:00:00+00')",
    )
    .execute(&pool)
    .await
    .unwrap();

    let created = PartitionRepo::ensure_partitions(&pool, day(2026, 10, 18), 1)
        .await
        .unwrap();

    assert_eq!(created, vec!["metrics.ntp_parent_20261019"]);
    assert!(index_exists(&pool, "legacy_oct18_ts_idx").await);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn sql_create_daily_partition_reuses_covering_partition(pool: PgPool) {
    sqlx::query(
        "CREATE TABLE metrics.legacy_oct18 PARTITION OF metrics.ntp_parent \
         FOR VALUES FROM ('2026-10-18 00:00:00+00') TO ('2026-10-19 00:00:00+00')",
    )
    .execute(&pool)
    .await
    .unwrap();

    let name = PartitionRepo::create_daily_partition(&pool, day(2026, 10, 18))
        .await
        .unwrap();

    assert_eq!(name, "metrics.legacy_oct18");
    assert!(index_exists(&pool, "legacy_oct18_ts_idx").await);
    assert_eq!(partition_names(&pool).await, vec!["metrics.legacy_oct18"]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn prune_keeps_partitions_reaching_the_cutoff(pool: PgPool) {
    let today = day(2026, 10, 18);
    // Cutoff for 90 days of retention is 2026-07-20 00:00 UTC.
    for d in [day(2026, 7, 18), day(2026, 7, 19), day(2026, 7, 20)] {
        PartitionRepo::create_daily_partition(&pool, d).await.unwrap();
    }
    PartitionRepo::ensure_partitions(&pool, today, 0).await.unwrap();

    let dropped = PartitionRepo::prune_partitions(&pool, today, 90)
        .await
        .unwrap();

    assert_eq!(dropped, vec!["metrics.ntp_parent_20260718"]);
    assert_eq!(
        partition_names(&pool).await,
        vec![
            "metrics.ntp_parent_20260719",
            "metrics.ntp_parent_20260720",
            "metrics.ntp_parent_20261018",
        ]
    );
    assert!(!index_exists(&pool, "ntp_parent_20260718_ts_idx").await);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn prune_reads_bounds_not_names(pool: PgPool) {
    // Name suggests a future day; bounds say 2020.
    sqlx::query(
        "CREATE TABLE metrics.ntp_parent_29991231 PARTITION OF metrics.ntp_parent \
         FOR VALUES FROM ('2020-01-01 00:00:00+00') TO ('2020-01-02 00:00:00+00')",
    )
    .execute(&pool)
    .await
    .unwrap();

    let dropped = PartitionRepo::prune_partitions(&pool, day(2026, 10, 18), 90)
        .await
        .unwrap();

    assert_eq!(dropped, vec!["metrics.ntp_parent_29991231"]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn prune_twice_is_idempotent(pool: PgPool) {
    PartitionRepo::create_daily_partition(&pool, day(2026, 1, 1))
        .await
        .unwrap();

    let first = PartitionRepo::prune_partitions(&pool, day(2026, 10, 18), 90)
        .await
        .unwrap();
    let second = PartitionRepo::prune_partitions(&pool, day(2026, 10, 18), 90)
        .await
        .unwrap();

    assert_eq!(first.len(), 1);
    assert!(second.is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn maintain_ensures_before_pruning(pool: PgPool) {
    PartitionRepo::create_daily_partition(&pool, day(2026, 1, 1))
        .await
        .unwrap();

    let report = PartitionRepo::maintain(&pool, day(2026, 10, 18), 90, 1)
        .await
        .unwrap();

    assert_eq!(report.created.len(), 2);
    assert_eq!(report.dropped, vec!["metrics.ntp_parent_20260101"]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn sql_maintain_partitions_is_idempotent(pool: PgPool) {
    let (first,): (i32,) = sqlx::query_as("SELECT metrics.maintain_partitions(90, 2)")
        .fetch_one(&pool)
        .await
        .unwrap();
    let (second,): (i32,) = sqlx::query_as("SELECT metrics.maintain_partitions(90, 2)")
        .fetch_one(&pool)
        .await
        .unwrap();

    assert_eq!(first, 0);
    assert_eq!(second, 0);
    assert_eq!(partition_names(&pool).await.len(), 3);
}
