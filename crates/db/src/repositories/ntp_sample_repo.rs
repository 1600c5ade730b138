//! Repository for `metrics.ntp_parent` (append-only, partitioned by day).

use ntpwatch_core::sample::HealthSample;
use ntpwatch_core::trend::{BucketInterval, OffsetWindow};
use ntpwatch_core::types::Timestamp;
use sqlx::PgPool;

use crate::error::StoreError;
use crate::models::ntp_sample::{LatestSample, NtpSample, OffsetBucket};

/// Column list for `ntp_parent` SELECT queries.
const COLUMNS: &str = "\
    ts, last_offset_sec, stratum, total_sources, leap_status, \
    gps_mode, selected_source, gps_summary, created_at";

/// Column list for INSERT (excludes defaulted `created_at`).
const INSERT_COLUMNS: &str = "\
    ts, last_offset_sec, stratum, total_sources, leap_status, \
    gps_mode, selected_source, gps_summary";

/// Origin for `date_bin` so bucket edges are stable across queries.
const BUCKET_ORIGIN: &str = "2000-01-01T00:00:00Z";

/// Provides query operations for health samples.
pub struct NtpSampleRepo;

impl NtpSampleRepo {
    /// Append a sample to the partition of its UTC day.
    ///
    /// A duplicate timestamp fails with [`StoreError::Constraint`]; a day
    /// without a partition fails with [`StoreError::MissingPartition`].
    pub async fn insert(pool: &PgPool, sample: &HealthSample) -> Result<NtpSample, StoreError> {
        let query = format!(
            "INSERT INTO metrics.ntp_parent ({INSERT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, NtpSample>(&query)
            .bind(sample.timestamp)
            .bind(sample.offset_seconds)
            .bind(sample.stratum)
            .bind(sample.total_sources)
            .bind(&sample.leap_status)
            .bind(sample.gps_mode.map(|m| m.as_str()))
            .bind(&sample.selected_source)
            .bind(&sample.gps_summary)
            .fetch_one(pool)
            .await?;
        Ok(row)
    }

    /// Find the sample observed at exactly `ts`.
    pub async fn find_by_ts(pool: &PgPool, ts: Timestamp) -> Result<Option<NtpSample>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM metrics.ntp_parent WHERE ts = $1");
        sqlx::query_as::<_, NtpSample>(&query)
            .bind(ts)
            .fetch_optional(pool)
            .await
    }

    /// Samples in `[from, to)`, oldest first.
    pub async fn list_range(
        pool: &PgPool,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<NtpSample>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM metrics.ntp_parent \
             WHERE ts >= $1 AND ts < $2 \
             ORDER BY ts"
        );
        sqlx::query_as::<_, NtpSample>(&query)
            .bind(from)
            .bind(to)
            .fetch_all(pool)
            .await
    }

    /// The single most recent sample.
    pub async fn latest(pool: &PgPool) -> Result<Option<LatestSample>, sqlx::Error> {
        sqlx::query_as::<_, LatestSample>(
            "SELECT ts, last_offset_sec, stratum, total_sources, leap_status, gps_mode \
             FROM metrics.ntp_parent \
             ORDER BY ts DESC \
             LIMIT 1",
        )
        .fetch_optional(pool)
        .await
    }

    /// Offset statistics over the trailing `window`, bucketed by `bucket`.
    ///
    /// Samples without an offset still count toward `samples` but not the
    /// statistics.
    pub async fn offset_aggregate(
        pool: &PgPool,
        window: OffsetWindow,
        bucket: BucketInterval,
    ) -> Result<Vec<OffsetBucket>, sqlx::Error> {
        Self::offset_aggregate_until(pool, window, bucket, chrono::Utc::now()).await
    }

    /// [`Self::offset_aggregate`] with an explicit end of window.
    pub async fn offset_aggregate_until(
        pool: &PgPool,
        window: OffsetWindow,
        bucket: BucketInterval,
        until: Timestamp,
    ) -> Result<Vec<OffsetBucket>, sqlx::Error> {
        sqlx::query_as::<_, OffsetBucket>(
            "SELECT date_bin($1::interval, ts, $3::timestamptz) AS ts, \
                    avg(last_offset_sec) AS avg, \
                    percentile_cont(0.95) WITHIN GROUP (ORDER BY abs(last_offset_sec)) AS p95, \
                    max(abs(last_offset_sec)) AS max, \
                    count(*) AS samples \
             FROM metrics.ntp_parent \
             WHERE ts >= $4 - $2::interval AND ts <= $4 \
             GROUP BY 1 \
             ORDER BY 1",
        )
        .bind(bucket.as_interval())
        .bind(window.as_interval())
        .bind(BUCKET_ORIGIN)
        .bind(until)
        .fetch_all(pool)
        .await
    }
}
