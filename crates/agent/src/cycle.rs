//! One sampling cycle: fetch, parse, evaluate, alert, persist.
//!
//! [`Monitor`] owns the alert suppression state for its host and runs the
//! steps strictly in sequence. A cycle either inserts one complete sample or
//! nothing. Alert delivery failures are logged and never stop persistence.

use async_trait::async_trait;
use chrono::Utc;
use ntpwatch_core::alert::AlertState;
use ntpwatch_core::error::ParseError;
use ntpwatch_core::health::{evaluate, HealthThresholds, Verdict};
use ntpwatch_core::parser::parse_sample_at;
use ntpwatch_core::sample::{HealthSample, RawObservation};
use ntpwatch_core::types::Timestamp;
use ntpwatch_db::repositories::NtpSampleRepo;
use ntpwatch_db::{DbPool, StoreError};
use ntpwatch_events::{AlertDispatcher, DispatchOutcome};

use crate::gateway::{
    GatewayError, GpsSampling, RemoteExecutor, GPS_NOT_INSTALLED, SOURCES_COMMAND, TRACKING_COMMAND,
};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a cycle produced no stored sample.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("remote command failed: {0}")]
    Gateway(#[from] GatewayError),

    #[error("unusable command output: {0}")]
    Parse(#[from] ParseError),

    #[error("sample not stored: {0}")]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Sink seam
// ---------------------------------------------------------------------------

/// Destination for evaluated samples.
#[async_trait]
pub trait SampleSink: Send + Sync {
    async fn insert(&self, sample: &HealthSample) -> Result<(), StoreError>;
}

/// [`SampleSink`] writing to `metrics.ntp_parent`.
pub struct PgSampleStore {
    pool: DbPool,
}

impl PgSampleStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SampleSink for PgSampleStore {
    async fn insert(&self, sample: &HealthSample) -> Result<(), StoreError> {
        NtpSampleRepo::insert(&self.pool, sample).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

/// Alerting result of a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertOutcome {
    /// Verdict was healthy.
    NotNeeded,
    Dispatched(DispatchOutcome),
    /// Every channel failed; retried on the next unhealthy cycle.
    Failed(String),
}

/// Summary of a stored cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub sample: HealthSample,
    pub verdict: Verdict,
    pub alert: AlertOutcome,
}

/// Sampling pipeline for a single host.
pub struct Monitor<E, S> {
    executor: E,
    sink: S,
    dispatcher: AlertDispatcher,
    thresholds: HealthThresholds,
    gps: GpsSampling,
    command_timeout: std::time::Duration,
    state: AlertState,
}

impl<E, S> Monitor<E, S>
where
    E: RemoteExecutor,
    S: SampleSink,
{
    pub fn new(
        executor: E,
        sink: S,
        dispatcher: AlertDispatcher,
        thresholds: HealthThresholds,
        gps: GpsSampling,
        command_timeout: std::time::Duration,
    ) -> Self {
        Self {
            executor,
            sink,
            dispatcher,
            thresholds,
            gps,
            command_timeout,
            state: AlertState::new(),
        }
    }

    pub fn alert_state(&self) -> &AlertState {
        &self.state
    }

    /// Run one cycle. The sample is stamped once all remote commands have
    /// returned.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, CycleError> {
        let raw = self.observe().await?;
        self.finish(&raw, Utc::now()).await
    }

    /// Run one cycle, stamping the sample with `now`.
    pub async fn run_cycle_at(&mut self, now: Timestamp) -> Result<CycleReport, CycleError> {
        let raw = self.observe().await?;
        self.finish(&raw, now).await
    }

    /// Parse, evaluate, alert and persist one observation.
    async fn finish(
        &mut self,
        raw: &RawObservation,
        now: Timestamp,
    ) -> Result<CycleReport, CycleError> {
        let sample = parse_sample_at(raw, now)?;
        let verdict = evaluate(&sample, &self.thresholds);

        let alert = if verdict.is_healthy() {
            self.state.record_healthy();
            AlertOutcome::NotNeeded
        } else {
            match self
                .dispatcher
                .dispatch(&mut self.state, &verdict, &sample, now)
                .await
            {
                Ok(outcome) => AlertOutcome::Dispatched(outcome),
                Err(e) => {
                    tracing::error!(error = %e, "Alert dispatch failed");
                    AlertOutcome::Failed(e.to_string())
                }
            }
        };

        self.sink.insert(&sample).await?;

        Ok(CycleReport {
            sample,
            verdict,
            alert,
        })
    }

    /// Collect raw output for one sample. GPS problems never fail the cycle.
    async fn observe(&self) -> Result<RawObservation, CycleError> {
        let tracking = self
            .executor
            .run(TRACKING_COMMAND, self.command_timeout)
            .await?;
        let sources = self
            .executor
            .run(SOURCES_COMMAND, self.command_timeout)
            .await?;

        let Some(gps_timeout) = self.gps.local_timeout() else {
            tracing::warn!(timeout_secs = self.gps.timeout_secs, "GPS window too large; skipping GPS");
            return Ok(RawObservation {
                tracking,
                sources,
                gps: None,
            });
        };
        let gps = match self.executor.run(&self.gps.command(), gps_timeout).await {
            Ok(out) => Some(out),
            Err(GatewayError::CommandFailed { code, .. }) if code == GPS_NOT_INSTALLED => {
                tracing::warn!("gpspipe binary not found on remote");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "GPS sampling failed");
                None
            }
        };

        Ok(RawObservation {
            tracking,
            sources,
            gps,
        })
    }
}
