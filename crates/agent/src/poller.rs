//! Fixed-interval polling loop.
//!
//! Runs [`Monitor::run_cycle`] on every tick until `cancel` fires. Cycles
//! never overlap, and a failed cycle is logged and followed by the next one
//! on schedule.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::cycle::{AlertOutcome, CycleError, CycleReport, Monitor, SampleSink};
use crate::gateway::RemoteExecutor;

/// Run the polling loop until `cancel` is triggered.
///
/// Cancellation is observed between cycles; an in-flight cycle is left to
/// the caller's grace period.
pub async fn run<E, S>(mut monitor: Monitor<E, S>, interval: Duration, cancel: CancellationToken)
where
    E: RemoteExecutor,
    S: SampleSink,
{
    tracing::info!(interval_secs = interval.as_secs(), "Polling loop started");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Polling loop stopping");
                break;
            }
            _ = ticker.tick() => {
                log_cycle(monitor.run_cycle().await);
            }
        }
    }
}

/// Log a cycle's outcome at a level matching its severity.
pub fn log_cycle(result: Result<CycleReport, CycleError>) {
    match result {
        Ok(report) if report.verdict.is_healthy() => {
            tracing::info!(
                ts = %report.sample.timestamp,
                offset = ?report.sample.offset_seconds,
                stratum = ?report.sample.stratum,
                sources = report.sample.total_sources,
                "NTP healthy"
            );
        }
        Ok(report) => {
            tracing::error!(
                ts = %report.sample.timestamp,
                reasons = %report.verdict.failed_reasons().join(" | "),
                alert = ?report.alert,
                "NTP unhealthy"
            );
            if let AlertOutcome::Failed(e) = &report.alert {
                tracing::warn!(error = %e, "Alert will be retried next cycle");
            }
        }
        Err(CycleError::Gateway(e)) => {
            tracing::warn!(error = %e, "Cycle skipped: remote host unavailable");
        }
        Err(CycleError::Parse(e)) => {
            tracing::error!(error = %e, "Cycle skipped: could not parse command output");
        }
        Err(CycleError::Store(e)) => {
            tracing::error!(error = %e, "Sample dropped: store rejected insert");
        }
    }
}
