//! `ntpwatch-agent` -- NTP/GPS health monitor.
//!
//! Polls `chronyc` and `gpspipe` on a remote time server over SSH, validates
//! the result against configured thresholds, alerts on unhealthy transitions
//! and stores every sample in a daily-partitioned PostgreSQL table. See
//! [`ntpwatch_agent::config::AgentConfig::from_env`] for the environment.

use std::time::Duration;

use ntpwatch_agent::config::AgentConfig;
use ntpwatch_agent::cycle::{Monitor, PgSampleStore};
use ntpwatch_agent::gateway::SshGateway;
use ntpwatch_agent::maintenance::{self, MaintenanceSchedule};
use ntpwatch_agent::poller;
use ntpwatch_events::{AlertDispatcher, EmailConfig, EmailDelivery, WebhookDelivery};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "ntpwatch_agent=info,ntpwatch_db=info,ntpwatch_events=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AgentConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    });

    // --- Database ---
    let pool = ntpwatch_db::create_pool(&config.database_url, config.db_max_connections)
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to connect to database");
            std::process::exit(1);
        });
    if let Err(e) = ntpwatch_db::health_check(&pool).await {
        tracing::error!(error = %e, "Database health check failed");
        std::process::exit(1);
    }
    if let Err(e) = ntpwatch_db::run_migrations(&pool).await {
        tracing::error!(error = %e, "Failed to run migrations");
        std::process::exit(1);
    }
    tracing::info!("Database ready");

    let schedule = MaintenanceSchedule {
        retention_days: config.retention_days,
        premake_days: config.premake_days,
        interval: config.maintenance_interval,
    };
    if let Err(e) = maintenance::run_once(&pool, &schedule).await {
        tracing::error!(error = %e, "Initial partition maintenance failed");
    }

    // --- Alert channels ---
    let mut dispatcher = AlertDispatcher::new(config.host.clone(), config.renotify_interval)
        .with_send_timeout(config.alert_timeout);
    if let Some(email) = EmailConfig::from_env() {
        tracing::info!(smtp_host = %email.smtp_host, recipients = email.recipients.len(), "Email alerts enabled");
        dispatcher = dispatcher.with_transport(Box::new(EmailDelivery::new(email)));
    }
    match WebhookDelivery::from_env() {
        Ok(Some(webhook)) => {
            tracing::info!(url = webhook.url(), "Webhook alerts enabled");
            dispatcher = dispatcher.with_transport(Box::new(webhook));
        }
        Ok(None) => {}
        Err(e) => {
            tracing::error!(error = %e, "Failed to build webhook client");
            std::process::exit(1);
        }
    }
    if dispatcher.channel_count() == 0 {
        tracing::warn!("No alert channel configured; alerts will only be logged");
    }

    tracing::info!(
        host = %config.host,
        ssh_user = %config.ssh.user,
        ssh_port = config.ssh.port,
        multiplexed = config.ssh.control_path.is_some(),
        interval_secs = config.check_interval.as_secs(),
        gps_required = config.thresholds.gps_required,
        gps_timeout_secs = config.gps.timeout_secs,
        retention_days = config.retention_days,
        premake_days = config.premake_days,
        alert_timeout_secs = config.alert_timeout.as_secs(),
        "Starting ntpwatch-agent"
    );

    let monitor = Monitor::new(
        SshGateway::new(config.ssh.clone()),
        PgSampleStore::new(pool.clone()),
        dispatcher,
        config.thresholds.clone(),
        config.gps,
        config.ssh.command_timeout,
    );

    let cancel = CancellationToken::new();
    let poll_handle = tokio::spawn(poller::run(monitor, config.check_interval, cancel.clone()));
    let maintenance_handle = tokio::spawn(maintenance::run(pool.clone(), schedule, cancel.clone()));

    shutdown_signal().await;

    cancel.cancel();
    stop_within("Polling loop", poll_handle, config.shutdown_grace).await;
    stop_within("Partition maintenance", maintenance_handle, config.shutdown_grace).await;

    pool.close().await;
    tracing::info!("Graceful shutdown complete");
}

/// Wait for a task to finish, aborting it once `grace` expires.
async fn stop_within(name: &str, handle: JoinHandle<()>, grace: Duration) {
    let abort = handle.abort_handle();
    match tokio::time::timeout(grace, handle).await {
        Ok(_) => tracing::info!(task = name, "Task stopped"),
        Err(_) => {
            tracing::warn!(task = name, grace_secs = grace.as_secs(), "Task did not stop in time, aborting");
            abort.abort();
        }
    }
}

/// Wait for SIGINT (Ctrl-C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
