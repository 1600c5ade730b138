//! Remote command gateway.
//!
//! Runs commands on the monitored host through the system `ssh` client in
//! batch mode and returns captured stdout. When `SSH_CONTROL_PATH` is set the
//! master connection is kept open between calls and reused.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;

/// `chrony` tracking report.
pub const TRACKING_COMMAND: &str = "chronyc tracking";

/// `chrony` source table with numeric addresses.
pub const SOURCES_COMMAND: &str = "chronyc sources -n";

/// Exit status used by the GPS sampling command when `gpspipe` is not installed.
pub const GPS_NOT_INSTALLED: i32 = 127;

/// Exit status `ssh` reserves for its own failures.
const SSH_FAILURE_EXIT: i32 = 255;

/// Extra local slack on top of the remote GPS sampling window.
const GPS_LOCAL_SLACK: Duration = Duration::from_secs(3);

/// How long an idle multiplexed master connection stays open.
const CONTROL_PERSIST: &str = "60s";

/// Lines of stdout/stderr echoed into debug logs.
const LOG_HEAD_LINES: usize = 3;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Host unreachable or authentication refused.
    #[error("cannot reach {host}: {detail}")]
    Connection { host: String, detail: String },

    #[error("remote command timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("remote command exited with {code}: {stderr}")]
    CommandFailed { code: i32, stderr: String },

    #[error("failed to spawn ssh: {0}")]
    Spawn(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Executor seam
// ---------------------------------------------------------------------------

/// Runs one command on the monitored host and returns its stdout.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn run(&self, command: &str, timeout: Duration) -> Result<String, GatewayError>;
}

/// Bounded GPS sampling with `gpspipe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpsSampling {
    /// Remote sampling window (`timeout N gpspipe`).
    pub timeout_secs: u64,
    /// Maximum lines read (`gpspipe -n`).
    pub samples: u32,
}

impl GpsSampling {
    /// Shell snippet run remotely.
    ///
    /// Exits 127 when `gpspipe` is missing. A `timeout` expiry (124) still
    /// yields whatever lines were read, so it is mapped to success.
    pub fn command(&self) -> String {
        format!(
            "command -v gpspipe >/dev/null 2>&1 || {{ echo gpspipe-not-found >&2; exit {GPS_NOT_INSTALLED}; }}; \
             if command -v timeout >/dev/null 2>&1; then \
             timeout {secs} gpspipe -w -n {samples}; rc=$?; [ $rc -eq 124 ] && exit 0; exit $rc; \
             else gpspipe -w -n {samples}; fi",
            secs = self.timeout_secs,
            samples = self.samples,
        )
    }

    /// Local bound on the whole ssh invocation; `None` if unrepresentable.
    pub fn local_timeout(&self) -> Option<Duration> {
        Duration::from_secs(self.timeout_secs).checked_add(GPS_LOCAL_SLACK)
    }
}

// ---------------------------------------------------------------------------
// SSH
// ---------------------------------------------------------------------------

/// Connection settings for [`SshGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshConfig {
    pub host: String,
    pub user: String,
    pub port: u16,
    pub connect_timeout: Duration,
    /// Bound for ordinary commands.
    pub command_timeout: Duration,
    /// Enables connection multiplexing when set.
    pub control_path: Option<PathBuf>,
}

/// [`RemoteExecutor`] backed by the OpenSSH client.
pub struct SshGateway {
    config: SshConfig,
}

impl SshGateway {
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }

    /// Full argument vector passed to `ssh`.
    pub fn ssh_args(&self, command: &str) -> Vec<String> {
        let mut args = vec![
            "-p".to_string(),
            self.config.port.to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.config.connect_timeout.as_secs().max(1)),
        ];
        if let Some(path) = &self.config.control_path {
            args.extend([
                "-o".to_string(),
                "ControlMaster=auto".to_string(),
                "-o".to_string(),
                format!("ControlPath={}", path.display()),
                "-o".to_string(),
                format!("ControlPersist={CONTROL_PERSIST}"),
            ]);
        }
        args.push(format!("{}@{}", self.config.user, self.config.host));
        args.push(command.to_string());
        args
    }
}

fn head(text: &str) -> String {
    text.lines()
        .take(LOG_HEAD_LINES)
        .collect::<Vec<_>>()
        .join(" | ")
}

#[async_trait]
impl RemoteExecutor for SshGateway {
    async fn run(&self, command: &str, timeout: Duration) -> Result<String, GatewayError> {
        let start = Instant::now();
        tracing::debug!(
            host = %self.config.host,
            command,
            timeout_secs = timeout.as_secs(),
            "Running remote command"
        );

        let child = Command::new("ssh")
            .args(self.ssh_args(command))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(timeout, child).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::error!(host = %self.config.host, command, timeout_secs = timeout.as_secs(), "Remote command timed out");
                return Err(GatewayError::Timeout(timeout));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let code = output.status.code().unwrap_or(-1);

        tracing::debug!(
            command,
            elapsed_ms = start.elapsed().as_millis() as u64,
            code,
            stdout = %head(&stdout),
            stderr = %head(&stderr),
            "Remote command finished"
        );

        match code {
            0 => Ok(stdout),
            SSH_FAILURE_EXIT => Err(GatewayError::Connection {
                host: self.config.host.clone(),
                detail: head(&stderr),
            }),
            _ => Err(GatewayError::CommandFailed {
                code,
                stderr: head(&stderr),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
