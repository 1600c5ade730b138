//! Agent configuration loaded from environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use ntpwatch_core::alert::{HostLabel, DEFAULT_RENOTIFY_INTERVAL_SECS};
use ntpwatch_core::error::CoreError;
use ntpwatch_core::health::{
    HealthThresholds, DEFAULT_LEAP_STATUS, DEFAULT_MAX_ABS_OFFSET_SEC, DEFAULT_MAX_STRATUM,
    DEFAULT_MIN_SOURCES,
};
use ntpwatch_core::partition::{DEFAULT_PREMAKE_DAYS, DEFAULT_RETENTION_DAYS};
use ntpwatch_events::dispatcher::DEFAULT_SEND_TIMEOUT;

use crate::gateway::{GpsSampling, SshConfig};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{var} has invalid value {value:?}")]
    Invalid { var: &'static str, value: String },

    #[error(transparent)]
    Thresholds(#[from] CoreError),
}

/// Full agent configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub host: HostLabel,
    pub ssh: SshConfig,
    pub gps: GpsSampling,
    pub thresholds: HealthThresholds,
    pub check_interval: Duration,
    pub renotify_interval: chrono::Duration,
    /// Bound on one whole alert fan-out.
    pub alert_timeout: Duration,
    pub retention_days: u32,
    pub premake_days: u32,
    pub maintenance_interval: Duration,
    pub shutdown_grace: Duration,
    pub database_url: String,
    pub db_max_connections: u32,
}

impl AgentConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default   |
    /// |-----------------------------|-----------|
    /// | `NTP_HOST`                  | `myntp`   |
    /// | `NTP_IP`                    | `0.0.0.0` |
    /// | `SSH_USER`                  | `ubuntu`  |
    /// | `SSH_PORT`                  | `22`      |
    /// | `SSH_CONNECT_TIMEOUT_SECS`  | `5`       |
    /// | `SSH_CONTROL_PATH`          | unset     |
    /// | `COMMAND_TIMEOUT_SECS`      | `10`      |
    /// | `CGPS_TIMEOUT_SEC`          | `8`       |
    /// | `GPSPIPE_SAMPLES`           | `5`       |
    /// | `GPS_REQUIRED`              | `false`   |
    /// | `CHECK_INTERVAL_SEC`        | `30`      |
    /// | `MAX_STRATUM`               | `10`      |
    /// | `MAX_ABS_OFFSET_SEC`        | `0.050`   |
    /// | `MIN_SOURCES`               | `1`       |
    /// | `ACCEPTABLE_LEAP_STATUSES`  | `Normal`  |
    /// | `REQUIRE_SELECTED_SOURCE`   | `true`    |
    /// | `RENOTIFY_INTERVAL_SEC`     | `3600`    |
    /// | `ALERT_TIMEOUT_SECS`        | `10`      |
    /// | `RETENTION_DAYS`            | `90`      |
    /// | `PREMAKE_DAYS`              | `7`       |
    /// | `MAINTENANCE_INTERVAL_SECS` | `86400`   |
    /// | `SHUTDOWN_GRACE_SECS`       | `15`      |
    /// | `DATABASE_URL`              | required  |
    /// | `DB_MAX_CONNECTIONS`        | `5`       |
    ///
    /// Alert channel variables are read by the channels themselves.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);

        let host = vars.string("NTP_HOST", "myntp");
        let ssh = SshConfig {
            host: host.clone(),
            user: vars.string("SSH_USER", "ubuntu"),
            port: vars.parse("SSH_PORT", 22u16)?,
            connect_timeout: Duration::from_secs(vars.parse("SSH_CONNECT_TIMEOUT_SECS", 5u64)?),
            command_timeout: Duration::from_secs(vars.parse("COMMAND_TIMEOUT_SECS", 10u64)?),
            control_path: vars.optional("SSH_CONTROL_PATH").map(PathBuf::from),
        };
        let gps = GpsSampling {
            timeout_secs: vars.parse("CGPS_TIMEOUT_SEC", 8u64)?,
            samples: vars.parse("GPSPIPE_SAMPLES", 5u32)?,
        };
        if gps.local_timeout().is_none() {
            return Err(ConfigError::Invalid {
                var: "CGPS_TIMEOUT_SEC",
                value: gps.timeout_secs.to_string(),
            });
        }

        let thresholds = HealthThresholds {
            acceptable_leap_statuses: vars
                .string("ACCEPTABLE_LEAP_STATUSES", DEFAULT_LEAP_STATUS)
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            max_stratum: vars.parse("MAX_STRATUM", DEFAULT_MAX_STRATUM)?,
            max_abs_offset_sec: vars.parse("MAX_ABS_OFFSET_SEC", DEFAULT_MAX_ABS_OFFSET_SEC)?,
            min_sources: vars.parse("MIN_SOURCES", DEFAULT_MIN_SOURCES)?,
            require_selected_source: vars.flag("REQUIRE_SELECTED_SOURCE", true)?,
            gps_required: vars.flag("GPS_REQUIRED", false)?,
        };
        thresholds.validate()?;

        let check_interval_secs: u64 = vars.parse("CHECK_INTERVAL_SEC", 30)?;
        if check_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "CHECK_INTERVAL_SEC",
                value: "0".to_string(),
            });
        }
        let renotify_secs: i64 =
            vars.parse("RENOTIFY_INTERVAL_SEC", DEFAULT_RENOTIFY_INTERVAL_SECS)?;
        let renotify_interval = chrono::TimeDelta::try_seconds(renotify_secs)
            .filter(|_| renotify_secs >= 0)
            .ok_or(ConfigError::Invalid {
                var: "RENOTIFY_INTERVAL_SEC",
                value: renotify_secs.to_string(),
            })?;
        let alert_timeout_secs: u64 =
            vars.parse("ALERT_TIMEOUT_SECS", DEFAULT_SEND_TIMEOUT.as_secs())?;
        if alert_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "ALERT_TIMEOUT_SECS",
                value: "0".to_string(),
            });
        }
        let maintenance_interval_secs: u64 = vars.parse("MAINTENANCE_INTERVAL_SECS", 86_400)?;
        if maintenance_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "MAINTENANCE_INTERVAL_SECS",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            host: HostLabel {
                host,
                ip: vars.string("NTP_IP", "0.0.0.0"),
            },
            ssh,
            gps,
            thresholds,
            check_interval: Duration::from_secs(check_interval_secs),
            renotify_interval,
            alert_timeout: Duration::from_secs(alert_timeout_secs),
            retention_days: vars.parse("RETENTION_DAYS", DEFAULT_RETENTION_DAYS)?,
            premake_days: vars.parse("PREMAKE_DAYS", DEFAULT_PREMAKE_DAYS)?,
            maintenance_interval: Duration::from_secs(maintenance_interval_secs),
            shutdown_grace: Duration::from_secs(vars.parse("SHUTDOWN_GRACE_SECS", 15u64)?),
            database_url: vars
                .optional("DATABASE_URL")
                .ok_or(ConfigError::Missing("DATABASE_URL"))?,
            db_max_connections: vars.parse("DB_MAX_CONNECTIONS", 5u32)?,
        })
    }
}

struct Vars<'a, F>(&'a F);

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Set and non-blank.
    fn optional(&self, name: &str) -> Option<String> {
        (self.0)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn string(&self, name: &str, default: &str) -> String {
        self.optional(name).unwrap_or_else(|| default.to_string())
    }

    fn parse<T: FromStr>(&self, name: &'static str, default: T) -> Result<T, ConfigError> {
        match self.optional(name) {
            None => Ok(default),
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::Invalid { var: name, value }),
        }
    }

    fn flag(&self, name: &'static str, default: bool) -> Result<bool, ConfigError> {
        match self.optional(name) {
            None => Ok(default),
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::Invalid { var: name, value }),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<AgentConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AgentConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_only_database_url_is_set() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/ntp")]).unwrap();

        assert_eq!(config.host.host, "myntp");
        assert_eq!(config.host.ip, "0.0.0.0");
        assert_eq!(config.ssh.user, "ubuntu");
        assert_eq!(config.ssh.port, 22);
        assert_eq!(config.ssh.command_timeout, Duration::from_secs(10));
        assert!(config.ssh.control_path.is_none());
        assert_eq!(config.gps.timeout_secs, 8);
        assert_eq!(config.gps.samples, 5);
        assert_eq!(config.thresholds, HealthThresholds::default());
        assert_eq!(config.check_interval, Duration::from_secs(30));
        assert_eq!(config.renotify_interval, chrono::Duration::hours(1));
        assert_eq!(config.alert_timeout, Duration::from_secs(10));
        assert_eq!(config.retention_days, 90);
        assert_eq!(config.premake_days, 7);
        assert_eq!(config.db_max_connections, 5);
    }

    #[test]
    fn missing_database_url_is_fatal() {
        assert_matches!(load(&[]), Err(ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = load(&[
            ("DATABASE_URL", "postgres://db/ntp"),
            ("NTP_HOST", "gps-clock"),
            ("SSH_PORT", "2222"),
            ("SSH_CONTROL_PATH", "/tmp/ntpwatch-%C"),
            ("MAX_ABS_OFFSET_SEC", "0.5"),
            ("ACCEPTABLE_LEAP_STATUSES", "Normal, Insert second"),
            ("GPS_REQUIRED", "true"),
            ("RETENTION_DAYS", "30"),
        ])
        .unwrap();

        assert_eq!(config.ssh.host, "gps-clock");
        assert_eq!(config.ssh.port, 2222);
        assert_eq!(
            config.ssh.control_path,
            Some(PathBuf::from("/tmp/ntpwatch-%C"))
        );
        assert_eq!(config.thresholds.max_abs_offset_sec, 0.5);
        assert_eq!(
            config.thresholds.acceptable_leap_statuses,
            vec!["Normal".to_string(), "Insert second".to_string()]
        );
        assert!(config.thresholds.gps_required);
        assert_eq!(config.retention_days, 30);
    }

    #[test]
    fn unparseable_value_names_the_variable() {
        let err = load(&[("DATABASE_URL", "postgres://db"), ("SSH_PORT", "ssh")]).unwrap_err();
        assert_matches!(err, ConfigError::Invalid { var: "SSH_PORT", .. });
    }

    #[test]
    fn bad_flag_is_rejected() {
        let err = load(&[("DATABASE_URL", "postgres://db"), ("GPS_REQUIRED", "maybe")]).unwrap_err();
        assert_matches!(err, ConfigError::Invalid { var: "GPS_REQUIRED", .. });
    }

    #[test]
    fn negative_offset_bound_fails_validation() {
        let err = load(&[
            ("DATABASE_URL", "postgres://db"),
            ("MAX_ABS_OFFSET_SEC", "-1"),
        ])
        .unwrap_err();
        assert_matches!(err, ConfigError::Thresholds(_));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = load(&[("DATABASE_URL", "postgres://db"), ("CHECK_INTERVAL_SEC", "0")]).unwrap_err();
        assert_matches!(err, ConfigError::Invalid { var: "CHECK_INTERVAL_SEC", .. });
    }

    #[test]
    fn out_of_range_renotify_interval_is_rejected() {
        let err = load(&[
            ("DATABASE_URL", "postgres://db"),
            ("RENOTIFY_INTERVAL_SEC", "9223372036854775807"),
        ])
        .unwrap_err();
        assert_matches!(err, ConfigError::Invalid { var: "RENOTIFY_INTERVAL_SEC", .. });
    }

    #[test]
    fn negative_renotify_interval_is_rejected() {
        let err = load(&[
            ("DATABASE_URL", "postgres://db"),
            ("RENOTIFY_INTERVAL_SEC", "-5"),
        ])
        .unwrap_err();
        assert_matches!(err, ConfigError::Invalid { var: "RENOTIFY_INTERVAL_SEC", .. });
    }

    #[test]
    fn zero_renotify_interval_is_allowed() {
        let config = load(&[
            ("DATABASE_URL", "postgres://db"),
            ("RENOTIFY_INTERVAL_SEC", "0"),
        ])
        .unwrap();
        assert_eq!(config.renotify_interval, chrono::Duration::zero());
    }

    #[test]
    fn unbounded_gps_window_is_rejected() {
        let err = load(&[
            ("DATABASE_URL", "postgres://db"),
            ("CGPS_TIMEOUT_SEC", "18446744073709551615"),
        ])
        .unwrap_err();
        assert_matches!(err, ConfigError::Invalid { var: "CGPS_TIMEOUT_SEC", .. });
    }

    #[test]
    fn alert_timeout_is_configurable() {
        let config = load(&[
            ("DATABASE_URL", "postgres://db"),
            ("ALERT_TIMEOUT_SECS", "45"),
        ])
        .unwrap();
        assert_eq!(config.alert_timeout, Duration::from_secs(45));

        let err = load(&[("DATABASE_URL", "postgres://db"), ("ALERT_TIMEOUT_SECS", "0")]).unwrap_err();
        assert_matches!(err, ConfigError::Invalid { var: "ALERT_TIMEOUT_SECS", .. });
    }
}
