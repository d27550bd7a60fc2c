//! Configuration types.
//!
//! Everything is read from `DRIP_*` environment variables with sensible
//! defaults; only the SMS provider settings are required.

use std::str::FromStr;
use std::time::Duration;

use chrono::Utc;
use secrecy::SecretString;

use crate::error::ConfigError;

/// Daily send window in the lead's local time, inclusive start / exclusive end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendWindow {
    pub start_hour: u32,
    pub start_minute: u32,
    pub end_hour: u32,
    pub end_minute: u32,
}

impl Default for SendWindow {
    fn default() -> Self {
        // [09:15, 20:00)
        Self {
            start_hour: 9,
            start_minute: 15,
            end_hour: 20,
            end_minute: 0,
        }
    }
}

/// Inclusive bounds for the random minutes added to every scheduled send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JitterBounds {
    pub min_minutes: i64,
    pub max_minutes: i64,
}

impl Default for JitterBounds {
    fn default() -> Self {
        Self {
            min_minutes: 15,
            max_minutes: 65,
        }
    }
}

/// When a periodic job fires: a fixed interval or a cron expression.
///
/// The expression is kept as a string (validated at config time) and
/// parsed per tick.
#[derive(Debug, Clone)]
pub enum JobSchedule {
    Every(Duration),
    Cron(String),
}

impl JobSchedule {
    /// Delay until the next firing, measured from now.
    pub fn next_delay(&self) -> Duration {
        match self {
            Self::Every(interval) => *interval,
            Self::Cron(expr) => cron::Schedule::from_str(expr)
                .ok()
                .and_then(|schedule| schedule.upcoming(Utc).next())
                .and_then(|at| (at - Utc::now()).to_std().ok())
                .unwrap_or(Duration::from_secs(60)),
        }
    }
}

/// SMS provider settings.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base URL of the provider's send endpoint.
    pub base_url: String,
    /// Bearer token for provider auth.
    pub auth_token: SecretString,
    /// E.164 number sends originate from.
    pub from_number: String,
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Path to the libSQL database file.
    pub db_path: String,
    /// HTTP bind port for the webhook and job trigger routes.
    pub bind_port: u16,
    /// SMS provider settings.
    pub provider: ProviderConfig,
    /// Max leads processed per sweep run.
    pub sweep_batch_size: usize,
    /// Max leads released per snooze-expiry run.
    pub expire_batch_size: usize,
    /// Concurrent per-lead dispatches within one sweep.
    pub sweep_concurrency: usize,
    /// Timeout for a single transport send.
    pub transport_timeout: Duration,
    /// Random offset added to each computed send time.
    pub jitter: JitterBounds,
    /// Daily window sends are clamped into.
    pub send_window: SendWindow,
    /// Lead-local offset from UTC, in minutes.
    pub local_offset_minutes: i32,
    /// How long a NOT_NOW reply parks a lead in the long-term stage.
    pub long_term_snooze_days: i64,
    /// Sweep job schedule.
    pub sweep_schedule: JobSchedule,
    /// Snooze-expiry job schedule.
    pub expire_schedule: JobSchedule,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            db_path: "./data/drip-engine.db".to_string(),
            bind_port: 8080,
            provider: ProviderConfig {
                base_url: "http://localhost:0".to_string(),
                auth_token: SecretString::from(""),
                from_number: "+15550000000".to_string(),
            },
            sweep_batch_size: 20,
            expire_batch_size: 100,
            sweep_concurrency: 4,
            transport_timeout: Duration::from_secs(10),
            jitter: JitterBounds::default(),
            send_window: SendWindow::default(),
            local_offset_minutes: 0,
            long_term_snooze_days: 30,
            sweep_schedule: JobSchedule::Every(Duration::from_secs(300)),
            expire_schedule: JobSchedule::Every(Duration::from_secs(900)),
        }
    }
}

impl EngineConfig {
    /// Build configuration from `DRIP_*` environment variables.
    ///
    /// Provider URL, token and from-number are required; everything else
    /// falls back to the defaults above.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let provider = ProviderConfig {
            base_url: require_env("DRIP_PROVIDER_URL")?,
            auth_token: SecretString::from(require_env("DRIP_PROVIDER_TOKEN")?),
            from_number: require_env("DRIP_FROM_NUMBER")?,
        };

        Ok(Self {
            db_path: env_or("DRIP_DB_PATH", defaults.db_path),
            bind_port: env_parse("DRIP_PORT", defaults.bind_port)?,
            provider,
            sweep_batch_size: env_parse("DRIP_SWEEP_BATCH", defaults.sweep_batch_size)?,
            expire_batch_size: env_parse("DRIP_EXPIRE_BATCH", defaults.expire_batch_size)?,
            sweep_concurrency: env_parse("DRIP_SWEEP_CONCURRENCY", defaults.sweep_concurrency)?,
            transport_timeout: Duration::from_secs(env_parse("DRIP_TRANSPORT_TIMEOUT_SECS", 10)?),
            jitter: defaults.jitter,
            send_window: defaults.send_window,
            local_offset_minutes: env_parse(
                "DRIP_LOCAL_OFFSET_MINUTES",
                defaults.local_offset_minutes,
            )?,
            long_term_snooze_days: env_parse(
                "DRIP_LONG_TERM_SNOOZE_DAYS",
                defaults.long_term_snooze_days,
            )?,
            sweep_schedule: schedule_from_env(
                "DRIP_SWEEP_CRON",
                "DRIP_SWEEP_INTERVAL_SECS",
                300,
            )?,
            expire_schedule: schedule_from_env(
                "DRIP_EXPIRE_CRON",
                "DRIP_EXPIRE_INTERVAL_SECS",
                900,
            )?,
        })
    }
}

fn require_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse().map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{e}"),
        }),
        Err(_) => Ok(default),
    }
}

/// A cron expression takes precedence over a fixed interval.
fn schedule_from_env(
    cron_key: &str,
    interval_key: &str,
    default_secs: u64,
) -> Result<JobSchedule, ConfigError> {
    if let Ok(expr) = std::env::var(cron_key) {
        cron::Schedule::from_str(&expr).map_err(|e| ConfigError::InvalidCron {
            key: cron_key.to_string(),
            message: e.to_string(),
        })?;
        return Ok(JobSchedule::Cron(expr));
    }
    let secs = env_parse(interval_key, default_secs)?;
    Ok(JobSchedule::Every(Duration::from_secs(secs)))
}
