use std::time::Duration;

use chrono_tz::Tz;
use mpc_core::types::DEFAULT_COORDINATOR_PORT;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Time allowed for background tasks to stop after the server has
    /// stopped accepting connections (default: `30`).
    pub shutdown_timeout_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `8000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`| `30`                       |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .map(|v| v.parse().expect("PORT must be a valid u16"))
            .unwrap_or(DEFAULT_COORDINATOR_PORT);

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", 30),
            shutdown_timeout_secs: env_parse("SHUTDOWN_TIMEOUT_SECS", 30),
        }
    }
}

/// Orchestration settings: local executor, registry loading, ledger lease and
/// the trigger schedule.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub memory_threshold: f64,
    pub admission_poll: Duration,
    pub thread_workers: usize,
    pub process_workers: usize,
    /// Timeout for direct jobs run in the process pool.
    pub direct_job_timeout: Duration,
    pub registry_load_concurrency: usize,
    /// `None` disables lease expiry of ledger entries.
    pub ledger_lease: Option<Duration>,
    pub schedule: ScheduleConfig,
}

impl CoordinatorConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default |
    /// |-----------------------------|---------|
    /// | `MEMORY_THRESHOLD`          | `0.9`   |
    /// | `ADMISSION_POLL_MS`         | `1000`  |
    /// | `THREAD_WORKERS`            | `8`     |
    /// | `PROCESS_WORKERS`           | `2`     |
    /// | `DIRECT_JOB_TIMEOUT_SECS`   | `300`   |
    /// | `REGISTRY_LOAD_CONCURRENCY` | `8`     |
    /// | `LEDGER_LEASE_SECS`         | `21600` (`0` disables) |
    pub fn from_env() -> Self {
        let lease_secs: u64 = env_parse("LEDGER_LEASE_SECS", 21_600);

        Self {
            memory_threshold: env_parse("MEMORY_THRESHOLD", 0.9),
            admission_poll: Duration::from_millis(env_parse("ADMISSION_POLL_MS", 1_000)),
            thread_workers: env_parse("THREAD_WORKERS", 8),
            process_workers: env_parse("PROCESS_WORKERS", 2),
            direct_job_timeout: Duration::from_secs(env_parse("DIRECT_JOB_TIMEOUT_SECS", 300)),
            registry_load_concurrency: env_parse("REGISTRY_LOAD_CONCURRENCY", 8),
            ledger_lease: (lease_secs > 0).then(|| Duration::from_secs(lease_secs)),
            schedule: ScheduleConfig::from_env(),
        }
    }
}

/// Cron expressions use the six-field format of the `cron` crate
/// (`sec min hour day month weekday`) and are evaluated in `timezone`.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub timezone: Tz,
    pub every_minute: String,
    pub every_five_minutes: String,
    pub quarter_hourly: String,
    pub daily_retrain: String,
    pub heartbeat: String,
    pub control: String,
    pub memory_report: Duration,
    pub train_on_startup: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::Europe::Vienna,
            every_minute: "0 * * * * *".into(),
            every_five_minutes: "30 */5 * * * *".into(),
            quarter_hourly: "0 3,18,33,48 * * * *".into(),
            daily_retrain: "0 0 3 * * *".into(),
            heartbeat: "0 * * * * *".into(),
            control: "0 3,18,33,48 * * * *".into(),
            memory_report: Duration::from_secs(10),
            train_on_startup: true,
        }
    }
}

impl ScheduleConfig {
    /// | Env Var                 | Default                 |
    /// |-------------------------|-------------------------|
    /// | `SCHEDULE_TIMEZONE`     | `Europe/Vienna`         |
    /// | `CRON_EVERY_MINUTE`     | `0 * * * * *`           |
    /// | `CRON_EVERY_FIVE_MINUTES` | `30 */5 * * * *`      |
    /// | `CRON_QUARTER_HOURLY`   | `0 3,18,33,48 * * * *`  |
    /// | `CRON_DAILY_RETRAIN`    | `0 0 3 * * *`           |
    /// | `CRON_HEARTBEAT`        | `0 * * * * *`           |
    /// | `CRON_CONTROL`          | `0 3,18,33,48 * * * *`  |
    /// | `MEMORY_REPORT_SECS`    | `10`                    |
    /// | `TRAIN_ON_STARTUP`      | `true`                  |
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let timezone = match std::env::var("SCHEDULE_TIMEZONE") {
            Ok(tz) => tz.parse().expect("SCHEDULE_TIMEZONE must be an IANA timezone"),
            Err(_) => defaults.timezone,
        };

        Self {
            timezone,
            every_minute: std::env::var("CRON_EVERY_MINUTE").unwrap_or(defaults.every_minute),
            every_five_minutes: std::env::var("CRON_EVERY_FIVE_MINUTES")
                .unwrap_or(defaults.every_five_minutes),
            quarter_hourly: std::env::var("CRON_QUARTER_HOURLY").unwrap_or(defaults.quarter_hourly),
            daily_retrain: std::env::var("CRON_DAILY_RETRAIN").unwrap_or(defaults.daily_retrain),
            heartbeat: std::env::var("CRON_HEARTBEAT").unwrap_or(defaults.heartbeat),
            control: std::env::var("CRON_CONTROL").unwrap_or(defaults.control),
            memory_report: Duration::from_secs(env_parse("MEMORY_REPORT_SECS", 10)),
            train_on_startup: env_parse("TRAIN_ON_STARTUP", true),
        }
    }
}

fn env_parse<T>(name: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{name} has an invalid value: {raw}")),
        Err(_) => default,
    }
}
