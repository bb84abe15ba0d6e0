//! Worker configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use inventory::{ReservationConfig, WriteMode};

/// Worker configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `DATABASE_URL` — PostgreSQL state store; in-memory when unset
/// - `DATABASE_MAX_CONNECTIONS` — pool size (default: `5`)
/// - `SEED_SAMPLE_CATALOG` — restock the sample items at startup (default: `false`)
/// - `RESERVATION_DELAY_MS` — pause before the stock read (default: `0`)
/// - `RESERVATION_MAX_ATTEMPTS` — read-check-write cycles (default: `5`)
/// - `RESERVATION_RETRY_BACKOFF_MS` — base pause between cycles (default: `10`)
/// - `RESERVATION_WRITE_MODE` — `optimistic` or `unconditional` (default: `optimistic`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub seed_sample_catalog: bool,
    pub reservation: ReservationConfig,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults for
    /// missing or unparsable values.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let reservation = ReservationConfig {
            processing_delay: Duration::from_millis(parse_or(
                &lookup,
                "RESERVATION_DELAY_MS",
                defaults.reservation.processing_delay.as_millis() as u64,
            )),
            max_attempts: parse_or(
                &lookup,
                "RESERVATION_MAX_ATTEMPTS",
                defaults.reservation.max_attempts,
            ),
            retry_backoff: Duration::from_millis(parse_or(
                &lookup,
                "RESERVATION_RETRY_BACKOFF_MS",
                defaults.reservation.retry_backoff.as_millis() as u64,
            )),
            write_mode: parse_or::<WriteMode, _>(
                &lookup,
                "RESERVATION_WRITE_MODE",
                defaults.reservation.write_mode,
            ),
        };

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "PORT", defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            database_max_connections: parse_or(
                &lookup,
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            ),
            seed_sample_catalog: parse_or(
                &lookup,
                "SEED_SAMPLE_CATALOG",
                defaults.seed_sample_catalog,
            ),
            reservation,
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "ignoring unparsable setting");
            default
        }),
        None => default,
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            database_max_connections: 5,
            seed_sample_catalog: false,
            reservation: ReservationConfig::default(),
        }
    }
}
