//! Auth service configuration.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use common::{AppError, AppResult, DatabaseConfig, HttpClientConfig, RetryConfig};
use domain::{
    ACCOUNT_SERVICE_NAME, DEFAULT_DORMANCY_RETENTION_DAYS, MAX_DORMANCY_RETENTION_DAYS,
};

use crate::discovery::SelectionStrategy;

/// Default HTTP port for the auth service
pub const DEFAULT_PORT: u16 = 8081;

/// Default period between dormancy sweeps (one day)
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Default period between outbox relay passes
pub const DEFAULT_OUTBOX_POLL_INTERVAL_SECS: u64 = 30;

/// Default maximum number of outbox entries handled per pass
pub const DEFAULT_OUTBOX_BATCH_SIZE: u64 = 100;

/// Where Account service instances are discovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrySource {
    /// Eureka-compatible registry at this base URL
    Eureka { url: String },
    /// Fixed list of instance base URIs
    Static { instances: Vec<String> },
}

/// Auth service configuration.
#[derive(Debug, Clone)]
pub struct AuthServiceConfig {
    pub database: DatabaseConfig,
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Logical discovery name of the Account service
    pub account_service_name: String,
    pub registry: RegistrySource,
    pub selection: SelectionStrategy,
    /// Skip instances whose registry status is not UP
    pub health_aware: bool,
    pub http: HttpClientConfig,
    /// Days a dormant account is kept before it is purged
    pub dormancy_retention_days: i64,
    pub sweep_interval_secs: u64,
    pub outbox_poll_interval_secs: u64,
    pub outbox_batch_size: u64,
    pub outbox_retry: RetryConfig,
}

impl AuthServiceConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let registry = match first_var(&["SERVICE_REGISTRY_URL", "EUREKA_URL"]) {
            Some(url) => RegistrySource::Eureka { url },
            None => RegistrySource::Static {
                instances: first_var(&["ACCOUNT_SERVICE_INSTANCES"])
                    .map(|list| parse_list(&list))
                    .unwrap_or_default(),
            },
        };

        Self {
            database: DatabaseConfig {
                url: first_var(&["AUTH_SERVICE_DATABASE_URL", "DATABASE_URL"])
                    .unwrap_or(defaults.database.url),
                max_connections: parse_var(
                    &["DATABASE_MAX_CONNECTIONS"],
                    defaults.database.max_connections,
                ),
                min_connections: parse_var(
                    &["DATABASE_MIN_CONNECTIONS"],
                    defaults.database.min_connections,
                ),
                connect_timeout_secs: parse_var(
                    &["DATABASE_CONNECT_TIMEOUT_SECS"],
                    defaults.database.connect_timeout_secs,
                ),
                idle_timeout_secs: parse_var(
                    &["DATABASE_IDLE_TIMEOUT_SECS"],
                    defaults.database.idle_timeout_secs,
                ),
                sqlx_logging: parse_var(&["DATABASE_LOG_SQL"], defaults.database.sqlx_logging),
            },
            host: first_var(&["AUTH_SERVICE_HOST"]).unwrap_or(defaults.host),
            port: parse_var(&["AUTH_SERVICE_PORT"], defaults.port),
            account_service_name: first_var(&["ACCOUNT_SERVICE_NAME"])
                .unwrap_or(defaults.account_service_name),
            registry,
            selection: parse_var(&["ACCOUNT_SERVICE_SELECTION"], defaults.selection),
            health_aware: parse_var(&["ACCOUNT_SERVICE_HEALTH_AWARE"], defaults.health_aware),
            http: HttpClientConfig {
                connect_timeout_ms: parse_var(
                    &["HTTP_CONNECT_TIMEOUT_MS"],
                    defaults.http.connect_timeout_ms,
                ),
                request_timeout_ms: parse_var(
                    &["HTTP_REQUEST_TIMEOUT_MS"],
                    defaults.http.request_timeout_ms,
                ),
            },
            dormancy_retention_days: parse_var(
                &["DORMANCY_RETENTION_DAYS"],
                defaults.dormancy_retention_days,
            ),
            sweep_interval_secs: parse_var(
                &["DORMANCY_SWEEP_INTERVAL_SECS"],
                defaults.sweep_interval_secs,
            ),
            outbox_poll_interval_secs: parse_var(
                &["OUTBOX_POLL_INTERVAL_SECS"],
                defaults.outbox_poll_interval_secs,
            ),
            outbox_batch_size: parse_var(&["OUTBOX_BATCH_SIZE"], defaults.outbox_batch_size),
            outbox_retry: RetryConfig {
                base_delay_ms: parse_var(
                    &["OUTBOX_BASE_DELAY_MS"],
                    defaults.outbox_retry.base_delay_ms,
                ),
                max_delay_ms: parse_var(
                    &["OUTBOX_MAX_DELAY_MS"],
                    defaults.outbox_retry.max_delay_ms,
                ),
                max_attempts: parse_var(
                    &["OUTBOX_MAX_ATTEMPTS"],
                    defaults.outbox_retry.max_attempts,
                ),
            },
        }
    }

    /// Reject values the service cannot run with.
    pub fn validate(&self) -> AppResult<()> {
        if !(1..=MAX_DORMANCY_RETENTION_DAYS).contains(&self.dormancy_retention_days) {
            return Err(AppError::validation(format!(
                "DORMANCY_RETENTION_DAYS must be between 1 and {} days",
                MAX_DORMANCY_RETENTION_DAYS
            )));
        }
        if self.sweep_interval_secs == 0 || self.outbox_poll_interval_secs == 0 {
            return Err(AppError::validation("Background job intervals must be non-zero"));
        }
        if self.database.max_connections == 0
            || self.database.min_connections > self.database.max_connections
        {
            return Err(AppError::validation(
                "DATABASE_MIN_CONNECTIONS must not exceed a non-zero DATABASE_MAX_CONNECTIONS",
            ));
        }
        if self.outbox_batch_size == 0 {
            return Err(AppError::validation("OUTBOX_BATCH_SIZE must be non-zero"));
        }
        if self.outbox_retry.max_attempts == 0 {
            return Err(AppError::validation("OUTBOX_MAX_ATTEMPTS must be non-zero"));
        }
        if self.outbox_retry.base_delay_ms > self.outbox_retry.max_delay_ms {
            return Err(AppError::validation(
                "OUTBOX_BASE_DELAY_MS must not exceed OUTBOX_MAX_DELAY_MS",
            ));
        }
        Ok(())
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn outbox_poll_interval(&self) -> Duration {
        Duration::from_secs(self.outbox_poll_interval_secs)
    }
}

impl Default for AuthServiceConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            account_service_name: ACCOUNT_SERVICE_NAME.to_string(),
            registry: RegistrySource::Static {
                instances: Vec::new(),
            },
            selection: SelectionStrategy::RoundRobin,
            health_aware: true,
            http: HttpClientConfig::default(),
            dormancy_retention_days: DEFAULT_DORMANCY_RETENTION_DAYS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            outbox_poll_interval_secs: DEFAULT_OUTBOX_POLL_INTERVAL_SECS,
            outbox_batch_size: DEFAULT_OUTBOX_BATCH_SIZE,
            outbox_retry: RetryConfig::default(),
        }
    }
}

/// First set variable among `keys`.
fn first_var(keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| env::var(key).ok())
        .filter(|value| !value.trim().is_empty())
}

/// Parse the first set variable, falling back to `default` when unset or invalid.
fn parse_var<T: FromStr>(keys: &[&str], default: T) -> T {
    match first_var(keys) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key = keys[0], value = %raw, "Ignoring unparsable setting");
            default
        }),
        None => default,
    }
}

/// Split a comma-separated list, dropping blanks.
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
