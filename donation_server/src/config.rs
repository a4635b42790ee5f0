use std::{env, fmt::Display, str::FromStr, time::Duration};

use donation_engine::{
    db::sqlite::{db_url, PoolSettings, DEFAULT_ACQUIRE_TIMEOUT, DEFAULT_MAX_CONNECTIONS},
    events::DEFAULT_VIEWER_BUFFER,
    retry::{RetryPolicy, DEFAULT_BACKOFF, DEFAULT_MAX_ATTEMPTS},
};
use log::*;

const DEFAULT_DCS_HOST: &str = "127.0.0.1";
const DEFAULT_DCS_PORT: u16 = 5000;
const DEFAULT_CONNECTION_CHECK_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    /// How long a database operation waits for a free connection before the attempt counts as failed.
    pub db_acquire_timeout: Duration,
    /// The retry policy applied to every database operation.
    pub db_retry: RetryPolicy,
    /// How often the database connection is checked, and rebuilt if necessary.
    pub connection_check_interval: Duration,
    /// The number of updates buffered for each viewer. A viewer that falls further behind misses updates.
    pub viewer_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_DCS_HOST.to_string(),
            port: DEFAULT_DCS_PORT,
            database_url: String::default(),
            db_max_connections: DEFAULT_MAX_CONNECTIONS,
            db_acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            db_retry: RetryPolicy::default(),
            connection_check_interval: DEFAULT_CONNECTION_CHECK_INTERVAL,
            viewer_buffer: DEFAULT_VIEWER_BUFFER,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("DCS_HOST").ok().unwrap_or_else(|| DEFAULT_DCS_HOST.into());
        let port = parse_env("DCS_PORT", DEFAULT_DCS_PORT);
        let database_url = db_url();
        let db_max_connections = parse_env("DCS_DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS);
        let db_acquire_timeout =
            Duration::from_millis(parse_env("DCS_DB_ACQUIRE_TIMEOUT_MS", DEFAULT_ACQUIRE_TIMEOUT.as_millis() as u64));
        let retry_attempts = parse_env("DCS_DB_RETRY_ATTEMPTS", DEFAULT_MAX_ATTEMPTS);
        let retry_backoff = Duration::from_millis(parse_env("DCS_DB_RETRY_BACKOFF_MS", DEFAULT_BACKOFF.as_millis() as u64));
        let db_retry = RetryPolicy::new(retry_attempts, retry_backoff);
        let connection_check_interval = Duration::from_secs(parse_env(
            "DCS_CONNECTION_CHECK_INTERVAL_SECS",
            DEFAULT_CONNECTION_CHECK_INTERVAL.as_secs(),
        ));
        let viewer_buffer = parse_env("DCS_VIEWER_BUFFER", DEFAULT_VIEWER_BUFFER);
        Self {
            host,
            port,
            database_url,
            db_max_connections,
            db_acquire_timeout,
            db_retry,
            connection_check_interval,
            viewer_buffer,
        }
    }

    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings::default()
            .with_max_connections(self.db_max_connections)
            .with_acquire_timeout(self.db_acquire_timeout)
            .with_retry_policy(self.db_retry)
    }
}

/// Reads `key` from the environment, falling back to `default` if it is not set or cannot be parsed.
fn parse_env<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(s) => s.parse::<T>().unwrap_or_else(|e| {
            warn!("🪛️ {s} is not a valid value for {key}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => {
            debug!("🪛️ {key} is not set. Using the default value of {default}.");
            default
        },
    }
}
