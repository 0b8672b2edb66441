//! Environment configuration.
//!
//! [`DbConfig::from_env`] reads `ROSTER_DB_*` variables, falling back to
//! the [`DbConfig::new`] defaults for anything unset.
//!
//! | Variable                          | Field                  |
//! |-----------------------------------|------------------------|
//! | `ROSTER_DB_PATH`                  | `database_path`        |
//! | `ROSTER_DB_MAX_CONNECTIONS`       | `max_connections`      |
//! | `ROSTER_DB_LOCK_TIMEOUT_MS`       | `lock_timeout`         |
//! | `ROSTER_DB_QUERY_CACHE_CAPACITY`  | `query_cache_capacity` |
//! | `ROSTER_DB_RUN_MIGRATIONS`        | `run_migrations`       |

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::pool::DbConfig;

/// Default database file when `ROSTER_DB_PATH` is unset.
pub const DEFAULT_DB_PATH: &str = "./roster.db";

impl DbConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let path = lookup("ROSTER_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
        if path.trim().is_empty() {
            return Err(ConfigError::MissingRequired("ROSTER_DB_PATH".to_string()));
        }

        let mut config = DbConfig::new(path);

        if let Some(max) = parse(&lookup, "ROSTER_DB_MAX_CONNECTIONS")? {
            if max == 0 {
                return Err(ConfigError::InvalidValue(
                    "ROSTER_DB_MAX_CONNECTIONS".to_string(),
                ));
            }
            config = config.max_connections(max);
        }

        if let Some(ms) = parse::<u64>(&lookup, "ROSTER_DB_LOCK_TIMEOUT_MS")? {
            config = config.lock_timeout(Duration::from_millis(ms));
        }

        if let Some(capacity) = parse(&lookup, "ROSTER_DB_QUERY_CACHE_CAPACITY")? {
            config = config.query_cache_capacity(capacity);
        }

        if let Some(run) = parse(&lookup, "ROSTER_DB_RUN_MIGRATIONS")? {
            config = config.run_migrations(run);
        }

        Ok(config)
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
