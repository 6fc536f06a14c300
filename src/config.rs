// Application configuration loaded from the environment (and .env via dotenv)

use crate::auth::{password::HashCost, token::JwtConfig};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_ACCESS_TTL_SECS: i64 = 24 * 60 * 60;
const DEFAULT_REFRESH_TTL_SECS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_STORE_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Runtime settings for the service
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// When unset the service runs on in-memory stores
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    pub hash_cost: HashCost,
    /// Upper bound for every store/repository call made by the auth workflow
    pub store_timeout: Duration,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_url", &self.database_url.as_ref().map(|_| "<redacted>"))
            .field("jwt", &self.jwt)
            .field("hash_cost", &self.hash_cost)
            .field("store_timeout", &self.store_timeout)
            .finish()
    }
}

impl AppConfig {
    /// Read configuration from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let access_secret = required(&lookup, "JWT_ACCESS_SECRET")?;
        let refresh_secret = required(&lookup, "JWT_REFRESH_SECRET")?;
        if access_secret == refresh_secret {
            return Err(ConfigError::Invalid {
                name: "JWT_REFRESH_SECRET",
                reason: "must differ from JWT_ACCESS_SECRET".to_string(),
            });
        }

        let access_ttl = ttl(&lookup, "ACCESS_TOKEN_TTL_SECS", DEFAULT_ACCESS_TTL_SECS)?;
        let refresh_ttl = ttl(&lookup, "REFRESH_TOKEN_TTL_SECS", DEFAULT_REFRESH_TTL_SECS)?;

        let store_timeout: u64 = parsed(&lookup, "STORE_TIMEOUT_SECS", DEFAULT_STORE_TIMEOUT_SECS)?;
        if store_timeout == 0 {
            return Err(ConfigError::Invalid {
                name: "STORE_TIMEOUT_SECS",
                reason: "must be at least 1 second".to_string(),
            });
        }

        let defaults = HashCost::default();
        let hash_cost = HashCost {
            memory_kib: parsed(&lookup, "PASSWORD_HASH_MEMORY_KIB", defaults.memory_kib)?,
            iterations: parsed(&lookup, "PASSWORD_HASH_ITERATIONS", defaults.iterations)?,
            parallelism: parsed(&lookup, "PASSWORD_HASH_PARALLELISM", defaults.parallelism)?,
        };

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parsed(&lookup, "PORT", 8080)?,
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            jwt: JwtConfig {
                access_secret,
                refresh_secret,
                access_ttl,
                refresh_ttl,
            },
            hash_cost,
            store_timeout: Duration::from_secs(store_timeout),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn required<F>(lookup: &F, name: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .filter(|value| !value.is_empty())
        .ok_or(ConfigError::Missing(name))
}

/// Token lifetime in whole seconds; must be positive and fit a `chrono::Duration`
fn ttl<F>(lookup: &F, name: &'static str, default: i64) -> Result<chrono::Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let secs: i64 = parsed(lookup, name, default)?;
    if secs <= 0 {
        return Err(ConfigError::Invalid {
            name,
            reason: "must be a positive number of seconds".to_string(),
        });
    }
    chrono::Duration::try_seconds(secs).ok_or_else(|| ConfigError::Invalid {
        name,
        reason: format!("{} seconds is out of range", secs),
    })
}

fn parsed<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}
