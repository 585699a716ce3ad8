//! Process configuration.
//!
//! Everything is read once at startup into an [`AppConfig`] and passed down
//! explicitly. `from_lookup` takes any key lookup so tests never touch the
//! real process environment.

use core::fmt::Display;
use core::str::FromStr;

use chrono::Duration;
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use thiserror::Error;

use warehouse_observability::LogFormat;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_JWT_TTL_HOURS: i64 = 24;
pub const DEFAULT_JWT_SECRET: &str = "dev-secret";
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Postgres connection settings.
#[derive(Clone)]
pub struct DatabaseConfig {
    pub connect: PgConnectOptions,
    pub max_connections: u32,
}

// The password never appears in logs.
impl core::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.connect.get_host())
            .field("port", &self.connect.get_port())
            .field("username", &self.connect.get_username())
            .field("database", &self.connect.get_database())
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

/// Application configuration.
#[derive(Clone)]
pub struct AppConfig {
    pub port: u16,
    /// `None` selects the in-memory store.
    pub database: Option<DatabaseConfig>,
    pub jwt_secret: String,
    pub jwt_ttl: Duration,
    pub admin_username: String,
    pub admin_password: String,
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database: None,
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            jwt_ttl: Duration::hours(DEFAULT_JWT_TTL_HOURS),
            admin_username: DEFAULT_ADMIN_USERNAME.to_string(),
            admin_password: DEFAULT_ADMIN_PASSWORD.to_string(),
            log_format: LogFormat::default(),
        }
    }
}

impl core::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("database", &self.database)
            .field("jwt_secret", &"<redacted>")
            .field("jwt_ttl_hours", &self.jwt_ttl.num_hours())
            .field("admin_username", &self.admin_username)
            .field("admin_password", &"<redacted>")
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = parse_or(&get, "PORT", DEFAULT_PORT)?;
        let max_connections = parse_or(&get, "DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?;
        if max_connections == 0 {
            return Err(invalid("DB_MAX_CONNECTIONS", "must be at least 1"));
        }

        let ttl_hours: i64 = parse_or(&get, "JWT_TTL_HOURS", DEFAULT_JWT_TTL_HOURS)?;
        if ttl_hours <= 0 {
            return Err(invalid("JWT_TTL_HOURS", "must be greater than zero"));
        }

        let log_format = match get("LOG_FORMAT") {
            Some(raw) => raw
                .parse::<LogFormat>()
                .map_err(|e| invalid("LOG_FORMAT", e.to_string()))?,
            None => LogFormat::default(),
        };

        let database = connect_options(&get)?.map(|connect| DatabaseConfig {
            connect,
            max_connections,
        });

        Ok(Self {
            port,
            database,
            jwt_secret: get("JWT_SECRET").unwrap_or_else(|| DEFAULT_JWT_SECRET.to_string()),
            jwt_ttl: Duration::hours(ttl_hours),
            admin_username: get("ADMIN_USERNAME")
                .unwrap_or_else(|| DEFAULT_ADMIN_USERNAME.to_string()),
            admin_password: get("ADMIN_PASSWORD")
                .unwrap_or_else(|| DEFAULT_ADMIN_PASSWORD.to_string()),
            log_format,
        })
    }

    /// Names of settings still at their insecure development defaults.
    pub fn insecure_defaults(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.jwt_secret == DEFAULT_JWT_SECRET {
            names.push("JWT_SECRET");
        }
        if self.admin_password == DEFAULT_ADMIN_PASSWORD {
            names.push("ADMIN_PASSWORD");
        }
        names
    }
}

fn invalid(key: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        message: message.into(),
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| invalid(key, format!("'{raw}': {e}"))),
        None => Ok(default),
    }
}

/// `DATABASE_URL` wins; otherwise the options are assembled from `DB_*`
/// parts when `DB_HOST` is set.
fn connect_options<G>(get: &G) -> Result<Option<PgConnectOptions>, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    if let Some(url) = get("DATABASE_URL") {
        if !(url.starts_with("postgres://") || url.starts_with("postgresql://")) {
            return Err(invalid("DATABASE_URL", "expected a postgres:// URL"));
        }
        let options = url
            .parse::<PgConnectOptions>()
            .map_err(|e| invalid("DATABASE_URL", e.to_string()))?;
        return Ok(Some(options));
    }

    let Some(host) = get("DB_HOST") else {
        return Ok(None);
    };
    let port: u16 = parse_or(get, "DB_PORT", 5432)?;
    let sslmode = get("DB_SSLMODE").unwrap_or_else(|| "prefer".to_string());
    let ssl_mode = sslmode
        .parse::<PgSslMode>()
        .map_err(|e| invalid("DB_SSLMODE", format!("'{sslmode}': {e}")))?;

    let mut options = PgConnectOptions::new()
        .host(&host)
        .port(port)
        .username(&get("DB_USER").unwrap_or_else(|| "postgres".to_string()))
        .database(&get("DB_NAME").unwrap_or_else(|| "postgres".to_string()))
        .ssl_mode(ssl_mode);
    if let Some(password) = get("DB_PASSWORD") {
        options = options.password(&password);
    }
    Ok(Some(options))
}
