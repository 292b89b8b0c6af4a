//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub db_max_connections: u32,
    pub log_level: Level,
    /// Lifetime of issued bearer tokens.
    pub token_ttl_days: i64,
    /// Lifetime of the `guest_token` cookie.
    pub guest_cookie_minutes: i64,
    pub page_size: u32,
    /// Root directory for uploaded product images.
    pub storage_path: PathBuf,
    /// Absolute origin used to build image and pagination URLs.
    pub public_base_url: String,
    pub cors_origin: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Server and Database Settings ---
        let bind_address: SocketAddr = parse_or(&lookup, "BIND_ADDRESS", "0.0.0.0:3000")?;
        let database_url =
            lookup("DATABASE_URL").ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;
        let db_max_connections: u32 = parse_or(&lookup, "DB_MAX_CONNECTIONS", "5")?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Auth and Cart Settings ---
        let token_ttl_days: i64 = parse_or(&lookup, "TOKEN_TTL_DAYS", "30")?;
        let guest_cookie_minutes: i64 = parse_or(&lookup, "GUEST_COOKIE_MINUTES", "10080")?;
        let page_size: u32 = parse_or(&lookup, "PAGE_SIZE", "10")?;
        if page_size == 0 {
            return Err(ConfigError::InvalidValue(
                "PAGE_SIZE".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        // --- Storage and HTTP Settings ---
        let storage_path = lookup("STORAGE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./storage/public"));
        let public_base_url = lookup("PUBLIC_BASE_URL")
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string();
        let cors_origin = lookup("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:5173".to_string());

        Ok(Self {
            bind_address,
            database_url,
            db_max_connections,
            log_level,
            token_ttl_days,
            guest_cookie_minutes,
            page_size,
            storage_path,
            public_base_url,
            cors_origin,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: &str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    raw.parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_database_url_is_set() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/shop")]).unwrap();
        assert_eq!(config.bind_address.port(), 3000);
        assert_eq!(config.guest_cookie_minutes, 10_080);
        assert_eq!(config.token_ttl_days, 30);
        assert_eq!(config.page_size, 10);
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    fn database_url_is_required() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(ref var) if var == "DATABASE_URL"));
    }

    #[test]
    fn invalid_numbers_name_the_variable() {
        let err = load(&[("DATABASE_URL", "postgres://x"), ("PAGE_SIZE", "ten")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref var, _) if var == "PAGE_SIZE"));
    }

    #[test]
    fn trailing_slash_is_stripped_from_base_url() {
        let config = load(&[
            ("DATABASE_URL", "postgres://x"),
            ("PUBLIC_BASE_URL", "https://shop.example.com/"),
        ])
        .unwrap();
        assert_eq!(config.public_base_url, "https://shop.example.com");
    }
}
