//! Application configuration loaded from environment variables.

use std::env;

/// Default SQLite database location when `DATABASE_URL` is unset.
const DEFAULT_DATABASE_URL: &str = "sqlite://rides.db";

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// Server port
    pub port: u16,
    /// SQLite connection string (`sqlite://path` or `sqlite::memory:`)
    pub database_url: String,
    /// Email of the admin account created on first start
    pub admin_email: String,
    /// Buffered events per notification topic before slow subscribers skip ahead
    pub notify_channel_capacity: usize,

    // --- Secrets ---
    /// JWT signing key shared with the identity provider (raw bytes)
    pub jwt_signing_key: Vec<u8>,
}

impl Config {
    /// Config for tests: in-memory database and a fixed signing key.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            port: 8080,
            database_url: "sqlite::memory:".to_string(),
            admin_email: "admin@example.com".to_string(),
            notify_channel_capacity: 64,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is honored for local development.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            admin_email: env::var("ADMIN_EMAIL")
                .map(|v| v.trim().to_lowercase())
                .unwrap_or_else(|_| "admin@example.com".to_string()),
            notify_channel_capacity: parse_var("NOTIFY_CHANNEL_CAPACITY", 64)?,

            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
        })
    }
}

/// Parse an optional numeric variable, rejecting zero and garbage.
fn parse_var(name: &'static str, default: usize) -> Result<usize, ConfigError> {
    match env::var(name) {
        Err(_) => Ok(default),
        Ok(raw) => match raw.trim().parse::<usize>() {
            Ok(0) | Err(_) => Err(ConfigError::Invalid(name, raw)),
            Ok(value) => Ok(value),
        },
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    // Environment is process-wide; keep every env mutation in this one test.
    #[test]
    fn test_config_from_env() {
        env::set_var("JWT_SIGNING_KEY", "test_jwt_key_32_bytes_minimum!!");
        env::set_var("NOTIFY_CHANNEL_CAPACITY", "16");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.jwt_signing_key, b"test_jwt_key_32_bytes_minimum!!");
        assert_eq!(config.notify_channel_capacity, 16);

        env::set_var("NOTIFY_CHANNEL_CAPACITY", "0");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("NOTIFY_CHANNEL_CAPACITY", _)));

        env::remove_var("NOTIFY_CHANNEL_CAPACITY");
    }
}
