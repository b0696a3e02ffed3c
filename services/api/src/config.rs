//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::time::Duration;
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
    pub database_max_connections: u32,
    pub log_level: Level,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub primary_model: String,
    pub fallback_model: String,
    pub generation_model: String,
    pub title_model: String,
    pub app_base_url: String,
    pub enable_web_search: bool,
    pub enable_file_search: bool,
    pub turn_timeout: Duration,
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

    /// Builds the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        // --- Load Server and Database Settings ---
        let bind_address_str = var_or("BIND_ADDRESS", "0.0.0.0:3000");
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let database_max_connections = parse_number("DATABASE_MAX_CONNECTIONS", &var_or("DATABASE_MAX_CONNECTIONS", "5"))?;

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load LLM Provider Settings ---
        let openai_api_key = lookup("OPENAI_API_KEY");
        let openai_base_url = var_or("OPENAI_BASE_URL", "https://api.openai.com/v1");
        let primary_model = var_or("PRIMARY_MODEL", "gpt-4.1");
        let fallback_model = var_or("FALLBACK_MODEL", "gpt-4.1-mini");
        let generation_model = var_or("GENERATION_MODEL", "gpt-4.1-mini");
        let title_model = var_or("TITLE_MODEL", "gpt-4o-mini");

        // --- Load Feature Flags ---
        let app_base_url = var_or("APP_BASE_URL", "http://localhost:3000");
        let enable_web_search = parse_flag("ENABLE_WEB_SEARCH", &var_or("ENABLE_WEB_SEARCH", "true"))?;
        let enable_file_search = parse_flag("ENABLE_FILE_SEARCH", &var_or("ENABLE_FILE_SEARCH", "true"))?;
        let turn_timeout_secs: u64 = parse_number("TURN_TIMEOUT_SECS", &var_or("TURN_TIMEOUT_SECS", "120"))?;

        Ok(Self {
            bind_address,
            database_url,
            database_max_connections,
            log_level,
            openai_api_key,
            openai_base_url,
            primary_model,
            fallback_model,
            generation_model,
            title_model,
            app_base_url,
            enable_web_search,
            enable_file_search,
            turn_timeout: Duration::from_secs(turn_timeout_secs),
        })
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue(
            key.to_string(),
            format!("'{}' is not a boolean", other),
        )),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| {
        ConfigError::InvalidValue(key.to_string(), format!("'{}' is not a number", value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_database_url_is_set() {
        let config = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/vista")])).unwrap();
        assert_eq!(config.bind_address.port(), 3000);
        assert_eq!(config.primary_model, "gpt-4.1");
        assert_eq!(config.fallback_model, "gpt-4.1-mini");
        assert_eq!(config.turn_timeout, Duration::from_secs(120));
        assert!(config.enable_web_search);
        assert!(config.openai_api_key.is_none());
    }

    #[test]
    fn database_url_is_required() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(ref key) if key == "DATABASE_URL"));
    }

    #[test]
    fn invalid_values_are_reported() {
        let err = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/vista"),
            ("ENABLE_FILE_SEARCH", "maybe"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref key, _) if key == "ENABLE_FILE_SEARCH"));

        let err = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/vista"),
            ("TURN_TIMEOUT_SECS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref key, _) if key == "TURN_TIMEOUT_SECS"));
    }
}
