//! Application configuration loaded from environment variables.
//!
//! Values are read once at startup; `.env` is honored for local development.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::db::RetryPolicy;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// GCP project ID (Firestore)
    pub gcp_project_id: String,
    /// Frontend origin allowed by CORS
    pub frontend_url: String,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// Shared secret expected in `x-scheduler-token` on `/tasks/*`
    pub scheduler_token: String,
    /// Push gateway URL; pushes are only logged when unset
    pub push_endpoint: Option<String>,
    pub push_api_key: Option<String>,
    pub squad_max_members: u32,
    /// Default leaderboard page size
    pub ranking_page_size: usize,
    /// Attempts per transaction before giving up on contention
    pub store_max_attempts: u32,
    pub store_retry_base_ms: u64,
    /// Run scheduled jobs in-process instead of waiting for `/tasks/*` calls
    pub internal_scheduler: bool,
}

impl Config {
    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            port: 8080,
            gcp_project_id: "test-project".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            scheduler_token: "test_scheduler_token".to_string(),
            push_endpoint: None,
            push_api_key: None,
            squad_max_members: 100,
            ranking_page_size: 50,
            store_max_attempts: 5,
            store_retry_base_ms: 1,
            internal_scheduler: false,
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            port: parse_or("PORT", 8080)?,
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            scheduler_token: env::var("SCHEDULER_TOKEN")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("SCHEDULER_TOKEN"))?,
            push_endpoint: optional("PUSH_ENDPOINT"),
            push_api_key: optional("PUSH_API_KEY"),
            squad_max_members: parse_or("SQUAD_MAX_MEMBERS", 100)?,
            ranking_page_size: parse_or::<usize>("RANKING_PAGE_SIZE", 50)?.clamp(1, 100),
            store_max_attempts: parse_or::<u32>("STORE_MAX_ATTEMPTS", 5)?.max(1),
            store_retry_base_ms: parse_or("STORE_RETRY_BASE_MS", 25)?,
            internal_scheduler: parse_or("INTERNAL_SCHEDULER", true)?,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.store_max_attempts,
            base_delay: Duration::from_millis(self.store_retry_base_ms),
        }
    }
}

fn optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(name) {
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid(name)),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        // Set required env vars for test
        env::set_var("JWT_SIGNING_KEY", "test_jwt_key_32_bytes_minimum!!");
        env::set_var("SCHEDULER_TOKEN", " sched ");
        env::set_var("RANKING_PAGE_SIZE", "500");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.scheduler_token, "sched");
        assert_eq!(config.ranking_page_size, 100);
        assert_eq!(config.squad_max_members, 100);
        assert_eq!(config.retry_policy().max_attempts, 5);
    }
}
