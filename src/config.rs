use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use tracing::info;
use validator::Validate;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";
const DEFAULT_RECONCILE_BATCH_SIZE: u64 = 500;

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_acquire_timeout_secs() -> u64 {
    8
}

fn default_reconcile_batch_size() -> u64 {
    DEFAULT_RECONCILE_BATCH_SIZE
}

/// Application configuration with validation.
///
/// Values are layered: `config/default.toml`, then
/// `config/{environment}.toml`, then `STOCKFLOW_*` environment variables.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL (Postgres in production, SQLite in tests)
    #[validate(length(min = 1))]
    pub database_url: String,

    /// Maximum number of pooled database connections
    #[serde(default = "default_max_connections")]
    #[validate(range(min = 1, max = 1024))]
    pub db_max_connections: u32,

    /// Minimum number of pooled database connections
    #[serde(default = "default_min_connections")]
    pub db_min_connections: u32,

    /// Connection establishment timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,

    /// Pool acquire timeout in seconds; bounds how long an operation may
    /// wait on a busy pool before surfacing a retryable error
    #[serde(default = "default_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Run migrations automatically on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// Deployment environment name ("development", "test", "production")
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Log level filter ("trace" through "error")
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Upper bound on snapshots examined per reconciliation sweep
    #[serde(default = "default_reconcile_batch_size")]
    #[validate(range(min = 1))]
    pub reconcile_batch_size: u64,
}

impl AppConfig {
    /// Loads configuration from the `config/` directory and environment.
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("STOCKFLOW_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());

        let mut builder = Config::builder();

        let default_path = Path::new(CONFIG_DIR).join("default");
        builder = builder.add_source(File::from(default_path).required(false));

        let env_path = Path::new(CONFIG_DIR).join(&environment);
        builder = builder.add_source(File::from(env_path).required(false));

        builder = builder.add_source(Environment::with_prefix("STOCKFLOW"));

        let cfg: AppConfig = builder.build()?.try_deserialize()?;
        cfg.validate()
            .map_err(|e| ConfigError::Message(format!("invalid configuration: {e}")))?;

        info!(environment = %cfg.environment, "Configuration loaded");
        Ok(cfg)
    }

    /// Constructs a configuration directly; used by tests and embedders.
    pub fn new(database_url: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            db_max_connections: default_max_connections(),
            db_min_connections: default_min_connections(),
            db_connect_timeout_secs: default_connect_timeout_secs(),
            db_acquire_timeout_secs: default_acquire_timeout_secs(),
            auto_migrate: false,
            environment: environment.into(),
            log_level: default_log_level(),
            reconcile_batch_size: default_reconcile_batch_size(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_applies_defaults() {
        let cfg = AppConfig::new("sqlite::memory:", "test");
        assert_eq!(cfg.db_max_connections, 10);
        assert_eq!(cfg.db_min_connections, 1);
        assert!(!cfg.auto_migrate);
        assert!(!cfg.is_production());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn empty_database_url_fails_validation() {
        let cfg = AppConfig::new("", "test");
        assert!(cfg.validate().is_err());
    }
}
