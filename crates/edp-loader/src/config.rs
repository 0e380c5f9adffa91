//! Loader configuration

use serde::{Deserialize, Serialize};

/// Default environment suffix for table names.
pub const DEFAULT_ENV: &str = "dev";

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/edp";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;

/// Loader configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Environment suffix; the active table is `evictions_<env>` and the
    /// staging table `evictions_staging_<env>`. Namespacing staging tables
    /// per environment is what lets independent deployments load
    /// concurrently.
    pub env: String,
    pub database_url: String,
    pub database_max_connections: u32,
}

impl LoaderConfig {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = LoaderConfig {
            env: std::env::var("EDP_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string()),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            database_max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_DATABASE_MAX_CONNECTIONS),
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    ///
    /// The env suffix is interpolated into table identifiers, so it must stay
    /// within `[a-z0-9_]`.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.env.is_empty() {
            anyhow::bail!("EDP_ENV cannot be empty");
        }
        if !self
            .env
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            anyhow::bail!(
                "EDP_ENV must contain only lowercase letters, digits, and underscores, got '{}'",
                self.env
            );
        }
        if self.database_url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }
        Ok(())
    }

    /// Active table name for this environment.
    pub fn active_table(&self) -> String {
        format!("evictions_{}", self.env)
    }

    /// Staging table name for this environment.
    pub fn staging_table(&self) -> String {
        format!("evictions_staging_{}", self.env)
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            env: DEFAULT_ENV.to_string(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            database_max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_names() {
        let config = LoaderConfig {
            env: "prod".to_string(),
            ..Default::default()
        };
        assert_eq!(config.active_table(), "evictions_prod");
        assert_eq!(config.staging_table(), "evictions_staging_prod");
    }

    #[test]
    fn test_env_validation_rejects_unsafe_identifiers() {
        let config = LoaderConfig {
            env: "prod; DROP TABLE evictions".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = LoaderConfig {
            env: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_is_valid() {
        assert!(LoaderConfig::default().validate().is_ok());
    }
}
