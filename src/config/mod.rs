// Configuration module
// Author: kelexine (https://github.com/kelexine)

mod models;

pub use models::*;

use crate::error::{Result, ServiceError};
use config::{Config, Environment, File};
use std::path::{Path, PathBuf};

impl AppConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Environment variables (highest)
    /// 2. Config file (explicit path, or `~/.provit/config.toml`)
    /// 3. Defaults (lowest)
    ///
    /// CLI overrides are applied by the caller afterwards.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => File::from(p.to_path_buf()).required(true),
            None => File::with_name(&Self::default_config_path()).required(false),
        };

        let config = Config::builder()
            // Start with defaults
            .add_source(Config::try_from(&Self::default())?)
            .add_source(file)
            // Override with environment variables (e.g. PROVIT_SERVER__PORT=8080)
            .add_source(
                Environment::with_prefix("PROVIT")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(|e| ServiceError::Config(e.to_string()))?;

        let mut loaded: AppConfig = config
            .try_deserialize()
            .map_err(|e| ServiceError::Config(e.to_string()))?;

        // Conventional key name used by OpenAI-compatible tooling
        if loaded.upstream.api_key.is_none() {
            loaded.upstream.api_key = std::env::var("OPENAI_API_KEY")
                .ok()
                .filter(|k| !k.is_empty());
        }

        loaded.validate()?;
        Ok(loaded)
    }

    /// Reject settings that would wedge the dispatch engine.
    pub fn validate(&self) -> Result<()> {
        if self.upstream.retry_attempts == 0 {
            return Err(ServiceError::Config(
                "upstream.retry_attempts must be at least 1".to_string(),
            ));
        }
        if self.dispatch.concurrency_limit == 0 || self.server.gateway_pool_size == 0 {
            return Err(ServiceError::Config(
                "concurrency_limit and gateway_pool_size must be non-zero".to_string(),
            ));
        }
        if self.dispatch.queue_capacity == 0 {
            return Err(ServiceError::Config(
                "dispatch.queue_capacity must be non-zero".to_string(),
            ));
        }
        if self.cache.fingerprint_window == 0 {
            return Err(ServiceError::Config(
                "cache.fingerprint_window must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    fn default_config_path() -> String {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".provit")
            .join("config.toml")
            .to_string_lossy()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_from_explicit_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[server]\nport = 9000\n\n[dispatch]\nqueue_capacity = 8\n\n[cache]\nttl_secs = 10"
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.dispatch.queue_capacity, 8);
        assert_eq!(config.cache.ttl_secs, 10);
        // Untouched sections keep their defaults
        assert_eq!(config.upstream.retry_attempts, 2);
        assert_eq!(config.server.sync_timeout_secs, 75);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = AppConfig::load(Some(Path::new("/nonexistent/provit.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = AppConfig::default();
        config.upstream.retry_attempts = 0;
        assert!(config.validate().is_err());
    }
}
