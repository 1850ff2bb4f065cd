//! Application configuration module
//!
//! Type-safe configuration loading from environment variables using the
//! `config` and `dotenvy` crates. Configuration is loaded with the
//! `CLASSCAST` prefix and nested values use `__` as separator.
//!
//! # Example
//!
//! ```no_run
//! use classcast::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod bus;
mod error;
mod server;

pub use bus::BusConfig;
pub use error::{ConfigError, ValidationError};
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

/// Root application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment)
    #[serde(default)]
    pub server: ServerConfig,

    /// Scale-out bus configuration (Redis pub/sub)
    #[serde(default)]
    pub bus: BusConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// - Loads `.env` if present (development)
    /// - Reads environment variables with the `CLASSCAST` prefix
    /// - `CLASSCAST__SERVER__PORT=3000` -> `server.port = 3000`
    /// - `CLASSCAST__BUS__URL=redis://...` -> `bus.url = ...`
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("CLASSCAST")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.bus.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Env vars are process-global; serialize these tests.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn clear_env() {
        env::remove_var("CLASSCAST__SERVER__PORT");
        env::remove_var("CLASSCAST__BUS__URL");
    }

    #[test]
    fn loads_with_no_environment_at_all() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();

        let config = AppConfig::load().unwrap();
        assert_eq!(config.server.port, 8080);
        assert!(config.bus.url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn nested_env_vars_override_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("CLASSCAST__SERVER__PORT", "3000");
        env::set_var("CLASSCAST__BUS__URL", "redis://localhost:6379");
        let config = AppConfig::load().unwrap();
        clear_env();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.bus.url.as_deref(), Some("redis://localhost:6379"));
        assert!(config.bus.is_active());
    }
}
