//! Scale-out bus configuration
//!
//! Presence of a connection URL activates the bridge; absence leaves the
//! service in single-instance mode with identical local event semantics.

use serde::Deserialize;

use super::error::ValidationError;

/// Scale-out bus configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BusConfig {
    /// Redis connection URL. `None` means single-instance mode.
    #[serde(default)]
    pub url: Option<String>,

    /// Shared pub/sub channel carrying room-tagged bridge messages
    #[serde(default = "default_channel")]
    pub channel: String,
}

impl BusConfig {
    /// Whether the scale-out bridge should be activated
    pub fn is_active(&self) -> bool {
        self.url.is_some()
    }

    /// Validate bus configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(url) = &self.url {
            if !url.starts_with("redis://") && !url.starts_with("rediss://") {
                return Err(ValidationError::InvalidBusUrl);
            }
        }
        if self.channel.is_empty() {
            return Err(ValidationError::EmptyBusChannel);
        }
        Ok(())
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            url: None,
            channel: default_channel(),
        }
    }
}

fn default_channel() -> String {
    "classcast:rooms".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_url_means_single_instance_mode() {
        let config = BusConfig::default();
        assert!(!config.is_active());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn redis_url_activates_the_bridge() {
        let config = BusConfig {
            url: Some("redis://localhost:6379".to_string()),
            ..Default::default()
        };
        assert!(config.is_active());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn non_redis_url_fails_validation() {
        let config = BusConfig {
            url: Some("http://localhost:6379".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_channel_fails_validation() {
        let config = BusConfig {
            channel: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
