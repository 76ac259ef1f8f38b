//! Configuration loading and validation.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::models::AggregateOptions;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,

    /// Upper bound on request bodies; fight logs are large
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "*".to_string()
}

fn default_max_body_bytes() -> usize {
    256 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default directory for `aggregate` outputs
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub server: ServerConfig,

    /// Defaults applied to every aggregation call
    #[serde(default)]
    pub aggregation: AggregateOptions,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            server: ServerConfig::default(),
            aggregation: AggregateOptions::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "Server port must be greater than 0".to_string(),
            ));
        }

        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "Max body size must be greater than 0".to_string(),
            ));
        }

        let tiers = &self.aggregation.tiers;
        let ordered = tiers.short_ms.is_finite()
            && tiers.medium_ms.is_finite()
            && tiers.short_ms < tiers.medium_ms;
        if !ordered {
            return Err(ConfigError::ValidationError(format!(
                "Tier short_ms ({}) must be below medium_ms ({})",
                tiers.short_ms, tiers.medium_ms
            )));
        }
        for (name, weight) in [
            ("short_weight", tiers.short_weight),
            ("medium_weight", tiers.medium_weight),
            ("long_weight", tiers.long_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "Tier {name} must be a non-negative number"
                )));
            }
        }

        if self
            .aggregation
            .mvp_weights
            .values()
            .iter()
            .any(|w| !w.is_finite() || *w < 0.0)
        {
            return Err(ConfigError::ValidationError(
                "MVP weights must be non-negative numbers".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DisruptionMethod, SkillDamageSource};
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.log_level, "info");
        assert_eq!(config.server.port, 8080);
        assert!(config.aggregation.view.show_mvp);
    }

    #[test]
    fn test_config_validation_ok() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_bad_port() {
        let mut config = AppConfig::default();
        config.server.port = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_bad_tiers() {
        let mut config = AppConfig::default();
        config.aggregation.tiers.short_ms = 5000.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.aggregation.tiers.long_weight = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_negative_weight() {
        let mut config = AppConfig::default();
        config.aggregation.mvp_weights.healing = -1.0;

        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
log_level = "debug"

[server]
port = 9000

[aggregation.view]
skill_damage_source = "total"
disruption_method = "tiered"

[aggregation.mvp_weights]
dps = 0.25
"#
        )
        .unwrap();

        let config = AppConfig::from_file(&file.path().to_path_buf()).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.aggregation.view.skill_damage_source, SkillDamageSource::Total);
        assert_eq!(config.aggregation.view.disruption_method, DisruptionMethod::Tiered);
        assert!(config.aggregation.view.show_top_stats);
        assert!((config.aggregation.mvp_weights.dps - 0.25).abs() < 0.001);
        assert!((config.aggregation.mvp_weights.healing - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_unreadable_and_invalid_files() {
        let missing = PathBuf::from("/nonexistent/squad-stats.toml");
        assert!(matches!(AppConfig::from_file(&missing), Err(ConfigError::ReadError(_))));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nport = ").unwrap();
        assert!(matches!(
            AppConfig::from_file(&file.path().to_path_buf()),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string(&config).unwrap();

        // Should be parseable
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.data_dir, parsed.data_dir);
        assert_eq!(parsed.aggregation.tiers, config.aggregation.tiers);
    }
}
