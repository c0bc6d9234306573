//! Engine configuration loader.
//!
//! Layers `EngineOptions` defaults under an optional config file and
//! environment variables, using the `config` crate for the merge instead
//! of hand-rolled `std::env::var` reads (spec §6 "Configuration keys").

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::domain::entities::EngineOptions;

/// Environment variable prefix recognized for overrides, e.g.
/// `LIVENESS__COLLECTION__COLLECT_MIN_COLLECT_COUNT=3`.
const ENV_PREFIX: &str = "LIVENESS";

/// Wraps the loaded `EngineOptions` plus the handful of settings that
/// govern the process itself rather than the detection pipeline (log
/// level, optional config file path).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub options: EngineOptions,
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { options: EngineOptions::default(), log_level: "info".to_string() }
    }
}

impl EngineConfig {
    /// Loads configuration: `EngineOptions::default()` as the base layer,
    /// an optional `config/liveness.{toml,yaml,json}` file (path
    /// overridable via `LIVENESS_CONFIG_FILE`), then `LIVENESS__*`
    /// environment variables, in ascending priority.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config_path =
            std::env::var("LIVENESS_CONFIG_FILE").unwrap_or_else(|_| "config/liveness".to_string());

        let defaults = Config::try_from(&EngineConfig::default())?;

        let built = Config::builder()
            .add_source(defaults)
            .add_source(File::with_name(&config_path).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let config: EngineConfig = built.try_deserialize()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_engine_option_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.options, EngineOptions::default());
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn load_without_file_or_env_falls_back_to_defaults() {
        std::env::remove_var("LIVENESS_CONFIG_FILE");
        let config = EngineConfig::load().unwrap();
        assert_eq!(config.options.collection.collect_min_collect_count, 5);
    }
}
