//! Service configuration
//!
//! Resolution priority for the config file is CLI argument, then the
//! `INDCLASS_CONFIG` environment variable, then the user config directory,
//! then compiled defaults. `INDCLASS_PORT` and `INDCLASS_DB_PATH` override the
//! loaded values.

use indclass_common::config::{
    load_toml_or_default, resolve_config_path, DatabaseConfig, ServerConfig, CONFIG_ENV_VAR,
};
use indclass_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::aggregation::AggregationConfig;
use crate::confidence::AdaptiveConfig;
use crate::filter::FilterConfig;
use crate::ranking::RankingConfig;
use crate::strategies::StrategyWeights;
use crate::voting::VotingConfig;

pub const PORT_ENV_VAR: &str = "INDCLASS_PORT";
pub const DB_PATH_ENV_VAR: &str = "INDCLASS_DB_PATH";

/// Request defaults and strategy priors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub default_max_results: usize,
    pub default_min_confidence: f64,
    /// Response cap per code type
    pub max_results_per_type: usize,
    pub strategy_weights: StrategyWeights,
    /// Per-request deadline applied by the HTTP layer
    pub request_timeout_ms: Option<u64>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            default_max_results: 10,
            default_min_confidence: 0.1,
            max_results_per_type: 3,
            strategy_weights: StrategyWeights::default(),
            request_timeout_ms: None,
        }
    }
}

impl ClassifierConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub classifier: ClassifierConfig,
    pub voting: VotingConfig,
    pub filter: FilterConfig,
    pub ranking: RankingConfig,
    pub aggregation: AggregationConfig,
    pub adaptive: AdaptiveConfig,
}

impl ServiceConfig {
    /// Resolve, load and validate the service configuration
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let path = resolve_config_path(cli_path, CONFIG_ENV_VAR);
        match &path {
            Some(p) => info!(path = %p.display(), "Loading configuration"),
            None => info!("No config file found, using compiled defaults"),
        }

        let mut config: ServiceConfig = load_toml_or_default(path.as_deref())?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `INDCLASS_PORT` and `INDCLASS_DB_PATH`
    pub fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var(PORT_ENV_VAR) {
            match port.trim().parse::<u16>() {
                Ok(port) => {
                    info!(port, "Port overridden from environment");
                    self.server.port = port;
                }
                Err(_) => warn!(value = %port, "Ignoring invalid {}", PORT_ENV_VAR),
            }
        }

        if let Ok(path) = std::env::var(DB_PATH_ENV_VAR) {
            if !path.trim().is_empty() {
                info!(path = %path, "Database path overridden from environment");
                self.database.path = Some(PathBuf::from(path));
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let c = &self.classifier;
        if !(0.0..=1.0).contains(&c.default_min_confidence) {
            return Err(Error::Config(format!(
                "classifier.default_min_confidence must be within [0, 1], got {}",
                c.default_min_confidence
            )));
        }
        if c.default_max_results == 0 {
            return Err(Error::Config(
                "classifier.default_max_results must be at least 1".to_string(),
            ));
        }
        if c.max_results_per_type == 0 || self.ranking.max_results_per_type == 0 {
            return Err(Error::Config(
                "max_results_per_type must be at least 1".to_string(),
            ));
        }
        if self.adaptive.min_weight > self.adaptive.max_weight {
            return Err(Error::Config(format!(
                "adaptive.min_weight {} exceeds adaptive.max_weight {}",
                self.adaptive.min_weight, self.adaptive.max_weight
            )));
        }
        Ok(())
    }
}
