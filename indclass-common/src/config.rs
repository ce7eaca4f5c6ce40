//! Configuration file resolution and shared config sections

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "INDCLASS_CONFIG";

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5790,
        }
    }
}

/// Reference database settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file; `None` keeps the code table in memory
    pub path: Option<PathBuf>,
    pub max_connections: u32,
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_connections: 10,
            busy_timeout_ms: 5000,
        }
    }
}

#[cfg(feature = "sqlx")]
impl DatabaseConfig {
    pub fn options(&self) -> crate::db::DatabaseOptions {
        crate::db::DatabaseOptions {
            max_connections: self.max_connections,
            busy_timeout_ms: self.busy_timeout_ms,
        }
    }
}

/// Resolve the config file following priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. User config directory (`<config_dir>/indclass/config.toml`) if it exists
///
/// Returns `None` when no file applies; callers fall back to compiled defaults.
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config directory
    dirs::config_dir()
        .map(|d| d.join("indclass").join("config.toml"))
        .filter(|p| p.exists())
}

/// Parse a TOML document into a config type
pub fn parse_toml<T: DeserializeOwned>(content: &str) -> Result<T> {
    toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Load a TOML config file, or defaults when `path` is `None`
pub fn load_toml_or_default<T: DeserializeOwned + Default>(path: Option<&Path>) -> Result<T> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path).map_err(|e| {
                Error::Config(format!("Read config {} failed: {}", path.display(), e))
            })?;
            parse_toml(&content)
        }
        None => Ok(T::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct Sample {
        server: ServerConfig,
        database: DatabaseConfig,
    }

    #[test]
    #[serial]
    fn test_cli_argument_wins() {
        std::env::set_var("INDCLASS_TEST_CONFIG", "/from/env.toml");
        let path = resolve_config_path(Some(Path::new("/from/cli.toml")), "INDCLASS_TEST_CONFIG");
        std::env::remove_var("INDCLASS_TEST_CONFIG");
        assert_eq!(path, Some(PathBuf::from("/from/cli.toml")));
    }

    #[test]
    #[serial]
    fn test_env_used_without_cli() {
        std::env::set_var("INDCLASS_TEST_CONFIG", "/from/env.toml");
        let path = resolve_config_path(None, "INDCLASS_TEST_CONFIG");
        std::env::remove_var("INDCLASS_TEST_CONFIG");
        assert_eq!(path, Some(PathBuf::from("/from/env.toml")));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let sample: Sample = parse_toml("[server]\nport = 8080\n").unwrap();
        assert_eq!(sample.server.port, 8080);
        assert_eq!(sample.server.host, "127.0.0.1");
        assert_eq!(sample.database, DatabaseConfig::default());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let result: Result<Sample> = load_toml_or_default(Some(Path::new("/definitely/not/here.toml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
